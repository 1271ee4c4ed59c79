//! # docsend2pdf
//!
//! Convert access-gated DocSend view links into local PDF files.
//!
//! ## Why this crate?
//!
//! DocSend decks are view-only web documents: there is no download button,
//! and access may be gated behind an email address or an email plus
//! passcode. This crate drives a headless Chromium session through the
//! viewer, captures every page as an image, and assembles the captures into
//! a single PDF, pausing mid-flow for as long as it takes a human to supply
//! credentials when a gate is hit.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ 1. Validate  link shape checked before any network I/O
//!  ├─ 2. Open      navigate + classify the gate (open / email / passcode)
//!  ├─ 3. Auth      pause for credentials when gated, resume or abort
//!  ├─ 4. Capture   one viewport screenshot per page, cancellable between pages
//!  ├─ 5. Name      draw a memorable name from the persisted pool
//!  ├─ 6. Assemble  recompress screenshots, build the PDF (spawn_blocking)
//!  └─ 7. Save      collision-avoided atomic write, history-ready result
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docsend2pdf::{ConversionConfig, ConversionWorker, NamePool, WorkerEvent};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let names = Arc::new(NamePool::load("state/used_names.json"));
//!     let config = ConversionConfig::default();
//!
//!     let mut handle =
//!         ConversionWorker::spawn("https://docsend.com/view/abc123", config, names);
//!     while let Some(event) = handle.next_event().await {
//!         match event {
//!             WorkerEvent::Progress { percent, message } => {
//!                 eprintln!("[{percent:>3}%] {message}");
//!             }
//!             WorkerEvent::AuthRequired(kind) => {
//!                 // Collect credentials from the user, then:
//!                 handle.provide_credentials("reader@example.com", None);
//!                 let _ = kind;
//!             }
//!             WorkerEvent::Complete { output_path, page_count, .. } => {
//!                 println!("{} pages -> {}", page_count, output_path.display());
//!             }
//!             WorkerEvent::Error { message, .. } => eprintln!("failed: {message}"),
//!         }
//!     }
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docsend2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docsend2pdf = { version = "0.4", default-features = false }
//! ```
//!
//! ## Integration notes
//!
//! The worker is UI-agnostic: it emits [`WorkerEvent`]s over a channel and
//! accepts `cancel` / `provide_credentials` commands through its handle, so a
//! desktop shell, a TUI, or the bundled CLI can all bind against the same
//! contract. Only one conversion should run at a time per process; use
//! [`worker::WorkerHandle::shutdown`] on the old handle before spawning a new
//! one. Tests replace the browser with a scripted [`CaptureDriver`] via
//! [`ConversionConfig::builder`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod auth;
pub mod cancel;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod naming;
pub mod pipeline;
pub mod worker;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use auth::{AuthOutcome, CredentialExchange, Credentials};
pub use cancel::CancelFlag;
pub use config::{ConversionConfig, ConversionConfigBuilder, DEFAULT_OUTPUT_DIR};
pub use error::ConvertError;
pub use events::{AuthKind, WorkerEvent};
pub use history::{HistoryEntry, HistoryStore};
pub use naming::NamePool;
pub use pipeline::capture::{BrowserDriver, CaptureDriver, CapturedPage, PageProgress, ScrapeResult};
pub use pipeline::gate::{classify, GateState, PageProbe};
pub use pipeline::url::DocumentUrl;
pub use worker::{ConversionWorker, WorkerHandle};
