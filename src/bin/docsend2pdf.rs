//! CLI binary for docsend2pdf.
//!
//! A thin shim over the library crate: maps CLI flags to a
//! `ConversionConfig`, pumps worker events into a progress bar, and prompts
//! on stdin when the document turns out to be gated.

use anyhow::{bail, Result};
use clap::Parser;
use docsend2pdf::{
    AuthKind, ConversionConfig, ConversionWorker, HistoryStore, NamePool, WorkerEvent,
    DEFAULT_OUTPUT_DIR,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI definition ───────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "docsend2pdf",
    version,
    about = "Convert a DocSend view link into a local PDF",
    after_help = "Examples:\n  \
        docsend2pdf https://docsend.com/view/abc123\n  \
        docsend2pdf https://docsend.com/view/abc123 --email me@example.com\n  \
        docsend2pdf --history"
)]
struct Cli {
    /// DocSend view link, e.g. https://docsend.com/view/abc123
    url: Option<String>,

    /// Directory the PDF is written into
    #[arg(short, long, default_value = DEFAULT_OUTPUT_DIR)]
    output_dir: PathBuf,

    /// Base name for the output file (skips the random name pool)
    #[arg(short, long)]
    name: Option<String>,

    /// Email to present to an email gate without prompting
    #[arg(long)]
    email: Option<String>,

    /// Passcode to present to a passcode gate without prompting
    #[arg(long, requires = "email")]
    passcode: Option<String>,

    /// JPEG quality for the embedded page images (40-100)
    #[arg(long, default_value_t = 85)]
    quality: u8,

    /// Navigation timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// List recent conversions and exit
    #[arg(long)]
    history: bool,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Where the used-name pool and history files live.
///
/// `DOCSEND2PDF_STATE_DIR` overrides; otherwise `~/.config/docsend2pdf`.
fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("DOCSEND2PDF_STATE_DIR") {
        if !dir.is_empty() {
            return PathBuf::from(dir);
        }
    }
    match std::env::var("HOME") {
        Ok(home) if !home.is_empty() => PathBuf::from(home).join(".config/docsend2pdf"),
        _ => PathBuf::from(".docsend2pdf"),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "docsend2pdf=warn",
        1 => "docsend2pdf=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print_history(store: &HistoryStore) {
    let entries = store.all();
    if entries.is_empty() {
        println!("No conversions yet.");
        return;
    }
    let now = chrono::Utc::now();
    for entry in entries {
        println!(
            "{:<12} {:>3} pages  {:>9}  {}",
            bold(&entry.name),
            entry.page_count,
            dim(&entry.relative_age(now)),
            entry.pdf_path.display(),
        );
    }
}

fn prompt(label: &str) -> Result<String> {
    let mut out = io::stderr();
    write!(out, "{label}: ")?;
    out.flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Collect credentials for the given gate kind from the terminal.
fn prompt_credentials(kind: AuthKind, known_email: Option<&str>) -> Result<(String, Option<String>)> {
    let email = match known_email {
        Some(email) => email.to_string(),
        None => prompt("Email")?,
    };
    let passcode = match kind {
        AuthKind::Email => None,
        AuthKind::Passcode => Some(prompt("Passcode")?),
    };
    Ok((email, passcode))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let state = state_dir();
    if cli.history {
        print_history(&HistoryStore::load(state.join("history.json")));
        return Ok(());
    }

    let Some(url) = cli.url.clone() else {
        bail!("no URL given; see --help");
    };

    let mut builder = ConversionConfig::builder()
        .output_dir(&cli.output_dir)
        .jpeg_quality(cli.quality)
        .nav_timeout_secs(cli.timeout);
    if let Some(name) = &cli.name {
        builder = builder.output_name(name);
    }
    if let Some(email) = &cli.email {
        builder = builder.email(email);
    }
    if let Some(passcode) = &cli.passcode {
        builder = builder.passcode(passcode);
    }
    let config = builder.build()?;

    let names = Arc::new(NamePool::load(state.join("used_names.json")));
    let history = HistoryStore::load(state.join("history.json"));

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{bar:42.green/238}] {pos:>3}%  {msg}",
        )?
        .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    bar.enable_steady_tick(Duration::from_millis(80));

    let mut handle = ConversionWorker::spawn(&url, config, names);

    // Ctrl-C cancels the run; the worker winds down silently.
    {
        let cancel = tokio::signal::ctrl_c();
        tokio::pin!(cancel);
        loop {
            let event = tokio::select! {
                event = handle.next_event() => event,
                _ = &mut cancel => {
                    handle.cancel();
                    bar.finish_and_clear();
                    eprintln!("{}", dim("cancelled"));
                    handle.join().await;
                    return Ok(());
                }
            };
            let Some(event) = event else { break };
            match event {
                WorkerEvent::Progress { percent, message } => {
                    bar.set_position(u64::from(percent));
                    bar.set_message(message);
                }
                WorkerEvent::AuthRequired(kind) => {
                    let (email, passcode) = bar.suspend(|| {
                        eprintln!("{}", bold("This document is protected."));
                        prompt_credentials(kind, cli.email.as_deref())
                    })?;
                    handle.provide_credentials(email, passcode);
                }
                WorkerEvent::Complete {
                    output_path,
                    page_count,
                    suggested_name,
                } => {
                    bar.finish_and_clear();
                    history.record(&suggested_name, &output_path, page_count);
                    eprintln!(
                        "{} {} {} {}",
                        green("✔"),
                        bold(&format!("{page_count} pages")),
                        dim("saved to"),
                        output_path.display(),
                    );
                    return Ok(());
                }
                WorkerEvent::Error { message, detail } => {
                    bar.finish_and_clear();
                    tracing::debug!("error detail: {detail}");
                    bail!("{} {message}", red("✘"));
                }
            }
        }
    }

    // The event stream ended without a terminal event: the run was cancelled.
    bar.finish_and_clear();
    Ok(())
}
