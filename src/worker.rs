//! The conversion orchestrator: one background task per conversion.
//!
//! [`ConversionWorker::spawn`] runs the whole pipeline on a dedicated tokio
//! task so capture and PDF assembly never block the caller: validate the
//! link, open the document, loop the gate until it is open (pausing for
//! credentials at most once per gate kind), capture every page, draw a name,
//! assemble the PDF, and save it under a collision-avoided path. Events flow
//! back over a channel; commands (`cancel`, `provide_credentials`) go in
//! through the [`WorkerHandle`].
//!
//! Guarantees, per run: progress percentages never decrease; at most one
//! terminal event is emitted; cancellation produces no terminal event at
//! all; the driver's browser session is closed whatever the outcome.
//!
//! Progress weights are fixed for UI compatibility: capture spans 0 to 60
//! (linear in pages), naming 60 to 65, assembly 65 to 90, save 90 to 100.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::auth::{AuthOutcome, CredentialExchange, Credentials};
use crate::cancel::CancelFlag;
use crate::config::ConversionConfig;
use crate::error::{truncate_detail, ConvertError};
use crate::events::{AuthKind, ProgressTracker, WorkerEvent};
use crate::naming::NamePool;
use crate::pipeline::assemble::build_pdf;
use crate::pipeline::capture::{BrowserDriver, CaptureDriver, ScrapeResult};
use crate::pipeline::gate::GateState;
use crate::pipeline::url::DocumentUrl;

/// Spawns conversion workers. A zero-sized namespace; all state lives in the
/// handle and the task.
pub struct ConversionWorker;

impl ConversionWorker {
    /// Start a conversion of `url` on a background task.
    ///
    /// The name pool is injected by the composition root and shared across
    /// conversions; it is only consulted when `config.output_name` is unset.
    pub fn spawn(
        url: impl Into<String>,
        config: ConversionConfig,
        names: Arc<NamePool>,
    ) -> WorkerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelFlag::new();
        let exchange = Arc::new(CredentialExchange::new());
        let awaiting = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(run(
            url.into(),
            config,
            names,
            Emitter::new(tx),
            cancel.clone(),
            Arc::clone(&exchange),
            Arc::clone(&awaiting),
        ));

        WorkerHandle {
            events: rx,
            cancel,
            exchange,
            awaiting,
            task,
        }
    }
}

/// Caller-side handle to a running conversion.
pub struct WorkerHandle {
    events: mpsc::UnboundedReceiver<WorkerEvent>,
    cancel: CancelFlag,
    exchange: Arc<CredentialExchange>,
    awaiting: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Receive the next event. `None` once the worker has finished and the
    /// channel drained.
    pub async fn next_event(&mut self) -> Option<WorkerEvent> {
        self.events.recv().await
    }

    /// Non-blocking event poll, for callers pumping their own loop.
    pub fn try_next_event(&mut self) -> Option<WorkerEvent> {
        self.events.try_recv().ok()
    }

    /// Supply credentials for an active authentication pause.
    ///
    /// Ignored unless the worker is currently paused in an awaiting state,
    /// so stray submissions cannot alter an in-flight capture.
    pub fn provide_credentials(&self, email: impl Into<String>, passcode: Option<String>) {
        if !self.awaiting.load(Ordering::SeqCst) {
            debug!("credentials ignored: no authentication pause is active");
            return;
        }
        self.exchange.provide(Credentials {
            email: email.into(),
            passcode,
        });
    }

    /// Request cancellation. Safe from any task at any time; takes effect at
    /// the next checkpoint, or immediately if the worker is paused waiting
    /// for credentials. A no-op after completion.
    pub fn cancel(&self) {
        self.cancel.request();
        self.exchange.cancel();
    }

    /// Whether the worker task has finished.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the worker task to end.
    pub async fn join(self) {
        let _ = self.task.await;
    }

    /// Cancel and wait up to `grace` for wind-down, then detach.
    ///
    /// This is the one-at-a-time policy helper: call it on the previous
    /// handle before spawning a replacement conversion.
    pub async fn shutdown(mut self, grace: Duration) {
        self.cancel();
        if tokio::time::timeout(grace, &mut self.task).await.is_err() {
            warn!("worker did not wind down within {grace:?}, detaching");
        }
    }
}

// ── Event emission ───────────────────────────────────────────────────────

/// Serialises event emission and enforces the per-run guarantees: monotone
/// progress and a single terminal event.
struct Emitter {
    tx: mpsc::UnboundedSender<WorkerEvent>,
    state: Mutex<EmitterState>,
}

#[derive(Default)]
struct EmitterState {
    progress: ProgressTracker,
    terminal_sent: bool,
}

impl Emitter {
    fn new(tx: mpsc::UnboundedSender<WorkerEvent>) -> Self {
        Self {
            tx,
            state: Mutex::new(EmitterState::default()),
        }
    }

    fn progress(&self, percent: u8, message: &str) {
        let mut state = self.state.lock().expect("emitter poisoned");
        if state.terminal_sent {
            return;
        }
        let percent = state.progress.clamp(percent);
        let _ = self.tx.send(WorkerEvent::Progress {
            percent,
            message: message.to_string(),
        });
    }

    fn auth_required(&self, kind: AuthKind) {
        let state = self.state.lock().expect("emitter poisoned");
        if state.terminal_sent {
            return;
        }
        let _ = self.tx.send(WorkerEvent::AuthRequired(kind));
    }

    fn complete(&self, output_path: PathBuf, page_count: usize, suggested_name: String) {
        let mut state = self.state.lock().expect("emitter poisoned");
        if state.terminal_sent {
            return;
        }
        state.terminal_sent = true;
        let _ = self.tx.send(WorkerEvent::Complete {
            output_path,
            page_count,
            suggested_name,
        });
    }

    fn error(&self, error: &ConvertError) {
        let mut state = self.state.lock().expect("emitter poisoned");
        if state.terminal_sent {
            return;
        }
        state.terminal_sent = true;
        let _ = self.tx.send(WorkerEvent::Error {
            message: error.user_message(),
            detail: error.technical_detail(),
        });
    }
}

// ── The worker task ──────────────────────────────────────────────────────

struct Completion {
    output_path: PathBuf,
    page_count: usize,
    suggested_name: String,
}

async fn run(
    url: String,
    config: ConversionConfig,
    names: Arc<NamePool>,
    emitter: Emitter,
    cancel: CancelFlag,
    exchange: Arc<CredentialExchange>,
    awaiting: Arc<AtomicBool>,
) {
    let pipeline = run_pipeline(
        &url, &config, &names, &emitter, &cancel, &exchange, &awaiting,
    );
    // The task must never die silently: a panic anywhere in the pipeline is
    // reported as a generic error event with the captured payload.
    match std::panic::AssertUnwindSafe(pipeline).catch_unwind().await {
        Ok(Ok(done)) => {
            info!(path = %done.output_path.display(), pages = done.page_count, "conversion complete");
            emitter.complete(done.output_path, done.page_count, done.suggested_name);
        }
        Ok(Err(e)) if e.is_cancelled() => {
            debug!("conversion cancelled, no terminal event");
        }
        Ok(Err(e)) => {
            warn!("conversion failed: {e}");
            emitter.error(&e);
        }
        Err(panic) => {
            let detail = panic_detail(panic);
            warn!("worker panicked: {detail}");
            emitter.error(&ConvertError::Internal(truncate_detail(&detail)));
        }
    }
}

fn panic_detail(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker task panicked".to_string()
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_pipeline(
    url: &str,
    config: &ConversionConfig,
    names: &NamePool,
    emitter: &Emitter,
    cancel: &CancelFlag,
    exchange: &CredentialExchange,
    awaiting: &AtomicBool,
) -> Result<Completion, ConvertError> {
    emitter.progress(0, "Initializing...");
    let url = DocumentUrl::parse(url)?;

    let driver: Arc<dyn CaptureDriver> = match &config.driver {
        Some(driver) => Arc::clone(driver),
        None => Arc::new(
            BrowserDriver::launch(
                config.viewport,
                Duration::from_secs(config.nav_timeout_secs),
                Duration::from_millis(config.page_settle_ms),
            )
            .await?,
        ),
    };

    // Teardown happens whatever `drive` returns; a cancelled or failed run
    // must not leak the browser session.
    let result = drive(
        &url, &*driver, config, names, emitter, cancel, exchange, awaiting,
    )
    .await;
    driver.close().await;
    result
}

#[allow(clippy::too_many_arguments)]
async fn drive(
    url: &DocumentUrl,
    driver: &dyn CaptureDriver,
    config: &ConversionConfig,
    names: &NamePool,
    emitter: &Emitter,
    cancel: &CancelFlag,
    exchange: &CredentialExchange,
    awaiting: &AtomicBool,
) -> Result<Completion, ConvertError> {
    emitter.progress(5, "Loading document...");
    let mut gate = driver.open(url).await?;

    // One pre-supplied attempt plus one pause-and-retry per gate kind; a
    // gate that still is not open after that is treated as a rejection.
    const MAX_GATE_ATTEMPTS: u8 = 2;

    let mut email = config.email.clone();
    let mut passcode = config.passcode.clone();
    let mut paused_for_email = false;
    let mut paused_for_passcode = false;
    let mut email_attempts = 0u8;
    let mut passcode_attempts = 0u8;
    let mut last_kind = AuthKind::Email;

    let scrape = loop {
        if cancel.requested() {
            return Err(ConvertError::Cancelled);
        }
        gate = match gate {
            GateState::Open { .. } => {
                break capture(driver, emitter, cancel).await?;
            }
            GateState::NeedsEmail => {
                last_kind = AuthKind::Email;
                if email_attempts >= MAX_GATE_ATTEMPTS {
                    return Err(ConvertError::InvalidCredentials);
                }
                if email.is_none() {
                    let creds = request_credentials(
                        AuthKind::Email,
                        &mut paused_for_email,
                        emitter,
                        exchange,
                        awaiting,
                        cancel,
                    )
                    .await?;
                    passcode = creds.passcode.or(passcode);
                    email = Some(creds.email);
                }
                emitter.progress(15, "Authenticating...");
                email_attempts += 1;
                let address = email.as_deref().unwrap_or_default();
                driver.submit_email(address).await?
            }
            GateState::NeedsPasscode => {
                last_kind = AuthKind::Passcode;
                if passcode_attempts >= MAX_GATE_ATTEMPTS {
                    return Err(ConvertError::InvalidCredentials);
                }
                if email.is_none() || passcode.is_none() {
                    let creds = request_credentials(
                        AuthKind::Passcode,
                        &mut paused_for_passcode,
                        emitter,
                        exchange,
                        awaiting,
                        cancel,
                    )
                    .await?;
                    email = Some(creds.email);
                    passcode = creds.passcode;
                    if passcode.is_none() {
                        // The pause was consumed without a passcode; there is
                        // nothing left to try.
                        return Err(ConvertError::InvalidCredentials);
                    }
                }
                emitter.progress(15, "Authenticating...");
                passcode_attempts += 1;
                let address = email.as_deref().unwrap_or_default();
                let code = passcode.as_deref().unwrap_or_default();
                driver.submit_passcode(address, code).await?
            }
            GateState::InvalidCredentials => {
                // Route back to the step that was rejected, at most once.
                match last_kind {
                    AuthKind::Email => {
                        if paused_for_email {
                            return Err(ConvertError::InvalidCredentials);
                        }
                        email = None;
                        GateState::NeedsEmail
                    }
                    AuthKind::Passcode => {
                        if paused_for_passcode {
                            return Err(ConvertError::InvalidCredentials);
                        }
                        passcode = None;
                        GateState::NeedsPasscode
                    }
                }
            }
            GateState::InvalidUrl => {
                return Err(ConvertError::InvalidUrl {
                    input: url.as_str().to_string(),
                });
            }
            GateState::Unreachable => {
                return Err(ConvertError::Unreachable {
                    detail: "the document page never became reachable".into(),
                });
            }
        };
    };

    if cancel.requested() {
        return Err(ConvertError::Cancelled);
    }
    emitter.progress(62, "Generating name...");
    let suggested_name = match &config.output_name {
        Some(name) => name.clone(),
        None => names.next_name(),
    };

    if cancel.requested() {
        return Err(ConvertError::Cancelled);
    }
    emitter.progress(70, "Building PDF...");
    let quality = config.jpeg_quality;
    let page_count = scrape.page_count;
    let pages = scrape.pages;
    let pdf = tokio::task::spawn_blocking(move || build_pdf(&pages, quality))
        .await
        .map_err(|e| ConvertError::Internal(format!("assembly task panicked: {e}")))??;

    if cancel.requested() {
        return Err(ConvertError::Cancelled);
    }
    emitter.progress(90, "Saving PDF...");
    let output_dir = config.output_dir.clone();
    let base = suggested_name.clone();
    let output_path = tokio::task::spawn_blocking(move || save_pdf(&output_dir, &base, &pdf))
        .await
        .map_err(|e| ConvertError::Internal(format!("save task panicked: {e}")))??;

    emitter.progress(100, "Complete!");
    Ok(Completion {
        output_path,
        page_count,
        suggested_name,
    })
}

/// Capture every page, mapping `(current, total)` onto the 0 to 60 band.
async fn capture(
    driver: &dyn CaptureDriver,
    emitter: &Emitter,
    cancel: &CancelFlag,
) -> Result<ScrapeResult, ConvertError> {
    let on_progress = |current: usize, total: usize| {
        let percent = ((current as f64 / total.max(1) as f64) * 60.0) as u8;
        emitter.progress(percent, &format!("Capturing page {current} of {total}"));
    };
    driver.capture_pages(&on_progress, cancel).await
}

/// Pause for human-supplied credentials, once per gate kind.
///
/// A second pause request for the same kind means the previous answer was
/// already rejected; that is the terminal invalid-credentials case.
async fn request_credentials(
    kind: AuthKind,
    paused_before: &mut bool,
    emitter: &Emitter,
    exchange: &CredentialExchange,
    awaiting: &AtomicBool,
    cancel: &CancelFlag,
) -> Result<Credentials, ConvertError> {
    if *paused_before {
        return Err(ConvertError::InvalidCredentials);
    }
    *paused_before = true;

    emitter.progress(10, "Authentication required...");
    // Open the submission window before the event goes out, so credentials
    // sent in immediate response to it are never dropped.
    awaiting.store(true, Ordering::SeqCst);
    emitter.auth_required(kind);

    let outcome = exchange.wait().await;
    awaiting.store(false, Ordering::SeqCst);

    match outcome {
        AuthOutcome::Supplied(creds) if !cancel.requested() => Ok(creds),
        _ => Err(ConvertError::Cancelled),
    }
}

// ── Saving ───────────────────────────────────────────────────────────────

/// Write `bytes` under `dir` as `base.pdf`, appending ` (1)`, ` (2)`, … until
/// an unused path is found. Atomic: the bytes land in a temp file first and
/// are renamed into place with no-clobber semantics, so an existing file is
/// never overwritten even when two writers race.
fn save_pdf(dir: &Path, base: &str, bytes: &[u8]) -> Result<PathBuf, ConvertError> {
    use std::io::Write;

    std::fs::create_dir_all(dir).map_err(|source| ConvertError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|source| ConvertError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    tmp.write_all(bytes).map_err(|source| ConvertError::Io {
        path: tmp.path().to_path_buf(),
        source,
    })?;

    let mut counter = 0usize;
    loop {
        let candidate = if counter == 0 {
            dir.join(format!("{base}.pdf"))
        } else {
            dir.join(format!("{base} ({counter}).pdf"))
        };
        match tmp.persist_noclobber(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => {
                tmp = e.file;
                counter += 1;
            }
            Err(e) => {
                return Err(ConvertError::Io {
                    path: candidate,
                    source: e.error,
                });
            }
        }
    }
}
