//! End-to-end worker scenarios over a scripted capture driver.
//!
//! The browser is replaced by a driver that plays back a script of gate
//! states and produces tiny real PNG pages, so every other stage (the gate
//! loop, the credential pause, assembly, naming, collision-avoided save)
//! runs exactly as in production.

use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use docsend2pdf::pipeline::capture::PageProgress;
use docsend2pdf::{
    AuthKind, CancelFlag, CaptureDriver, CapturedPage, ConversionConfig, ConversionWorker,
    ConvertError, DocumentUrl, GateState, NamePool, ScrapeResult, WorkerEvent,
};

const VIEW_URL: &str = "https://docsend.com/view/abc123";

// ── Scripted driver ──────────────────────────────────────────────────────

fn tiny_png() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 100, 50]));
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .expect("encode test png");
    png
}

/// Plays back a script of gate states; each `open`/`submit_*` call consumes
/// the next entry.
struct ScriptedDriver {
    script: Mutex<VecDeque<Result<GateState, ConvertError>>>,
    page_count: usize,
    page_delay: Duration,
    opens: AtomicUsize,
    emails: Mutex<Vec<String>>,
    passcodes: Mutex<Vec<(String, String)>>,
    closed: AtomicBool,
}

impl ScriptedDriver {
    fn new(script: Vec<Result<GateState, ConvertError>>, page_count: usize) -> Arc<Self> {
        Self::with_page_delay(script, page_count, Duration::ZERO)
    }

    fn with_page_delay(
        script: Vec<Result<GateState, ConvertError>>,
        page_count: usize,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            page_count,
            page_delay: delay,
            opens: AtomicUsize::new(0),
            emails: Mutex::new(Vec::new()),
            passcodes: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        })
    }

    fn next_state(&self) -> Result<GateState, ConvertError> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .expect("driver script exhausted")
    }
}

#[async_trait]
impl CaptureDriver for ScriptedDriver {
    async fn open(&self, _url: &DocumentUrl) -> Result<GateState, ConvertError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.next_state()
    }

    async fn submit_email(&self, email: &str) -> Result<GateState, ConvertError> {
        self.emails.lock().unwrap().push(email.to_string());
        self.next_state()
    }

    async fn submit_passcode(
        &self,
        email: &str,
        passcode: &str,
    ) -> Result<GateState, ConvertError> {
        self.passcodes
            .lock()
            .unwrap()
            .push((email.to_string(), passcode.to_string()));
        self.next_state()
    }

    async fn capture_pages(
        &self,
        on_progress: PageProgress<'_>,
        cancel: &CancelFlag,
    ) -> Result<ScrapeResult, ConvertError> {
        let total = self.page_count;
        let mut pages = Vec::with_capacity(total);
        for index in 1..=total {
            if cancel.requested() {
                return Err(ConvertError::Cancelled);
            }
            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
            pages.push(CapturedPage {
                index,
                png: tiny_png(),
            });
            on_progress(index, total);
        }
        Ok(ScrapeResult {
            page_count: pages.len(),
            pages,
        })
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

struct TestRig {
    _state: TempDir,
    out: TempDir,
    names: Arc<NamePool>,
}

impl TestRig {
    fn new() -> Self {
        let state = TempDir::new().unwrap();
        let names = Arc::new(NamePool::load(state.path().join("used_names.json")));
        Self {
            _state: state,
            out: TempDir::new().unwrap(),
            names,
        }
    }

    fn config(&self, driver: Arc<ScriptedDriver>) -> ConversionConfig {
        ConversionConfig::builder()
            .output_dir(self.out.path())
            .driver(driver)
            .build()
            .unwrap()
    }
}

/// Drain all events until the channel closes.
async fn collect_events(handle: &mut docsend2pdf::WorkerHandle) -> Vec<WorkerEvent> {
    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }
    events
}

fn percents(events: &[WorkerEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            WorkerEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect()
}

fn terminal_events(events: &[WorkerEvent]) -> Vec<&WorkerEvent> {
    events.iter().filter(|e| e.is_terminal()).collect()
}

// ── Scenario A: open document, six pages ─────────────────────────────────

#[tokio::test]
async fn open_document_converts_end_to_end() {
    let rig = TestRig::new();
    let driver = ScriptedDriver::new(vec![Ok(GateState::Open { page_count: 6 })], 6);
    let mut handle =
        ConversionWorker::spawn(VIEW_URL, rig.config(Arc::clone(&driver)), rig.names.clone());

    let events = collect_events(&mut handle).await;

    let pct = percents(&events);
    assert!(pct.windows(2).all(|w| w[0] <= w[1]), "progress decreased: {pct:?}");
    assert_eq!(*pct.last().unwrap(), 100);

    let terminals = terminal_events(&events);
    assert_eq!(terminals.len(), 1, "exactly one terminal event");
    match terminals[0] {
        WorkerEvent::Complete {
            output_path,
            page_count,
            suggested_name,
        } => {
            assert_eq!(*page_count, 6);
            assert!(!suggested_name.is_empty());
            assert_eq!(
                output_path.file_name().unwrap().to_string_lossy(),
                format!("{suggested_name}.pdf")
            );
            let bytes = std::fs::read(output_path).unwrap();
            assert!(bytes.starts_with(b"%PDF"));
            let doc = lopdf::Document::load_mem(&bytes).unwrap();
            assert_eq!(doc.get_pages().len(), 6);
        }
        other => panic!("expected Complete, got {other:?}"),
    }
    assert!(driver.closed.load(Ordering::SeqCst), "session released");
}

// ── Scenario B: email gate, credentials supplied through the pause ───────

#[tokio::test]
async fn email_gate_pauses_then_resumes() {
    let rig = TestRig::new();
    let driver = ScriptedDriver::new(
        vec![
            Ok(GateState::NeedsEmail),
            Ok(GateState::Open { page_count: 3 }),
        ],
        3,
    );
    let mut handle =
        ConversionWorker::spawn(VIEW_URL, rig.config(Arc::clone(&driver)), rig.names.clone());

    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        if event == WorkerEvent::AuthRequired(AuthKind::Email) {
            handle.provide_credentials("a@b.com", None);
        }
        events.push(event);
    }

    assert!(events.contains(&WorkerEvent::AuthRequired(AuthKind::Email)));
    assert_eq!(driver.emails.lock().unwrap().as_slice(), ["a@b.com"]);
    assert!(matches!(
        terminal_events(&events).as_slice(),
        [WorkerEvent::Complete { page_count: 3, .. }]
    ));
}

// ── Scenario C: wrong passcode is terminal, not an infinite loop ─────────

#[tokio::test]
async fn wrong_passcode_surfaces_invalid_credentials() {
    let rig = TestRig::new();
    let driver = ScriptedDriver::new(
        vec![
            Ok(GateState::NeedsEmail),
            Ok(GateState::NeedsPasscode),
            Ok(GateState::InvalidCredentials),
        ],
        0,
    );
    let config = ConversionConfig::builder()
        .output_dir(rig.out.path())
        .driver(Arc::clone(&driver) as Arc<dyn CaptureDriver>)
        .email("a@b.com")
        .build()
        .unwrap();
    let mut handle = ConversionWorker::spawn(VIEW_URL, config, rig.names.clone());

    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        if event == WorkerEvent::AuthRequired(AuthKind::Passcode) {
            handle.provide_credentials("a@b.com", Some("wrong".into()));
        }
        events.push(event);
    }

    assert!(events.contains(&WorkerEvent::AuthRequired(AuthKind::Passcode)));
    assert_eq!(
        driver.passcodes.lock().unwrap().as_slice(),
        [("a@b.com".to_string(), "wrong".to_string())]
    );
    match terminal_events(&events).as_slice() {
        [WorkerEvent::Error { message, .. }] => {
            assert_eq!(message, "Invalid email or passcode");
        }
        other => panic!("expected a single Error, got {other:?}"),
    }
    assert!(driver.closed.load(Ordering::SeqCst));
}

// ── Scenario D: cancel two pages into a six-page capture ─────────────────

#[tokio::test]
async fn cancel_mid_capture_is_silent() {
    let rig = TestRig::new();
    let driver = ScriptedDriver::with_page_delay(
        vec![Ok(GateState::Open { page_count: 6 })],
        6,
        Duration::from_millis(25),
    );
    let mut handle =
        ConversionWorker::spawn(VIEW_URL, rig.config(Arc::clone(&driver)), rig.names.clone());

    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        if let WorkerEvent::Progress { message, .. } = &event {
            if message.starts_with("Capturing page 2") {
                handle.cancel();
            }
        }
        events.push(event);
    }

    assert!(terminal_events(&events).is_empty(), "cancel is silent: {events:?}");
    assert!(driver.closed.load(Ordering::SeqCst), "session released");
    let leftovers: Vec<_> = std::fs::read_dir(rig.out.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .collect();
    assert!(leftovers.is_empty(), "no partial output: {leftovers:?}");
}

// ── Cancel during the credential pause ───────────────────────────────────

#[tokio::test]
async fn cancel_during_auth_wait_unblocks_immediately() {
    let rig = TestRig::new();
    let driver = ScriptedDriver::new(vec![Ok(GateState::NeedsEmail)], 0);
    let mut handle =
        ConversionWorker::spawn(VIEW_URL, rig.config(Arc::clone(&driver)), rig.names.clone());

    let mut events = Vec::new();
    let drained = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(event) = handle.next_event().await {
            if event == WorkerEvent::AuthRequired(AuthKind::Email) {
                handle.cancel();
            }
            events.push(event);
        }
    })
    .await;

    assert!(drained.is_ok(), "worker must unblock after cancel");
    assert!(terminal_events(&events).is_empty());
    assert!(driver.closed.load(Ordering::SeqCst));
}

// ── Stray credentials while loading are ignored ──────────────────────────

#[tokio::test]
async fn credentials_outside_a_pause_are_ignored() {
    let rig = TestRig::new();
    let driver = ScriptedDriver::new(
        vec![
            Ok(GateState::NeedsEmail),
            Ok(GateState::Open { page_count: 2 }),
        ],
        2,
    );
    let mut handle =
        ConversionWorker::spawn(VIEW_URL, rig.config(Arc::clone(&driver)), rig.names.clone());

    // Not in an awaiting state yet; this must not pre-fill the exchange.
    handle.provide_credentials("stray@b.com", None);

    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        if event == WorkerEvent::AuthRequired(AuthKind::Email) {
            handle.provide_credentials("real@b.com", None);
        }
        events.push(event);
    }

    // The pause still happened, and only the in-pause submission was used.
    assert!(events.contains(&WorkerEvent::AuthRequired(AuthKind::Email)));
    assert_eq!(driver.emails.lock().unwrap().as_slice(), ["real@b.com"]);
    assert!(matches!(
        terminal_events(&events).as_slice(),
        [WorkerEvent::Complete { .. }]
    ));
}

// ── URL validation happens before any driver call ────────────────────────

#[tokio::test]
async fn invalid_url_fails_without_network() {
    let rig = TestRig::new();
    let driver = ScriptedDriver::new(vec![], 0);
    let mut handle = ConversionWorker::spawn(
        "https://example.com/view/abc123",
        rig.config(Arc::clone(&driver)),
        rig.names.clone(),
    );

    let events = collect_events(&mut handle).await;
    match terminal_events(&events).as_slice() {
        [WorkerEvent::Error { message, .. }] => {
            assert_eq!(message, "Invalid DocSend URL format");
        }
        other => panic!("expected Error, got {other:?}"),
    }
    assert_eq!(driver.opens.load(Ordering::SeqCst), 0, "no navigation attempted");
}

#[tokio::test]
async fn valid_urls_never_fail_validation() {
    for url in [
        "https://docsend.com/view/abc123",
        "http://www.docsend.com/view/XyZ9",
        "HTTPS://DocSend.com/view/q1w2e3",
    ] {
        let rig = TestRig::new();
        let driver = ScriptedDriver::new(vec![Ok(GateState::Open { page_count: 1 })], 1);
        let mut handle =
            ConversionWorker::spawn(url, rig.config(Arc::clone(&driver)), rig.names.clone());
        let events = collect_events(&mut handle).await;
        assert!(
            matches!(
                terminal_events(&events).as_slice(),
                [WorkerEvent::Complete { .. }]
            ),
            "{url} should convert, got {events:?}"
        );
    }
}

// ── Pre-supplied wrong email gets exactly one retry pause ────────────────

#[tokio::test]
async fn presupplied_email_gets_one_retry_pause() {
    let rig = TestRig::new();
    let driver = ScriptedDriver::new(
        vec![
            Ok(GateState::NeedsEmail),          // open
            Ok(GateState::InvalidCredentials),  // pre-supplied email rejected
            Ok(GateState::Open { page_count: 1 }), // retry accepted
        ],
        1,
    );
    let config = ConversionConfig::builder()
        .output_dir(rig.out.path())
        .driver(Arc::clone(&driver) as Arc<dyn CaptureDriver>)
        .email("typo@b.com")
        .build()
        .unwrap();
    let mut handle = ConversionWorker::spawn(VIEW_URL, config, rig.names.clone());

    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        if event == WorkerEvent::AuthRequired(AuthKind::Email) {
            handle.provide_credentials("fixed@b.com", None);
        }
        events.push(event);
    }

    assert_eq!(
        driver.emails.lock().unwrap().as_slice(),
        ["typo@b.com", "fixed@b.com"]
    );
    assert!(matches!(
        terminal_events(&events).as_slice(),
        [WorkerEvent::Complete { .. }]
    ));
}

// ── Collision-avoided saving ─────────────────────────────────────────────

#[tokio::test]
async fn existing_files_are_never_overwritten() {
    let rig = TestRig::new();

    for expected in ["Foo.pdf", "Foo (1).pdf", "Foo (2).pdf"] {
        let driver = ScriptedDriver::new(vec![Ok(GateState::Open { page_count: 1 })], 1);
        let config = ConversionConfig::builder()
            .output_dir(rig.out.path())
            .driver(driver as Arc<dyn CaptureDriver>)
            .output_name("Foo")
            .build()
            .unwrap();
        let mut handle = ConversionWorker::spawn(VIEW_URL, config, rig.names.clone());
        let events = collect_events(&mut handle).await;
        match terminal_events(&events).as_slice() {
            [WorkerEvent::Complete { output_path, .. }] => {
                assert_eq!(output_path.file_name().unwrap().to_string_lossy(), expected);
            }
            other => panic!("expected Complete, got {other:?}"),
        }
    }
}

// ── The name pool is bypassed for caller-named output ────────────────────

#[tokio::test]
async fn custom_output_name_skips_the_pool() {
    let rig = TestRig::new();
    let available_before = rig.names.available();

    let driver = ScriptedDriver::new(vec![Ok(GateState::Open { page_count: 1 })], 1);
    let config = ConversionConfig::builder()
        .output_dir(rig.out.path())
        .driver(driver as Arc<dyn CaptureDriver>)
        .output_name("Quarterly")
        .build()
        .unwrap();
    let mut handle = ConversionWorker::spawn(VIEW_URL, config, rig.names.clone());
    let events = collect_events(&mut handle).await;

    assert!(matches!(
        terminal_events(&events).as_slice(),
        [WorkerEvent::Complete { suggested_name, .. }] if suggested_name == "Quarterly"
    ));
    assert_eq!(rig.names.available(), available_before);
}

// ── Unreachable documents map to a network error ─────────────────────────

#[tokio::test]
async fn unreachable_document_reports_network_error() {
    let rig = TestRig::new();
    let driver = ScriptedDriver::new(
        vec![Err(ConvertError::Unreachable {
            detail: "connection refused".into(),
        })],
        0,
    );
    let mut handle =
        ConversionWorker::spawn(VIEW_URL, rig.config(Arc::clone(&driver)), rig.names.clone());
    let events = collect_events(&mut handle).await;

    match terminal_events(&events).as_slice() {
        [WorkerEvent::Error { message, detail }] => {
            assert!(message.contains("Network error"), "{message}");
            assert!(detail.contains("connection refused"));
        }
        other => panic!("expected Error, got {other:?}"),
    }
    assert!(driver.closed.load(Ordering::SeqCst));
}
