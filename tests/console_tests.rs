//! End-to-end tests for the console loop against stub engine and telemetry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use nyx::config::schema::Config;
use nyx::errors::EngineError;
use nyx::providers::base::InferenceEngine;
use nyx::repl::{Console, Step};
use nyx::session::{Session, SessionStore, Turn};
use nyx::telemetry::Telemetry;

/// Returns scripted replies in order, then repeats the last one.
struct StubEngine {
    replies: Vec<Result<String, String>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl StubEngine {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: replies.iter().map(|r| Ok(r.to_string())).collect(),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            replies: vec![Err(message.to_string())],
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            delay: None,
        })
    }

    fn slow(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            replies: vec![Ok(reply.to_string())],
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            delay: Some(delay),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceEngine for StubEngine {
    async fn generate(&self, prompt: &str, _max: u32, _stop: &[String]) -> anyhow::Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let reply = &self.replies[n.min(self.replies.len() - 1)];
        match reply {
            Ok(text) => Ok(text.clone()),
            Err(msg) => Err(EngineError::HttpError(msg.clone()).into()),
        }
    }

    fn describe(&self) -> String {
        "stub".to_string()
    }
}

/// Counts snapshots and numbers them.
#[derive(Default)]
struct StubTelemetry {
    count: AtomicUsize,
}

#[async_trait]
impl Telemetry for StubTelemetry {
    async fn snapshot(&self) -> String {
        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        format!("CPU Usage: {n}.0%\nMemory Usage: 10.0%\nGPU Info: No GPU detected\nOS: Test")
    }
}

struct Harness {
    _dir: tempfile::TempDir,
    store: SessionStore,
    console: Console,
    telemetry: Arc<StubTelemetry>,
    interrupt: CancellationToken,
}

fn harness(engine: Arc<StubEngine>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nyx_memory.json");

    let mut config = Config::default();
    config.session.path = path.display().to_string();
    config.console.typewriter_delay_ms = 0;
    config.console.show_thoughts = false;

    let telemetry = Arc::new(StubTelemetry::default());
    let interrupt = CancellationToken::new();
    let console = Console::new(
        &config,
        SessionStore::new(&path),
        engine,
        telemetry.clone(),
        interrupt.clone(),
    )
    .with_indicator(None);

    Harness {
        _dir: dir,
        store: SessionStore::new(&path),
        console,
        telemetry,
        interrupt,
    }
}

#[tokio::test]
async fn test_start_session_refreshes_and_persists_sysinfo() {
    let h = harness(StubEngine::new(&["ok"]));
    let session = h.console.start_session().await;
    assert!(session.sysinfo.starts_with("CPU Usage: 1.0%"));
    assert_eq!(h.store.load().into_session(), session);
}

#[tokio::test]
async fn test_status_keyword_updates_sysinfo_without_turn() {
    let h = harness(StubEngine::new(&["ok"]));
    let session = h.console.start_session().await;

    let (session, step) = h.console.handle(session, "!SYSINFO").await.unwrap();
    assert_eq!(step, Step::Continue);
    assert!(session.history.is_empty());
    assert!(session.sysinfo.starts_with("CPU Usage: 2.0%"));
    assert_eq!(h.telemetry.count.load(Ordering::SeqCst), 2);

    let stored = h.store.load().into_session();
    assert_eq!(stored.sysinfo, session.sysinfo);
    assert!(stored.history.is_empty());
}

#[tokio::test]
async fn test_turn_is_appended_and_saved() {
    let engine = StubEngine::new(&["  <thinking>ok</thinking> All systems nominal.<unk> "]);
    let h = harness(engine.clone());
    let session = h.console.start_session().await;

    let (session, step) = h.console.handle(session, "  status report  ").await.unwrap();
    assert_eq!(step, Step::Continue);
    assert_eq!(
        session.history,
        vec![Turn::new("status report", "ok All systems nominal.")]
    );
    assert_eq!(h.store.load().into_session(), session);

    let prompt = engine.prompts.lock().unwrap()[0].clone();
    assert!(prompt.contains("System Information:\nCPU Usage: 1.0%"));
    assert!(prompt.ends_with("User: status report\nNyx:"));
}

#[tokio::test]
async fn test_history_feeds_next_prompt() {
    let engine = StubEngine::new(&["first answer", "second answer"]);
    let h = harness(engine.clone());
    let session = h.console.start_session().await;

    let (session, _) = h.console.handle(session, "one").await.unwrap();
    let (session, _) = h.console.handle(session, "two").await.unwrap();
    assert_eq!(session.history.len(), 2);

    let prompts = engine.prompts.lock().unwrap();
    assert!(prompts[1].contains("User: one\nNyx: first answer\nUser: two\nNyx:"));
}

#[tokio::test]
async fn test_repeated_response_triggers_single_rephrase() {
    let engine = StubEngine::new(&["same thing"]);
    let h = harness(engine.clone());
    let mut session = h.console.start_session().await;
    session.push_turn(Turn::new("earlier", "same thing"));

    let (session, _) = h.console.handle(session, "again?").await.unwrap();
    assert_eq!(engine.calls(), 2);
    assert_eq!(session.history.len(), 2);
    assert_eq!(session.history[1], Turn::new("again?", "same thing"));

    let prompts = engine.prompts.lock().unwrap();
    assert!(prompts[1].ends_with("Nyx:\n(Do not repeat yourself. Rephrase your answer.)"));
}

#[tokio::test]
async fn test_repetition_check_survives_restart() {
    let engine = StubEngine::new(&["same thing"]);
    let h = harness(engine.clone());

    let mut saved = Session::default();
    saved.push_turn(Turn::new("earlier", "same thing"));
    h.store.save(&saved).unwrap();

    let session = h.console.start_session().await;
    let _ = h.console.handle(session, "again?").await.unwrap();
    assert_eq!(engine.calls(), 2);
}

#[tokio::test]
async fn test_engine_failure_appends_nothing() {
    let engine = StubEngine::failing("connection refused");
    let h = harness(engine.clone());
    let session = h.console.start_session().await;

    let (session, step) = h.console.handle(session, "hello?").await.unwrap();
    assert_eq!(step, Step::Continue);
    assert!(session.history.is_empty());
    assert_eq!(engine.calls(), 1);
    assert!(h.store.load().into_session().history.is_empty());
}

#[tokio::test]
async fn test_shell_command_is_appended() {
    let engine = StubEngine::new(&["unused"]);
    let h = harness(engine.clone());
    let session = h.console.start_session().await;

    let (session, step) = h
        .console
        .handle(session, "!echo nyx-online; echo oops >&2")
        .await
        .unwrap();
    assert_eq!(step, Step::Continue);
    assert_eq!(engine.calls(), 0);
    assert_eq!(
        session.history,
        vec![Turn::new(
            "!echo nyx-online; echo oops >&2",
            "nyx-online\noops\n"
        )]
    );
    assert_eq!(h.store.load().into_session().history, session.history);
}

#[tokio::test]
async fn test_failing_shell_command_still_recorded() {
    let h = harness(StubEngine::new(&["unused"]));
    let session = h.console.start_session().await;

    let (session, _) = h
        .console
        .handle(session, "!echo 'error: not found' >&2; exit 1")
        .await
        .unwrap();
    assert_eq!(session.history.len(), 1);
    assert_eq!(session.history[0].nyx.trim(), "error: not found");
}

#[tokio::test]
async fn test_exit_and_empty_lines() {
    let engine = StubEngine::new(&["unused"]);
    let h = harness(engine.clone());
    let session = h.console.start_session().await;

    let (session, step) = h.console.handle(session, "   ").await.unwrap();
    assert_eq!(step, Step::Continue);
    let (session, step) = h.console.handle(session, "Quit").await.unwrap();
    assert_eq!(step, Step::End);
    assert!(session.history.is_empty());
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_interrupt_during_generation_ends_without_turn() {
    let engine = StubEngine::slow("too late", Duration::from_secs(30));
    let h = harness(engine.clone());
    let session = h.console.start_session().await;

    let interrupt = h.interrupt.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        interrupt.cancel();
    });

    let (session, step) = tokio::time::timeout(
        Duration::from_secs(5),
        h.console.handle(session, "long question"),
    )
    .await
    .expect("interrupt should end generation promptly")
    .unwrap();

    assert_eq!(step, Step::End);
    assert!(session.history.is_empty());
    assert_eq!(engine.calls(), 1);
    assert!(h.store.load().into_session().history.is_empty());
}

#[tokio::test]
async fn test_corrupt_session_file_starts_fresh() {
    let h = harness(StubEngine::new(&["fine"]));
    std::fs::write(h.store.path(), "{\"history\": [").unwrap();

    let session = h.console.start_session().await;
    assert!(session.history.is_empty());

    let (session, _) = h.console.handle(session, "hi").await.unwrap();
    assert_eq!(h.store.load().into_session(), session);
}

#[test]
fn test_interrupt_at_prompt_does_not_hold_runtime_open() {
    // Stands in for a terminal that never delivers a line.
    let (_stdin_open, stdin) = std::sync::mpsc::channel::<String>();
    let (done_tx, done_rx) = std::sync::mpsc::channel();

    std::thread::spawn(move || {
        let result = nyx::cli::block_on_detached(async move {
            let interrupt = CancellationToken::new();
            let trigger = interrupt.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                trigger.cancel();
            });

            let read = tokio::task::spawn_blocking(move || stdin.recv().ok());
            tokio::select! {
                biased;
                _ = interrupt.cancelled() => None,
                line = read => line.ok().flatten(),
            }
        });
        let _ = done_tx.send(result.map_err(|e| e.to_string()));
    });

    let line = done_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("runtime should shut down with the read still parked")
        .unwrap();
    assert!(line.is_none());
}
