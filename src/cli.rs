//! Command implementations behind the `nyx` binary.

use std::future::Future;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::schema::Config;
use crate::providers::base::InferenceEngine;
use crate::providers::llama_server::LlamaServerEngine;
use crate::repl::Console;
use crate::server::LlamaServer;
use crate::session::{Session, SessionStore};
use crate::telemetry::{HostTelemetry, Telemetry};
use crate::tui;
use crate::utils::helpers::truncate_string;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub session: Option<PathBuf>,
    pub api_base: Option<String>,
    pub budget: Option<usize>,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.session {
            config.session.path = path.display().to_string();
        }
        if let Some(base) = &self.api_base {
            // An explicit endpoint means an external server.
            config.engine.api_base = base.clone();
            config.engine.server.enabled = false;
        }
        if let Some(budget) = self.budget {
            config.prompt.budget_tokens = budget;
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("Failed to create tokio runtime")
}

/// Drive `fut` on a fresh runtime, then shut it down without waiting on
/// blocking tasks. A line read abandoned by an interrupt stays parked in
/// `spawn_blocking` until the operator presses Enter; it must not hold the
/// process open.
pub fn block_on_detached<F: Future>(fut: F) -> Result<F::Output> {
    let rt = runtime()?;
    let output = rt.block_on(fut);
    rt.shutdown_background();
    Ok(output)
}

/// Cancel `token` on the first Ctrl+C.
fn spawn_interrupt_watcher(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received");
                token.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
        }
    });
}

/// Interactive console.
pub fn cmd_chat(config: Config) -> Result<()> {
    block_on_detached(run_chat(config))?
}

async fn run_chat(config: Config) -> Result<()> {
    // Held until the console exits; dropping it stops the server.
    let _server = if config.engine.server.enabled {
        println!(
            "[+] Loading Nyx Brain model with GPU acceleration: {}",
            config.engine.server.resolved_model_path().display()
        );
        Some(LlamaServer::launch(&config.engine.server).await?)
    } else {
        None
    };

    let engine: Arc<dyn InferenceEngine> = Arc::new(LlamaServerEngine::new(
        &config.engine.endpoint(),
        config.engine.temperature,
    ));
    let telemetry: Arc<dyn Telemetry> = Arc::new(HostTelemetry::new());
    let interrupt = CancellationToken::new();
    spawn_interrupt_watcher(interrupt.clone());

    let store = SessionStore::new(config.session.resolved_path());
    let mut console = Console::new(&config, store, engine, telemetry, interrupt);
    if !std::io::stdout().is_terminal() {
        console = console.with_indicator(None);
    }
    console.run().await
}

/// Print one telemetry snapshot.
pub fn cmd_sysinfo() -> Result<()> {
    let snapshot = runtime()?.block_on(HostTelemetry::new().snapshot());
    println!("{snapshot}");
    Ok(())
}

/// Print the newest `limit` stored turns.
pub fn cmd_history(config: &Config, limit: usize) -> Result<()> {
    let store = SessionStore::new(config.session.resolved_path());
    let outcome = store.load();
    if let Some(w) = outcome.warning() {
        println!("{}", tui::warning(&format!("[!] {w}")));
    }
    let session = outcome.into_session();

    println!("Session: {} ({} turns)", store.path().display(), session.history.len());
    let skip = session.history.len().saturating_sub(limit);
    for (i, turn) in session.history.iter().enumerate().skip(skip) {
        println!(
            "\n{}#{}{} {}User:{} {}",
            tui::DIM,
            i + 1,
            tui::RESET,
            tui::BOLD,
            tui::RESET,
            truncate_string(&turn.user, 200)
        );
        println!("   {}Nyx:{} {}", tui::MAGENTA, tui::RESET, truncate_string(&turn.nyx, 400));
    }
    Ok(())
}

/// Replace the stored session with an empty one.
pub fn cmd_forget(config: &Config) -> Result<()> {
    let store = SessionStore::new(config.session.resolved_path());
    store.save(&Session::default())?;
    println!("Session cleared: {}", store.path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Turn;

    #[test]
    fn test_overrides_apply() {
        let mut config = Config::default();
        config.engine.server.enabled = true;
        Overrides {
            session: Some(PathBuf::from("/tmp/nyx/s.json")),
            api_base: Some("http://10.0.0.2:9000".into()),
            budget: Some(2048),
        }
        .apply(&mut config);

        assert_eq!(config.session.resolved_path(), PathBuf::from("/tmp/nyx/s.json"));
        assert_eq!(config.engine.endpoint(), "http://10.0.0.2:9000");
        assert!(!config.engine.server.enabled);
        assert_eq!(config.prompt.budget_tokens, 2048);
    }

    #[test]
    fn test_empty_overrides_change_nothing() {
        let mut config = Config::default();
        let before = serde_json::to_string(&config).unwrap();
        Overrides::default().apply(&mut config);
        assert_eq!(serde_json::to_string(&config).unwrap(), before);
    }

    #[test]
    fn test_forget_clears_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.session.path = dir.path().join("mem.json").display().to_string();

        let store = SessionStore::new(config.session.resolved_path());
        let mut session = Session::default();
        session.push_turn(Turn::new("hi", "hello"));
        store.save(&session).unwrap();

        cmd_forget(&config).unwrap();
        assert!(store.load().into_session().history.is_empty());
        cmd_history(&config, 10).unwrap();
    }
}
