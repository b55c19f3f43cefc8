//! Managed llama.cpp server: spawn with GPU offload settings, wait for
//! `/health`, kill on drop.

use std::io::Write;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::schema::LlamaServerConfig;
use crate::errors::ServerError;
use crate::tui::ansi;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const BAR_WIDTH: usize = 24;

/// Command-line arguments for `llama-server`.
pub fn build_args(cfg: &LlamaServerConfig, model_path: &Path) -> Vec<String> {
    let mut args = vec![
        "--model".to_string(),
        model_path.display().to_string(),
        "--port".to_string(),
        cfg.port.to_string(),
        "--ctx-size".to_string(),
        cfg.context_window.to_string(),
        "--n-gpu-layers".to_string(),
        cfg.gpu_layers.to_string(),
        "--main-gpu".to_string(),
        cfg.main_gpu.to_string(),
    ];
    if !cfg.tensor_split.is_empty() {
        let split: Vec<String> = cfg.tensor_split.iter().map(|s| s.to_string()).collect();
        args.push("--tensor-split".to_string());
        args.push(split.join(","));
    }
    args.push("--threads".to_string());
    args.push(cfg.effective_threads().to_string());
    args
}

/// A running `llama-server` child owned by the console.
pub struct LlamaServer {
    child: Child,
    port: u16,
    stderr_tail: Arc<Mutex<Vec<String>>>,
}

impl LlamaServer {
    /// Spawn the server and wait until it answers `/health`.
    pub async fn launch(cfg: &LlamaServerConfig) -> Result<Self, ServerError> {
        let mut server = Self::spawn(cfg)?;
        server
            .wait_ready(Duration::from_secs(cfg.startup_timeout_secs))
            .await?;
        Ok(server)
    }

    /// Spawn without waiting. A missing model file is reported before any
    /// process is started.
    pub fn spawn(cfg: &LlamaServerConfig) -> Result<Self, ServerError> {
        let model_path = cfg.resolved_model_path();
        if !model_path.exists() {
            return Err(ServerError::ModelNotFound(model_path));
        }

        let args = build_args(cfg, &model_path);
        info!(binary = %cfg.binary, ?args, "Starting llama-server");

        let mut child = Command::new(&cfg.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ServerError::Spawn {
                binary: cfg.binary.clone(),
                source,
            })?;

        // Drain stderr so the pipe never fills and blocks the server.
        let stderr_tail = Arc::new(Mutex::new(Vec::new()));
        if let Some(stderr) = child.stderr.take() {
            let lines = stderr_tail.clone();
            std::thread::spawn(move || {
                use std::io::BufRead;
                for line in std::io::BufReader::new(stderr).lines().map_while(Result::ok) {
                    if let Ok(mut lines) = lines.lock() {
                        if lines.len() >= 20 {
                            lines.remove(0);
                        }
                        lines.push(line);
                    }
                }
            });
        }

        Ok(Self {
            child,
            port: cfg.port,
            stderr_tail,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub async fn wait_ready(&mut self, timeout: Duration) -> Result<(), ServerError> {
        let url = self.base_url();
        let child = &mut self.child;
        let tail = self.stderr_tail.clone();
        wait_for_server_ready(&url, timeout, || match child.try_wait() {
            Ok(Some(status)) => Some(
                tail.lock()
                    .ok()
                    .and_then(|l| l.last().cloned())
                    .unwrap_or_else(|| status.to_string()),
            ),
            _ => None,
        })
        .await
    }
}

impl Drop for LlamaServer {
    fn drop(&mut self) {
        debug!(port = self.port, "Stopping llama-server");
        if let Err(e) = self.child.kill() {
            debug!("llama-server already gone: {}", e);
        }
        self.child.wait().ok();
    }
}

/// Poll `{base_url}/health` until it returns success, drawing a progress bar.
///
/// `exited` is checked before each poll and returns the reason if the server
/// process has died.
pub async fn wait_for_server_ready(
    base_url: &str,
    timeout: Duration,
    mut exited: impl FnMut() -> Option<String>,
) -> Result<(), ServerError> {
    let client = reqwest::Client::new();
    let url = format!("{}/health", base_url.trim_end_matches('/'));
    let start = Instant::now();
    let deadline = start + timeout;
    let mut stdout = std::io::stdout();

    let clear = |out: &mut std::io::Stdout| {
        write!(out, "\r{}{}\r", ansi::SHOW_CURSOR, " ".repeat(BAR_WIDTH + 30)).ok();
        out.flush().ok();
    };

    write!(stdout, "{}", ansi::HIDE_CURSOR).ok();
    while Instant::now() < deadline {
        if let Some(reason) = exited() {
            clear(&mut stdout);
            warn!("llama-server exited during startup: {}", reason);
            return Err(ServerError::ExitedEarly(reason));
        }

        let elapsed = start.elapsed().as_secs_f64();
        let frac = (elapsed / timeout.as_secs_f64()).min(1.0);
        let filled = (frac * BAR_WIDTH as f64) as usize;
        write!(
            stdout,
            "\r  {}Loading model [{}{}{}{}{}] {:.0}s{}",
            ansi::DIM,
            ansi::RESET,
            ansi::CYAN,
            "\u{2588}".repeat(filled),
            "\u{2591}".repeat(BAR_WIDTH - filled),
            ansi::DIM,
            elapsed,
            ansi::RESET,
        )
        .ok();
        stdout.flush().ok();

        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => {
                clear(&mut stdout);
                info!(elapsed_secs = elapsed, "llama-server is healthy");
                return Ok(());
            }
            Ok(resp) => debug!(status = %resp.status(), "llama-server still loading"),
            Err(e) => debug!("health probe failed: {}", e),
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    clear(&mut stdout);
    Err(ServerError::NotReady(timeout.as_secs()))
}
