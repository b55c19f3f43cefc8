//! Input classification and the blocking line editor bridge.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use tracing::{debug, info, warn};

use crate::config::schema::ConsoleConfig;

/// What an operator line asks for. First match wins, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Exit,
    Status,
    /// Host shell command with the escape prefix removed.
    Shell(String),
    Empty,
    /// Conversational input, trimmed.
    Turn(String),
}

pub fn classify(line: &str, config: &ConsoleConfig) -> Classified {
    let line = line.trim();

    if config
        .exit_keywords
        .iter()
        .any(|k| k.eq_ignore_ascii_case(line))
    {
        return Classified::Exit;
    }
    if !config.status_keyword.is_empty() && line.eq_ignore_ascii_case(&config.status_keyword) {
        return Classified::Status;
    }
    if !config.escape_prefix.is_empty() {
        if let Some(command) = line.strip_prefix(config.escape_prefix.as_str()) {
            let command = command.trim();
            if command.is_empty() {
                return Classified::Empty;
            }
            return Classified::Shell(command.to_string());
        }
    }
    if line.is_empty() {
        return Classified::Empty;
    }
    Classified::Turn(line.to_string())
}

/// rustyline editor driven from async code.
///
/// `readline` blocks, so the editor is moved onto a blocking thread for each
/// call and handed back when the operator presses Enter.
pub struct LineEditor {
    rl: Option<rustyline::DefaultEditor>,
    history_path: PathBuf,
}

impl LineEditor {
    /// Create the editor and load input history from `history_path`.
    pub fn open(history_path: &Path) -> Result<Self> {
        let mut rl = rustyline::DefaultEditor::new().context("Failed to create line editor")?;
        if let Err(e) = rl.load_history(history_path) {
            debug!("No input history loaded from {}: {}", history_path.display(), e);
        }
        Ok(Self {
            rl: Some(rl),
            history_path: history_path.to_path_buf(),
        })
    }

    /// Read one line. `None` means the operator closed the input (Ctrl+C or
    /// Ctrl+D).
    pub async fn readline(&mut self, prompt: &str) -> Result<Option<String>> {
        let mut rl = self.rl.take().context("line editor lost by an abandoned read")?;
        let prompt = prompt.to_string();
        let (rl, result) = tokio::task::spawn_blocking(move || {
            let result = rl.readline(&prompt);
            (rl, result)
        })
        .await
        .context("readline task panicked")?;
        self.rl = Some(rl);

        match result {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Some(rl) = self.rl.as_mut() {
                        let _ = rl.add_history_entry(line.as_str());
                    }
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e).context("Failed to read input"),
        }
    }

    pub fn save_history(&mut self) {
        let Some(rl) = self.rl.as_mut() else {
            info!("Input history not saved: line read was abandoned");
            return;
        };
        if let Err(e) = rl.save_history(&self.history_path) {
            warn!("Failed to save input history to {}: {}", self.history_path.display(), e);
        }
    }
}
