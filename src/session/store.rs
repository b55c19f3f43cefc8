//! Durable session memory.
//!
//! The whole session lives in one pretty-printed JSON file with two fields,
//! `history` (ordered `{user, nyx}` pairs) and `sysinfo` (the last telemetry
//! snapshot). Loading is permissive and never fails: a missing or malformed
//! file yields an empty session. Saving is a full overwrite through a temp
//! file and rename.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::SessionError;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One operator utterance and the paired response (model or shell output).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub nyx: String,
}

impl Turn {
    pub fn new(user: impl Into<String>, nyx: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            nyx: nyx.into(),
        }
    }
}

/// The durable conversational state for one operator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Chronological; only ever appended to during a session.
    #[serde(default)]
    pub history: Vec<Turn>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sysinfo: String,
}

impl Session {
    /// Append a completed turn.
    pub fn push_turn(&mut self, turn: Turn) {
        self.history.push(turn);
    }

    /// Response text of the most recent turn, if any.
    pub fn last_response(&self) -> Option<&str> {
        self.history.last().map(|t| t.nyx.as_str())
    }
}

/// Older session files stored `sysinfo` as an object; anything that is not a
/// string reads as empty.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        _ => String::new(),
    })
}

// ---------------------------------------------------------------------------
// LoadOutcome
// ---------------------------------------------------------------------------

/// Result of reading the session file. Both variants carry a usable session,
/// so callers cannot forget to handle corruption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The file parsed cleanly.
    Loaded(Session),
    /// Nothing usable on disk. `Some(warning)` when a file existed but was
    /// unreadable or malformed, `None` when there was simply no file.
    Empty(Option<String>),
}

impl LoadOutcome {
    pub fn warning(&self) -> Option<&str> {
        match self {
            LoadOutcome::Empty(Some(w)) => Some(w.as_str()),
            _ => None,
        }
    }

    pub fn into_session(self) -> Session {
        match self {
            LoadOutcome::Loaded(session) => session,
            LoadOutcome::Empty(_) => Session::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// File-backed session record. Single process, single writer.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the session file. Never fails.
    pub fn load(&self) -> LoadOutcome {
        if !self.path.exists() {
            debug!("No session file at {}", self.path.display());
            return LoadOutcome::Empty(None);
        }

        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                let msg = format!("Failed to read session file {}: {}", self.path.display(), e);
                warn!("{}", msg);
                return LoadOutcome::Empty(Some(msg));
            }
        };

        match serde_json::from_str::<Session>(&content) {
            Ok(session) => {
                debug!(
                    turns = session.history.len(),
                    "Loaded session from {}",
                    self.path.display()
                );
                LoadOutcome::Loaded(session)
            }
            Err(e) => {
                let msg = format!(
                    "Corrupt session file {}: {}. Starting fresh.",
                    self.path.display(),
                    e
                );
                warn!("{}", msg);
                LoadOutcome::Empty(Some(msg))
            }
        }
    }

    /// Persist the whole session, replacing whatever was on disk.
    pub fn save(&self, session: &Session) -> Result<(), SessionError> {
        let json = serde_json::to_string_pretty(session)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| SessionError::Io {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let tmp = self.temp_path();
        fs::write(&tmp, json).map_err(|source| SessionError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| SessionError::Io {
            path: self.path.clone(),
            source,
        })?;

        debug!(turns = session.history.len(), "Saved session");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
