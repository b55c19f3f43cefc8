//! Domain error types for nyx.
//!
//! Typed errors at module boundaries replace string-encoded errors and
//! enable structured error handling via pattern matching.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Inference engine errors
// ---------------------------------------------------------------------------

/// Errors from the inference engine.
///
/// Embedded in `anyhow::Error` so the `InferenceEngine` trait signature
/// (`-> anyhow::Result<String>`) stays simple while callers can downcast:
/// `e.downcast_ref::<EngineError>()`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    #[error("Failed to read response body: {0}")]
    ResponseReadError(String),

    #[error("Failed to parse response JSON: {0}")]
    JsonParseError(String),

    #[error("Engine error (status {status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Completion response had no content field")]
    MissingContent,
}

// ---------------------------------------------------------------------------
// Session store errors
// ---------------------------------------------------------------------------

/// Errors from persisting the session file. Loading never errors.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to write session file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize session: {0}")]
    Serialize(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// llama-server launch errors
// ---------------------------------------------------------------------------

/// Fatal startup errors when launching the local llama.cpp server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Model not found at {}", .0.display())]
    ModelNotFound(PathBuf),

    #[error("Failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("llama-server exited before becoming healthy: {0}")]
    ExitedEarly(String),

    #[error("llama-server not healthy after {0}s")]
    NotReady(u64),
}
