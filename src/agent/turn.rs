//! One request/response cycle against the inference engine.
//!
//! Each attempt calls the engine once, then strips control markers from the
//! raw text. If the cleaned text is byte-identical to the previous turn's
//! response, the prompt gets a corrective instruction and the engine is
//! called exactly once more. The second answer is accepted as-is.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::config::schema::{EngineConfig, PromptConfig};
use crate::providers::base::InferenceEngine;

/// Upper bound on engine calls per turn (first try plus one rephrase).
pub const MAX_ATTEMPTS: usize = 2;

/// The accepted response for a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    pub text: String,
    /// Engine calls made; 2 means a rephrase was requested.
    pub attempts: usize,
}

impl TurnOutcome {
    pub fn was_rephrased(&self) -> bool {
        self.attempts > 1
    }
}

/// Drives the engine for a single conversational turn.
pub struct TurnExecutor {
    engine: Arc<dyn InferenceEngine>,
    max_tokens: u32,
    stop_markers: Vec<String>,
    strip_markers: Vec<String>,
    rephrase_instruction: String,
}

impl TurnExecutor {
    pub fn new(
        engine: Arc<dyn InferenceEngine>,
        max_tokens: u32,
        stop_markers: Vec<String>,
        strip_markers: Vec<String>,
        rephrase_instruction: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            max_tokens,
            stop_markers,
            strip_markers,
            rephrase_instruction: rephrase_instruction.into(),
        }
    }

    pub fn from_config(
        engine: Arc<dyn InferenceEngine>,
        engine_cfg: &EngineConfig,
        prompt_cfg: &PromptConfig,
    ) -> Self {
        Self::new(
            engine,
            engine_cfg.max_tokens,
            prompt_cfg.stop_markers.clone(),
            prompt_cfg.strip_markers.clone(),
            prompt_cfg.rephrase_instruction.clone(),
        )
    }

    /// Run the turn. `previous` is the response of the immediately preceding
    /// turn, if there is one. Engine failures propagate unchanged.
    pub async fn run(&self, prompt: &str, previous: Option<&str>) -> Result<TurnOutcome> {
        let mut prompt = prompt.to_string();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let raw = self
                .engine
                .generate(&prompt, self.max_tokens, &self.stop_markers)
                .await?;
            let text = self.clean(&raw);
            debug!(attempt = attempts, raw_len = raw.len(), len = text.len(), "turn attempt");

            let repeated = previous == Some(text.as_str());
            if !repeated || attempts >= MAX_ATTEMPTS {
                return Ok(TurnOutcome { text, attempts });
            }

            warn!("Model repeated its previous response; asking it to rephrase");
            prompt.push('\n');
            prompt.push_str(&self.rephrase_instruction);
        }
    }

    /// Trim and remove every strip marker.
    pub fn clean(&self, raw: &str) -> String {
        let mut text = raw.trim().to_string();
        for marker in &self.strip_markers {
            if !marker.is_empty() {
                text = text.replace(marker.as_str(), "");
            }
        }
        text.trim().to_string()
    }
}
