//! llama.cpp server provider.
//!
//! Talks to the native `POST /completion` endpoint of `llama-server`, which
//! takes a raw prompt (no chat template) and returns the generated text in
//! the `content` field.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::base::InferenceEngine;
use crate::errors::EngineError;

/// An inference engine backed by a llama.cpp HTTP server.
pub struct LlamaServerEngine {
    api_base: String,
    temperature: f64,
    client: Client,
}

impl LlamaServerEngine {
    /// Create a client for the server at `api_base` (e.g. `http://127.0.0.1:8080`).
    pub fn new(api_base: &str, temperature: f64) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            temperature,
            client: Client::new(),
        }
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn request_body(&self, prompt: &str, max_tokens: u32, stop: &[String]) -> Value {
        json!({
            "prompt": prompt,
            "n_predict": max_tokens,
            "stop": stop,
            "temperature": self.temperature,
            "cache_prompt": true,
            "stream": false,
        })
    }
}

/// Pull a readable message out of a llama-server error body.
///
/// The server replies `{"error": {"code": .., "message": ..}}`; anything else
/// is passed through verbatim.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message").or(Some(e)))
                .and_then(|m| m.as_str().map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl InferenceEngine for LlamaServerEngine {
    async fn generate(&self, prompt: &str, max_tokens: u32, stop: &[String]) -> Result<String> {
        let url = format!("{}/completion", self.api_base);
        let body = self.request_body(prompt, max_tokens, stop);

        debug!(
            "generate: url={} prompt_bytes={} max_tokens={}",
            url,
            prompt.len(),
            max_tokens
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("HTTP request to llama-server failed (base={}): {}", self.api_base, e);
                EngineError::HttpError(e.to_string())
            })?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| EngineError::ResponseReadError(e.to_string()))?;

        if !status.is_success() {
            warn!(
                "llama-server returned status {} (base={}): {}",
                status, self.api_base, response_text
            );
            return Err(EngineError::ServerError {
                status: status.as_u16(),
                message: error_message(&response_text),
            }
            .into());
        }

        let data: Value = serde_json::from_str(&response_text)
            .map_err(|e| EngineError::JsonParseError(e.to_string()))?;

        let content = data
            .get("content")
            .and_then(|c| c.as_str())
            .ok_or(EngineError::MissingContent)?;

        debug!(
            tokens_predicted = data.get("tokens_predicted").and_then(|v| v.as_u64()),
            "generate: done"
        );
        Ok(content.to_string())
    }

    fn describe(&self) -> String {
        format!("llama.cpp server at {}", self.api_base)
    }
}
