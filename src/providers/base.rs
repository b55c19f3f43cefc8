//! Base inference engine interface.

use anyhow::Result;
use async_trait::async_trait;

/// A local text-completion engine: prompt in, text out.
///
/// Implementations handle the transport; the console only relies on this
/// call contract. Failures are returned as `anyhow::Error` wrapping an
/// [`EngineError`](crate::errors::EngineError) where the kind is known.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Generate a completion for `prompt`.
    ///
    /// # Arguments
    /// * `prompt` - Full prompt text.
    /// * `max_tokens` - Maximum tokens to generate.
    /// * `stop` - Markers that end generation when produced.
    async fn generate(&self, prompt: &str, max_tokens: u32, stop: &[String]) -> Result<String>;

    /// Short human-readable description for banners and logs.
    fn describe(&self) -> String;
}
