//! Token budget for prompt assembly.
//!
//! Uses character-based estimation (1 token ~ 4 bytes) rather than a
//! tokenizer crate. Good enough for budget management.

/// Ceiling on the estimated size of a prompt sent to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptBudget {
    limit: usize,
}

impl PromptBudget {
    /// A budget of `limit` estimated tokens.
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    /// Budget left for the prompt after reserving room for the response.
    ///
    /// * `max_context` - Total context window in tokens.
    /// * `max_response` - Tokens reserved for the response.
    pub fn from_context(max_context: usize, max_response: usize) -> Self {
        Self::new(max_context.saturating_sub(max_response))
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Estimate token count for a string (~4 bytes per token, rounded up).
    ///
    /// Rounding up per fragment means the estimates of separately measured
    /// pieces always sum to at least the estimate of their concatenation.
    pub fn estimate_str_tokens(s: &str) -> usize {
        s.len().div_ceil(4)
    }

    /// Whether adding `cost` to `used` stays within the budget. Landing
    /// exactly on the limit still fits.
    pub fn admits(&self, used: usize, cost: usize) -> bool {
        used.saturating_add(cost) <= self.limit
    }
}
