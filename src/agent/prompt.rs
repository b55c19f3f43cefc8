//! Budgeted prompt assembly.
//!
//! Builds a single completion prompt from the instruction preamble, the last
//! telemetry snapshot, as much recent history as the budget allows, and the
//! current operator input:
//!
//! ```text
//! {preamble}
//!
//! System Information:
//! {sysinfo}
//!
//! User: {older input}
//! Nyx: {older response}
//! User: {current input}
//! Nyx:
//! ```
//!
//! The preamble, sysinfo and current input are mandatory. History is admitted
//! newest first and dropped oldest first; stored history is never touched.

use tracing::debug;

use super::token_budget::PromptBudget;
use crate::config::schema::PromptConfig;
use crate::session::Turn;

pub const USER_LABEL: &str = "User";
pub const NYX_LABEL: &str = "Nyx";

/// A prompt ready for the engine plus what the budget walk decided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPrompt {
    pub text: String,
    pub included_turns: usize,
    pub excluded_turns: usize,
    /// Sum of the per-fragment estimates; an upper bound on the estimate of
    /// `text` as a whole.
    pub estimated_tokens: usize,
}

/// Assembles prompts from a fixed preamble.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    preamble: String,
    history_window: Option<usize>,
}

impl PromptAssembler {
    pub fn new(preamble: impl Into<String>, history_window: Option<usize>) -> Self {
        Self {
            preamble: preamble.into(),
            history_window,
        }
    }

    pub fn from_config(config: &PromptConfig) -> Self {
        Self::new(config.preamble.clone(), config.history_window)
    }

    /// Estimated cost of the parts that are always sent.
    pub fn mandatory_cost(&self, sysinfo: &str, user_input: &str) -> usize {
        PromptBudget::estimate_str_tokens(&head(&self.preamble, sysinfo))
            + PromptBudget::estimate_str_tokens(&tail(user_input))
    }

    /// Estimated cost of one history turn as it appears in the prompt.
    pub fn turn_cost(turn: &Turn) -> usize {
        PromptBudget::estimate_str_tokens(&turn_block(turn))
    }

    /// Build the prompt, keeping the most recent turns that fit in `budget`.
    pub fn assemble(
        &self,
        sysinfo: &str,
        history: &[Turn],
        user_input: &str,
        budget: PromptBudget,
    ) -> AssembledPrompt {
        let head = head(&self.preamble, sysinfo);
        let tail = tail(user_input);
        let mut used =
            PromptBudget::estimate_str_tokens(&head) + PromptBudget::estimate_str_tokens(&tail);

        let window = self.history_window.unwrap_or(history.len()).min(history.len());
        let candidates = &history[history.len() - window..];

        let mut kept: Vec<String> = Vec::new();
        for turn in candidates.iter().rev() {
            let block = turn_block(turn);
            let cost = PromptBudget::estimate_str_tokens(&block);
            if !budget.admits(used, cost) {
                break;
            }
            used += cost;
            kept.push(block);
        }
        kept.reverse();

        let included_turns = kept.len();
        let excluded_turns = history.len() - included_turns;

        let mut text = String::with_capacity(
            head.len() + tail.len() + kept.iter().map(String::len).sum::<usize>(),
        );
        text.push_str(&head);
        for block in &kept {
            text.push_str(block);
        }
        text.push_str(&tail);

        debug!(
            included_turns,
            excluded_turns,
            estimated_tokens = used,
            budget = budget.limit(),
            "Assembled prompt"
        );

        AssembledPrompt {
            text,
            included_turns,
            excluded_turns,
            estimated_tokens: used,
        }
    }
}

/// Free-function form of [`PromptAssembler::assemble`] without a history window.
pub fn assemble(
    preamble: &str,
    sysinfo: &str,
    history: &[Turn],
    user_input: &str,
    budget: PromptBudget,
) -> AssembledPrompt {
    PromptAssembler::new(preamble, None).assemble(sysinfo, history, user_input, budget)
}

fn head(preamble: &str, sysinfo: &str) -> String {
    format!("{preamble}\n\nSystem Information:\n{sysinfo}\n\n")
}

fn turn_block(turn: &Turn) -> String {
    format!("{USER_LABEL}: {}\n{NYX_LABEL}: {}\n", turn.user, turn.nyx)
}

fn tail(user_input: &str) -> String {
    format!("{USER_LABEL}: {user_input}\n{NYX_LABEL}:")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREAMBLE: &str = "You are Nyx.";
    const SYSINFO: &str = "CPU Usage: 5.0%\nOS: Linux";

    fn history(n: usize) -> Vec<Turn> {
        (0..n)
            .map(|i| Turn::new(format!("question {i}"), format!("answer {i}")))
            .collect()
    }

    #[test]
    fn test_large_budget_keeps_full_history_in_order() {
        let h = history(5);
        let p = assemble(PREAMBLE, SYSINFO, &h, "next?", PromptBudget::new(100_000));
        assert_eq!(p.included_turns, 5);
        assert_eq!(p.excluded_turns, 0);

        let positions: Vec<usize> = (0..5)
            .map(|i| p.text.find(&format!("User: question {i}\nNyx: answer {i}\n")).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_layout() {
        let h = vec![Turn::new("hi", "hello")];
        let p = assemble(PREAMBLE, SYSINFO, &h, "how are you?", PromptBudget::new(10_000));
        assert_eq!(
            p.text,
            "You are Nyx.\n\nSystem Information:\nCPU Usage: 5.0%\nOS: Linux\n\n\
             User: hi\nNyx: hello\n\
             User: how are you?\nNyx:"
        );
    }

    #[test]
    fn test_zero_budget_keeps_mandatory_parts() {
        let h = history(4);
        let p = assemble(PREAMBLE, SYSINFO, &h, "current input", PromptBudget::new(0));
        assert_eq!(p.included_turns, 0);
        assert_eq!(p.excluded_turns, 4);
        assert!(p.text.starts_with(PREAMBLE));
        assert!(p.text.contains(SYSINFO));
        assert!(p.text.ends_with("User: current input\nNyx:"));
        assert!(!p.text.contains("question"));
    }

    #[test]
    fn test_only_two_most_recent_fit() {
        let assembler = PromptAssembler::new(PREAMBLE, None);
        let h = history(10);
        let input = "what next?";
        let limit = assembler.mandatory_cost(SYSINFO, input)
            + PromptAssembler::turn_cost(&h[9])
            + PromptAssembler::turn_cost(&h[8]);
        // No room left for the third most recent turn.
        assert!(PromptAssembler::turn_cost(&h[7]) > 0);

        let p = assembler.assemble(SYSINFO, &h, input, PromptBudget::new(limit));
        assert_eq!(p.included_turns, 2);
        assert_eq!(p.excluded_turns, 8);
        assert!(!p.text.contains("question 7"));
        let i8 = p.text.find("question 8").unwrap();
        let i9 = p.text.find("question 9").unwrap();
        let cur = p.text.find("User: what next?").unwrap();
        assert!(p.text.find(PREAMBLE).unwrap() < i8);
        assert!(i8 < i9 && i9 < cur);
    }

    #[test]
    fn test_exact_fit_is_admitted() {
        let assembler = PromptAssembler::new(PREAMBLE, None);
        let h = history(3);
        let exact = assembler.mandatory_cost(SYSINFO, "x") + PromptAssembler::turn_cost(&h[2]);
        let p = assembler.assemble(SYSINFO, &h, "x", PromptBudget::new(exact));
        assert_eq!(p.included_turns, 1);

        let p = assembler.assemble(SYSINFO, &h, "x", PromptBudget::new(exact - 1));
        assert_eq!(p.included_turns, 0);
    }

    #[test]
    fn test_size_never_exceeds_budget_plus_mandatory() {
        let assembler = PromptAssembler::new(PREAMBLE, None);
        let h: Vec<Turn> = (0..25)
            .map(|i| Turn::new("q".repeat(i * 7 % 40 + 1), "a".repeat(i * 13 % 90 + 1)))
            .collect();
        let mandatory = assembler.mandatory_cost(SYSINFO, "input");
        for limit in [0, 10, 50, 100, 200, 400, 800, 5_000] {
            let p = assembler.assemble(SYSINFO, &h, "input", PromptBudget::new(limit));
            let actual = PromptBudget::estimate_str_tokens(&p.text);
            assert!(actual <= p.estimated_tokens);
            assert!(
                p.estimated_tokens <= limit.max(mandatory),
                "limit {limit}: estimated {} > max(limit, mandatory {mandatory})",
                p.estimated_tokens
            );
            assert!(actual <= limit + mandatory);
        }
    }

    #[test]
    fn test_stops_at_first_turn_that_does_not_fit() {
        // A huge middle turn blocks everything older, even small ones.
        let assembler = PromptAssembler::new(PREAMBLE, None);
        let h = vec![
            Turn::new("old", "small"),
            Turn::new("big", "x".repeat(4_000)),
            Turn::new("new", "small"),
        ];
        let limit = assembler.mandatory_cost(SYSINFO, "q") + 200;
        let p = assembler.assemble(SYSINFO, &h, "q", PromptBudget::new(limit));
        assert_eq!(p.included_turns, 1);
        assert!(p.text.contains("User: new"));
        assert!(!p.text.contains("User: old"));
    }

    #[test]
    fn test_history_window_limits_candidates() {
        let assembler = PromptAssembler::new(PREAMBLE, Some(6));
        let h = history(10);
        let p = assembler.assemble(SYSINFO, &h, "q", PromptBudget::new(100_000));
        assert_eq!(p.included_turns, 6);
        assert!(!p.text.contains("question 3\n"));
        assert!(p.text.contains("question 4\n"));
    }

    #[test]
    fn test_assembly_leaves_history_untouched() {
        let h = history(3);
        let before = h.clone();
        let _ = assemble(PREAMBLE, SYSINFO, &h, "q", PromptBudget::new(0));
        assert_eq!(h, before);
    }
}
