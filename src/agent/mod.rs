pub mod prompt;
pub mod shell;
pub mod token_budget;
pub mod turn;
