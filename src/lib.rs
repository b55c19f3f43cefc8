//! nyx library: the local-model operator console behind the `nyx` binary.

pub mod agent;
pub mod cli;
pub mod config;
pub mod errors;
pub mod providers;
pub mod repl;
pub mod server;
pub mod session;
pub mod telemetry;
pub mod tui;
pub mod utils;
