//! Display utilities for the console transcript.

use std::io::{self, Write};
use std::time::Duration;

use super::ansi::*;
use crate::config::schema::ConsoleConfig;

pub const BANNER: &str = ">> NYX vCORTEX — ENHANCED SINGLE MODEL ONLINE <<";
pub const GOODBYE: &str = "Nyx: Goodbye. Stay secure.";
pub const INTERRUPTED: &str = "[!] Session interrupted.";
pub const LOOP_DETECTED: &str = "[!] Loop detected. Rephrasing...";
pub const PROMPT: &str = "> You: ";

const THOUGHTS: &str = "[Nyx Internal Thought Process]\n\
- Recalling system status and recent context...\n\
- Interpreting user intent...\n\
- Formulating response based on cybersecurity-focused reasoning.\n\
- Checking for potential command execution paths...";

/// Startup banner followed by the engine description.
pub fn print_banner(engine: &str) {
    println!("\n{BOLD}{MAGENTA}{BANNER}{RESET}");
    println!("  {DIM}engine: {engine}{RESET}");
}

/// One-line reminder of the console keywords.
pub fn usage_hint(config: &ConsoleConfig) -> String {
    let exits: Vec<String> = config
        .exit_keywords
        .iter()
        .map(|k| format!("'{k}'"))
        .collect();
    format!(
        "[Type {} to end the session. Commands: '{}', '{}<command>' to execute commands directly]",
        exits.join(" or "),
        config.status_keyword,
        config.escape_prefix
    )
}

pub fn thought_banner() -> String {
    format!("\n{BLUE}{THOUGHTS}{RESET}")
}

pub fn warning(message: &str) -> String {
    format!("{RED}{message}{RESET}")
}

/// Header plus trimmed output of an operator command.
pub fn format_command_result(command: &str, output: &str) -> String {
    format!(
        "\n{GREEN}[+] Nyx executed:{RESET} `{command}`\n{}\n",
        output.trim()
    )
}

/// Print `text` one character at a time.
pub async fn typewriter<W: Write>(out: &mut W, text: &str, delay: Duration) -> io::Result<()> {
    if delay.is_zero() {
        out.write_all(text.as_bytes())?;
        return out.flush();
    }
    let mut buf = [0u8; 4];
    for ch in text.chars() {
        out.write_all(ch.encode_utf8(&mut buf).as_bytes())?;
        out.flush()?;
        tokio::time::sleep(delay).await;
    }
    Ok(())
}
