//! nyx - a local-model operator console.
//!
//! Talks to a llama.cpp server, keeps the conversation on disk and lets the
//! operator drop to the host shell with `!`.

use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use nyx::cli::{self, Overrides};
use nyx::config::loader::{get_config_path, load_config, save_config};
use nyx::config::schema::Config;
use nyx::utils::helpers::get_logs_path;

#[derive(Parser)]
#[command(name = "nyx", about = "nyx - local LLM operator console", version)]
struct Cli {
    /// Config file (default ~/.nyx/config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Session file to load and persist.
    #[arg(long, global = true)]
    session: Option<PathBuf>,
    /// Base URL of a running llama.cpp server; disables the managed server.
    #[arg(long, global = true)]
    api_base: Option<String>,
    /// Prompt budget in estimated tokens.
    #[arg(long, global = true)]
    budget: Option<usize>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
enum Commands {
    /// Start the interactive console (default).
    Chat,
    /// Print one host telemetry snapshot.
    Sysinfo,
    /// Show stored conversation turns.
    History {
        /// Number of most recent turns to show.
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Erase the stored conversation.
    Forget,
}

fn init_tracing(interactive: bool) {
    // Always suppress noisy crates regardless of RUST_LOG.
    let noisy_crate_filters = ",hyper=warn,reqwest=warn,rustyline=warn";
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(user) if !user.is_empty() => {
            tracing_subscriber::EnvFilter::new(format!("{user}{noisy_crate_filters}"))
        }
        _ => tracing_subscriber::EnvFilter::new(format!("warn{noisy_crate_filters}")),
    };

    if interactive {
        // Keep log lines out of the transcript: daily-rotated JSON files
        // named `nyx.log.YYYY-MM-DD`.
        let file_appender = tracing_appender::rolling::daily(get_logs_path(), "nyx.log");
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_writer(file_appender)
            .json()
            .with_ansi(false);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .ok();
    }
}

fn main() -> Result<()> {
    // Restore the cursor if anything panics mid-animation.
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        print!("{}", nyx::tui::SHOW_CURSOR);
        let _ = std::io::Write::flush(&mut std::io::stdout());
        default_hook(info);
    }));

    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(Commands::Chat);

    let interactive = matches!(command, Commands::Chat) && std::io::stdout().is_terminal();
    init_tracing(interactive);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        command = ?command,
        "nyx started"
    );

    // First run: write the defaults so there is a file to edit.
    if cli.config.is_none() && !get_config_path().exists() {
        match save_config(&Config::default(), None) {
            Ok(path) => tracing::info!(path = %path.display(), "Wrote default config"),
            Err(e) => tracing::warn!("{e:#}"),
        }
    }
    let loaded = load_config(cli.config.as_deref());
    if let (Some(_), Some(reason)) = (&cli.config, &loaded.fallback) {
        eprintln!("[!] {}: {reason}. Using defaults.", loaded.path.display());
    }
    let mut config = loaded.config;
    Overrides {
        session: cli.session,
        api_base: cli.api_base,
        budget: cli.budget,
    }
    .apply(&mut config);

    match command {
        Commands::Chat => cli::cmd_chat(config),
        Commands::Sysinfo => cli::cmd_sysinfo(),
        Commands::History { limit } => cli::cmd_history(&config, limit),
        Commands::Forget => cli::cmd_forget(&config),
    }
}
