//! The interactive Nyx console.
//!
//! One iteration reads a line, classifies it and hands it to [`Console::handle`],
//! which takes the working session by value and returns it together with
//! whether the loop should continue. The session is persisted after every
//! turn, shell command and status refresh.

mod commands;

pub use commands::{classify, Classified, LineEditor};

use std::io::{self, Write as _};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::agent::prompt::PromptAssembler;
use crate::agent::shell::CommandDispatcher;
use crate::agent::token_budget::PromptBudget;
use crate::agent::turn::{TurnExecutor, TurnOutcome};
use crate::config::schema::{Config, ConsoleConfig};
use crate::providers::base::InferenceEngine;
use crate::session::{Session, SessionStore, Turn};
use crate::telemetry::Telemetry;
use crate::tui::{self, IndicatorStyle};
use crate::utils::helpers::{get_data_path, truncate_string};

/// Whether the loop keeps going after an iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    End,
}

pub struct Console {
    config: ConsoleConfig,
    store: SessionStore,
    assembler: PromptAssembler,
    budget: PromptBudget,
    executor: TurnExecutor,
    dispatcher: CommandDispatcher,
    telemetry: Arc<dyn Telemetry>,
    interrupt: CancellationToken,
    indicator: Option<IndicatorStyle>,
    engine_description: String,
}

impl Console {
    pub fn new(
        config: &Config,
        store: SessionStore,
        engine: Arc<dyn InferenceEngine>,
        telemetry: Arc<dyn Telemetry>,
        interrupt: CancellationToken,
    ) -> Self {
        Self {
            config: config.console.clone(),
            store,
            assembler: PromptAssembler::from_config(&config.prompt),
            budget: PromptBudget::new(config.prompt.budget_tokens),
            engine_description: engine.describe(),
            executor: TurnExecutor::from_config(engine, &config.engine, &config.prompt),
            dispatcher: CommandDispatcher::default(),
            telemetry,
            interrupt,
            indicator: Some(IndicatorStyle::from_config(&config.console)),
        }
    }

    /// Replace or disable (`None`) the liveness indicator.
    pub fn with_indicator(mut self, style: Option<IndicatorStyle>) -> Self {
        self.indicator = style;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Load the session, refresh telemetry and run until exit or interrupt.
    pub async fn run(self) -> Result<()> {
        tui::print_banner(&self.engine_description);

        let mut session = self.start_session().await;
        println!("\n{}{}{}", tui::DIM, tui::usage_hint(&self.config), tui::RESET);

        let history_path = get_data_path().join("input_history.txt");
        let mut editor = LineEditor::open(&history_path)?;

        loop {
            println!();
            let line = tokio::select! {
                biased;
                _ = self.interrupt.cancelled() => None,
                line = editor.readline(tui::PROMPT) => line?,
            };
            let Some(line) = line else {
                if self.interrupt.is_cancelled() {
                    info!("Interrupted at prompt");
                }
                println!("\n{}", tui::INTERRUPTED);
                break;
            };

            let (next, step) = self.handle(session, &line).await?;
            session = next;
            if step == Step::End {
                break;
            }
        }

        editor.save_history();
        info!(turns = session.history.len(), "Session ended");
        Ok(())
    }

    /// Load durable state and take a fresh telemetry snapshot.
    pub async fn start_session(&self) -> Session {
        let outcome = self.store.load();
        if let Some(w) = outcome.warning() {
            println!("{}", tui::warning(&format!("[!] {w}")));
        }
        let mut session = outcome.into_session();
        session.sysinfo = self.telemetry.snapshot().await;
        self.persist(&session);
        info!(
            turns = session.history.len(),
            path = %self.store.path().display(),
            "Session started"
        );
        session
    }

    /// Process one operator line.
    pub async fn handle(&self, mut session: Session, line: &str) -> Result<(Session, Step)> {
        match classify(line, &self.config) {
            Classified::Exit => {
                println!("{}", tui::GOODBYE);
                Ok((session, Step::End))
            }
            Classified::Empty => Ok((session, Step::Continue)),
            Classified::Status => {
                let info = self.telemetry.snapshot().await;
                session.sysinfo = info.clone();
                self.persist(&session);
                println!("{info}");
                Ok((session, Step::Continue))
            }
            Classified::Shell(command) => self.run_command(session, line.trim(), &command).await,
            Classified::Turn(input) => self.converse(session, &input).await,
        }
    }

    async fn run_command(
        &self,
        mut session: Session,
        raw: &str,
        command: &str,
    ) -> Result<(Session, Step)> {
        let result = tokio::select! {
            biased;
            _ = self.interrupt.cancelled() => None,
            output = self.dispatcher.run(command) => Some(output),
        };

        match result {
            None => {
                println!("\n{}", tui::INTERRUPTED);
                Ok((session, Step::End))
            }
            Some(Err(e)) => {
                warn!("Operator command failed to start: {:#}", e);
                println!("{}", tui::warning(&format!("[!] Command failed: {e:#}")));
                Ok((session, Step::Continue))
            }
            Some(Ok(output)) => {
                print!("{}", tui::format_command_result(command, &output));
                io::stdout().flush()?;
                session.push_turn(Turn::new(raw, output));
                self.persist(&session);
                Ok((session, Step::Continue))
            }
        }
    }

    async fn converse(&self, mut session: Session, input: &str) -> Result<(Session, Step)> {
        if self.config.show_thoughts {
            println!("{}", tui::thought_banner());
        }

        let prompt = self
            .assembler
            .assemble(&session.sysinfo, &session.history, input, self.budget);
        debug!(
            input = %truncate_string(input, 80),
            included = prompt.included_turns,
            excluded = prompt.excluded_turns,
            "Generating"
        );

        let result = self.generate(&prompt.text, session.last_response()).await;
        let outcome = match result {
            None => {
                println!("\n{}", tui::INTERRUPTED);
                return Ok((session, Step::End));
            }
            Some(Err(e)) => {
                warn!("Generation failed: {:#}", e);
                println!("{}", tui::warning(&format!("[!] Generation failed: {e:#}")));
                return Ok((session, Step::Continue));
            }
            Some(Ok(outcome)) => outcome,
        };

        if outcome.was_rephrased() {
            println!("\n{}", tui::warning(tui::LOOP_DETECTED));
        }

        let mut stdout = io::stdout();
        print!("{}{}Nyx:{} ", tui::BOLD, tui::MAGENTA, tui::RESET);
        tui::typewriter(
            &mut stdout,
            &outcome.text,
            Duration::from_millis(self.config.typewriter_delay_ms),
        )
        .await?;
        println!();

        session.push_turn(Turn::new(input, outcome.text));
        self.persist(&session);
        Ok((session, Step::Continue))
    }

    /// Run the executor with the indicator on screen. `None` means the
    /// operator interrupted; the indicator is already stopped either way.
    async fn generate(&self, prompt: &str, previous: Option<&str>) -> Option<Result<TurnOutcome>> {
        let work = async {
            tokio::select! {
                biased;
                _ = self.interrupt.cancelled() => None,
                result = self.executor.run(prompt, previous) => Some(result),
            }
        };
        match &self.indicator {
            Some(style) => tui::while_running(io::stdout(), style.clone(), work).await.0,
            None => work.await,
        }
    }

    fn persist(&self, session: &Session) {
        if let Err(e) = self.store.save(session) {
            warn!("{}", e);
            println!("{}", tui::warning(&format!("[!] {e}")));
        }
    }
}
