//! "Nyx Thinking:" waveform shown while the engine is generating.
//!
//! The animation runs on its own tokio task and owns the writer until it is
//! stopped. Stopping (or dropping the handle) cancels the task, which clears
//! the status line before handing the writer back.

use std::collections::VecDeque;
use std::future::Future;
use std::io::Write;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::debug;

use super::ansi::{BOLD_MAGENTA, CLEAR_LINE, HIDE_CURSOR, MAGENTA, RESET, SHOW_CURSOR};
use crate::config::schema::ConsoleConfig;

pub const WAVE_COLUMNS: usize = 30;
pub const FLAT: char = '▁';

/// Glyph heights and how often each is drawn.
const GLYPHS: [(char, u32); 8] = [
    ('▁', 3),
    ('▂', 5),
    ('▃', 7),
    ('▄', 10),
    ('▅', 7),
    ('▆', 5),
    ('▇', 3),
    ('█', 2),
];

const FLAT_PROBABILITY: f64 = 0.05;

/// Scrolling bar graph; new columns enter on the right.
#[derive(Debug, Clone)]
pub struct Waveform {
    columns: VecDeque<char>,
}

impl Default for Waveform {
    fn default() -> Self {
        Self {
            columns: std::iter::repeat(FLAT).take(WAVE_COLUMNS).collect(),
        }
    }
}

impl Waveform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shift left by one column and draw a new one.
    pub fn advance<R: Rng>(&mut self, rng: &mut R) {
        let glyph = if rng.random_bool(FLAT_PROBABILITY) {
            FLAT
        } else {
            GLYPHS
                .choose_weighted(rng, |(_, weight)| *weight)
                .map(|(glyph, _)| *glyph)
                .unwrap_or(FLAT)
        };
        self.columns.pop_front();
        self.columns.push_back(glyph);
    }

    pub fn glyphs(&self) -> String {
        self.columns.iter().collect()
    }

    pub fn render(&self) -> String {
        format!("{MAGENTA}{}{RESET}", self.glyphs())
    }
}

/// How the indicator looks and how fast it moves.
#[derive(Debug, Clone)]
pub struct IndicatorStyle {
    pub label: String,
    pub interval: Duration,
}

impl Default for IndicatorStyle {
    fn default() -> Self {
        Self {
            label: "Nyx Thinking:".to_string(),
            interval: Duration::from_millis(70),
        }
    }
}

impl IndicatorStyle {
    pub fn from_config(config: &ConsoleConfig) -> Self {
        Self {
            interval: Duration::from_millis(config.indicator_interval_ms.max(1)),
            ..Self::default()
        }
    }
}

/// Handle to a running indicator task.
///
/// Dropping the handle cancels the task through its drop guard.
pub struct LivenessIndicator<W: Write + Send + 'static> {
    guard: DropGuard,
    handle: JoinHandle<W>,
}

impl<W: Write + Send + 'static> LivenessIndicator<W> {
    pub fn start(writer: W, style: IndicatorStyle) -> Self {
        Self::start_with_rng(writer, style, StdRng::from_os_rng())
    }

    pub fn start_with_rng<R: Rng + Send + 'static>(
        mut writer: W,
        style: IndicatorStyle,
        mut rng: R,
    ) -> Self {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut wave = Waveform::new();
            let mut ticker = tokio::time::interval(style.interval);
            write!(writer, "{HIDE_CURSOR}").ok();

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        wave.advance(&mut rng);
                        write!(
                            writer,
                            "{CLEAR_LINE}{BOLD_MAGENTA}{}{RESET} {}",
                            style.label,
                            wave.render()
                        )
                        .ok();
                        writer.flush().ok();
                    }
                }
            }

            write!(writer, "{CLEAR_LINE}{SHOW_CURSOR}").ok();
            writer.flush().ok();
            writer
        });

        Self {
            guard: cancel.drop_guard(),
            handle,
        }
    }

    /// Cancel the animation and wait until the line is cleared.
    pub async fn stop(self) -> Result<W, JoinError> {
        let Self { guard, handle } = self;
        drop(guard);
        let result = handle.await;
        if let Err(e) = &result {
            debug!("Liveness indicator task failed: {}", e);
        }
        result
    }
}

/// Run `fut` with the indicator on screen. The indicator is stopped before
/// this returns, and also if the returned future is dropped early.
pub async fn while_running<W, F, T>(writer: W, style: IndicatorStyle, fut: F) -> (T, Option<W>)
where
    W: Write + Send + 'static,
    F: Future<Output = T>,
{
    let indicator = LivenessIndicator::start(writer, style);
    let output = fut.await;
    let writer = indicator.stop().await.ok();
    (output, writer)
}
