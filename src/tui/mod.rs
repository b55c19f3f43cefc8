pub mod ansi;
pub mod display;
pub mod indicator;

// Re-export commonly used items for convenience (so `tui::BOLD` etc still works)
pub use ansi::*;
pub use display::*;
pub use indicator::{while_running, IndicatorStyle, LivenessIndicator};
