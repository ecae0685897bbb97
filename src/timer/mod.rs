//! Countdown timing for test phases
//!
//! One countdown is live at a time; starting another cancels it.

pub mod countdown;
pub mod state;

pub use countdown::{CountdownTimer, TickCallback};
pub use state::{format_clock, TimerState, TimerStatus};
