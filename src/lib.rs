//! IELTS Speaking Player - proctored speaking tests, narrated and recorded.
//!
//! This is the main library crate for the player. It provides the session
//! controller and the ports it drives: a countdown timer, a narration port
//! over a speech engine, and a capture port over the host's media devices.

pub mod capture;
pub mod config;
pub mod download;
pub mod narration;
pub mod question_bank;
pub mod recorder;
pub mod session;
pub mod timer;
pub mod utils;

pub use config::PlayerConfig;
pub use session::{CandidateInfo, SessionError, TestController, TestStatus, UiEvent};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize logging. Safe to call more than once; only the first call
/// installs a subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ielts_speaking_player=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
