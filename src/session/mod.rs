//! Test session
//!
//! Sequencing of the speaking test: parts, questions and phases, the
//! between-parts interstitial, and the two ways a test ends.

pub mod announce;
pub mod controller;
pub mod events;
pub mod filename;
pub mod machine;
pub mod parts;
pub mod plan;
pub mod prompt;

pub use controller::{SessionError, TestController, TestStatus};
pub use events::{NoticeLevel, Screen, UiEvent};
pub use filename::{artifact_filename, CandidateInfo, SessionEnd};
pub use machine::{Effect, SessionEvent, SessionMachine, SessionState};
pub use parts::{PartId, Phase};
pub use plan::SessionPlan;
pub use prompt::{PartMetadata, Prompt, PromptSource};
