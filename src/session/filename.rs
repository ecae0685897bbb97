//! Artifact file naming

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who is taking the test. All fields are opaque.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CandidateInfo {
    pub id: String,
    pub name: String,
    pub phone: String,
}

impl CandidateInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: phone.into(),
        }
    }
}

/// How the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionEnd {
    /// Ran through every part
    Complete,
    /// Stopped by the candidate
    Manual,
}

/// `IELTS-Speaking-[COMPLETE-]<id>-<name>-<timestamp>.webm`
pub fn artifact_filename(end: SessionEnd, candidate: &CandidateInfo, at: DateTime<Utc>) -> String {
    let id = if candidate.id.is_empty() {
        "unknown"
    } else {
        candidate.id.as_str()
    };

    let name: String = candidate
        .name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    let name = if name.is_empty() {
        "candidate".to_string()
    } else {
        name
    };

    let timestamp = at.format("%Y-%m-%dT%H-%M-%S");
    let marker = match end {
        SessionEnd::Complete => "COMPLETE-",
        SessionEnd::Manual => "",
    };

    format!("IELTS-Speaking-{}{}-{}-{}.webm", marker, id, name, timestamp)
}
