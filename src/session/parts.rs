//! Test structure: the four parts in order and the phases each one runs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Timed phase within one question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Reading,
    Preparation,
    Answer,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Reading => "Reading",
            Phase::Preparation => "Preparation",
            Phase::Answer => "Answer",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One part of the speaking test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartId {
    /// Part 1.1
    #[serde(rename = "1.1")]
    Interview,
    /// Part 1.2
    #[serde(rename = "1.2")]
    PictureDescription,
    /// Part 2
    #[serde(rename = "2")]
    LongTurn,
    /// Part 3
    #[serde(rename = "3")]
    Discussion,
}

impl PartId {
    /// Every part, in test order
    pub const ALL: [PartId; 4] = [
        PartId::Interview,
        PartId::PictureDescription,
        PartId::LongTurn,
        PartId::Discussion,
    ];

    /// Short key as shown to candidates ("1.1", "1.2", "2", "3")
    pub fn key(&self) -> &'static str {
        match self {
            PartId::Interview => "1.1",
            PartId::PictureDescription => "1.2",
            PartId::LongTurn => "2",
            PartId::Discussion => "3",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PartId::Interview => "Introduction and Interview",
            PartId::PictureDescription => "Picture Description",
            PartId::LongTurn => "Long Turn",
            PartId::Discussion => "Discussion",
        }
    }

    pub fn from_key(key: &str) -> Option<PartId> {
        PartId::ALL.into_iter().find(|part| part.key() == key)
    }

    /// Position in the test, 0-based
    pub fn index(&self) -> usize {
        match self {
            PartId::Interview => 0,
            PartId::PictureDescription => 1,
            PartId::LongTurn => 2,
            PartId::Discussion => 3,
        }
    }

    pub fn next(&self) -> Option<PartId> {
        PartId::ALL.get(self.index() + 1).copied()
    }

    /// Phase run before the answer
    pub fn first_phase(&self) -> Phase {
        match self {
            PartId::Interview | PartId::PictureDescription => Phase::Reading,
            PartId::LongTurn | PartId::Discussion => Phase::Preparation,
        }
    }

    pub fn phases(&self) -> [Phase; 2] {
        [self.first_phase(), Phase::Answer]
    }
}

impl fmt::Display for PartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Part {}", self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts_run_in_order() {
        let mut part = PartId::Interview;
        let mut seen = vec![part.key()];
        while let Some(next) = part.next() {
            seen.push(next.key());
            part = next;
        }
        assert_eq!(seen, vec!["1.1", "1.2", "2", "3"]);
    }

    #[test]
    fn test_phase_sequences() {
        assert_eq!(PartId::Interview.phases(), [Phase::Reading, Phase::Answer]);
        assert_eq!(PartId::PictureDescription.phases(), [Phase::Reading, Phase::Answer]);
        assert_eq!(PartId::LongTurn.phases(), [Phase::Preparation, Phase::Answer]);
        assert_eq!(PartId::Discussion.phases(), [Phase::Preparation, Phase::Answer]);
    }

    #[test]
    fn test_key_round_trip_and_serde() {
        assert_eq!(PartId::from_key("1.2"), Some(PartId::PictureDescription));
        assert_eq!(PartId::from_key("4"), None);
        assert_eq!(serde_json::to_string(&PartId::LongTurn).unwrap(), "\"2\"");
        assert_eq!(PartId::Discussion.to_string(), "Part 3");
    }
}
