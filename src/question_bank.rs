//! Built-in question bank
//!
//! Prompts are drawn at random without replacement. The random source is
//! seedable so a run can be replayed.

use crate::session::parts::PartId;
use crate::session::prompt::{PartMetadata, Prompt, PromptSource};
use anyhow::Context;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankPart {
    pub title: String,
    pub total_questions: usize,
    #[serde(default)]
    pub first_phase_secs: Option<f64>,
    #[serde(default)]
    pub answer_secs: Option<f64>,
    pub questions: Vec<Prompt>,
}

pub struct QuestionBank {
    parts: HashMap<PartId, BankPart>,
    rng: Mutex<StdRng>,
}

impl QuestionBank {
    pub fn new(parts: HashMap<PartId, BankPart>) -> Self {
        Self {
            parts,
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Replace the random source with a seeded one
    pub fn with_seed(self, seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            ..self
        }
    }

    /// Load a bank keyed by part ("1.1", "1.2", "2", "3")
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let parts: HashMap<PartId, BankPart> =
            serde_json::from_str(json).context("Failed to parse question bank")?;
        for (part, data) in &parts {
            if let Some(stray) = data.questions.iter().find(|q| q.part != *part) {
                anyhow::bail!(
                    "Question {} is filed under Part {} but belongs to Part {}",
                    stray.id,
                    part.key(),
                    stray.part.key()
                );
            }
        }
        Ok(Self::new(parts))
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read question bank {}", path.display()))?;
        Self::from_json_str(&json)
    }

    pub fn question_count(&self, part: PartId) -> usize {
        self.parts.get(&part).map(|p| p.questions.len()).unwrap_or(0)
    }

    /// The bank that ships with the player
    pub fn builtin() -> Self {
        let mut parts = HashMap::new();

        let interview = [
            "Let's talk about your hometown. Where are you from and what do you like most about your hometown?",
            "Do you work or are you a student? Can you describe what you do or what you study?",
            "What do you like to do in your free time? How do you usually spend your weekends?",
            "Tell me about your family. How many people are in your family and what do they do?",
            "What kind of music do you enjoy listening to? Has your taste in music changed over the years?",
            "Do you prefer to live in a house or an apartment? Why do you prefer that type of accommodation?",
        ];
        parts.insert(
            PartId::Interview,
            BankPart {
                title: "Part 1.1 - Introduction and Interview".to_string(),
                total_questions: 3,
                first_phase_secs: Some(4.0),
                answer_secs: Some(30.0),
                questions: numbered(PartId::Interview, &interview),
            },
        );

        let picture = [
            ("Describe what you can see in this picture. What are the people doing?", "describe"),
            ("What do you think the relationship is between the people in this picture?", "analyze"),
            ("How do you think the people in this picture are feeling? What makes you think that?", "interpret"),
        ];
        parts.insert(
            PartId::PictureDescription,
            BankPart {
                title: "Part 1.2 - Picture Description".to_string(),
                total_questions: 3,
                first_phase_secs: Some(5.0),
                answer_secs: None,
                questions: picture
                    .iter()
                    .zip(1..)
                    .map(|((text, subtype), id)| {
                        // Timing comes from the config by subtype
                        Prompt::new(id, PartId::PictureDescription, *text)
                            .with_media("images/family_park.jpg")
                            .with_subtype(*subtype)
                    })
                    .collect(),
            },
        );

        let cue_cards = [
            "Describe a memorable journey you have taken.\n\nYou should say:\n• Where you went\n• Who you went with\n• What you did during the journey\n• And explain why this journey was memorable for you",
            "Describe a person who has influenced you in your life.\n\nYou should say:\n• Who this person is\n• How you know them\n• What they have done to influence you\n• And explain why their influence has been important to you",
            "Describe a skill you would like to learn.\n\nYou should say:\n• What the skill is\n• Why you want to learn it\n• How you would learn it\n• And explain how this skill would be useful to you",
            "Describe a place you visited that was particularly interesting.\n\nYou should say:\n• Where it was\n• When you visited it\n• What you saw and did there\n• And explain what made it so interesting",
        ];
        parts.insert(
            PartId::LongTurn,
            BankPart {
                title: "Part 2 - Long Turn".to_string(),
                total_questions: 1,
                first_phase_secs: Some(60.0),
                answer_secs: Some(120.0),
                questions: numbered(PartId::LongTurn, &cue_cards)
                    .into_iter()
                    .map(|p| p.with_subtype("cue_card"))
                    .collect(),
            },
        );

        let discussion = [
            "Some people think that technology has made our lives easier, while others believe it has made life more complicated. What is your opinion? Give reasons and examples to support your view.",
            "Many people believe that learning foreign languages is becoming less important because of technology and translation tools. Do you agree or disagree? Explain your position with examples.",
            "Some people prefer to live in big cities, while others choose small towns or rural areas. What are the advantages and disadvantages of each? Which do you think is better and why?",
            "Do you think social media has a positive or negative impact on society? Discuss both sides and give your opinion with specific examples.",
            "Some people believe that money is the most important factor when choosing a job, while others think job satisfaction is more important. What do you think? Support your answer with reasons and examples.",
        ];
        parts.insert(
            PartId::Discussion,
            BankPart {
                title: "Part 3 - Discussion".to_string(),
                total_questions: 1,
                first_phase_secs: Some(60.0),
                answer_secs: Some(120.0),
                questions: numbered(PartId::Discussion, &discussion)
                    .into_iter()
                    .map(|p| p.with_subtype("discussion"))
                    .collect(),
            },
        );

        Self::new(parts)
    }
}

fn numbered(part: PartId, texts: &[&str]) -> Vec<Prompt> {
    texts
        .iter()
        .zip(1..)
        .map(|(text, id)| Prompt::new(id, part, *text))
        .collect()
}

impl PromptSource for QuestionBank {
    fn prompts(&self, part: PartId, count: usize) -> Vec<Prompt> {
        let Some(data) = self.parts.get(&part) else {
            return Vec::new();
        };
        let mut rng = self.rng.lock();
        data.questions
            .choose_multiple(&mut *rng, count.min(data.questions.len()))
            .cloned()
            .collect()
    }

    fn part_metadata(&self, part: PartId) -> Option<PartMetadata> {
        self.parts.get(&part).map(|data| PartMetadata {
            title: data.title.clone(),
            total_questions: data.total_questions,
            first_phase_secs: data.first_phase_secs,
            answer_secs: data.answer_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlayerConfig;
    use crate::session::SessionPlan;
    use std::collections::HashSet;

    #[test]
    fn test_builtin_bank_has_every_part() {
        let bank = QuestionBank::builtin();
        assert_eq!(bank.question_count(PartId::Interview), 6);
        assert_eq!(bank.question_count(PartId::PictureDescription), 3);
        assert_eq!(bank.question_count(PartId::LongTurn), 4);
        assert_eq!(bank.question_count(PartId::Discussion), 5);

        let meta = bank.part_metadata(PartId::LongTurn).unwrap();
        assert_eq!(meta.title, "Part 2 - Long Turn");
        assert_eq!(meta.first_phase_secs, Some(60.0));
    }

    #[test]
    fn test_builtin_picture_timing_follows_config() {
        let mut config = PlayerConfig::default();
        config.picture_description.first_phase_secs = Some(9.0);
        config.picture_answers.describe = Some(60.0);

        let plan = SessionPlan::resolve(&config, &QuestionBank::builtin()).unwrap();
        let timings: Vec<_> = plan
            .part(PartId::PictureDescription)
            .questions
            .iter()
            .map(|q| (q.prompt.subtype.clone().unwrap_or_default(), q.first_phase_secs, q.answer_secs))
            .collect();

        assert_eq!(timings.len(), 3);
        for (subtype, first, answer) in timings {
            assert_eq!(first, 9.0);
            let expected = if subtype == "describe" { 60.0 } else { 30.0 };
            assert_eq!(answer, expected, "answer time for {}", subtype);
        }
    }

    #[test]
    fn test_selection_is_without_replacement() {
        let bank = QuestionBank::builtin().with_seed(7);
        for _ in 0..20 {
            let picked = bank.prompts(PartId::Interview, 3);
            assert_eq!(picked.len(), 3);
            let ids: HashSet<u32> = picked.iter().map(|p| p.id).collect();
            assert_eq!(ids.len(), 3);
        }
    }

    #[test]
    fn test_asking_for_more_than_available() {
        let bank = QuestionBank::builtin();
        assert_eq!(bank.prompts(PartId::PictureDescription, 10).len(), 3);
        assert!(bank.prompts(PartId::Interview, 0).is_empty());
    }

    #[test]
    fn test_same_seed_same_selection() {
        let a = QuestionBank::builtin().with_seed(42);
        let b = QuestionBank::builtin().with_seed(42);
        assert_eq!(a.prompts(PartId::Discussion, 1), b.prompts(PartId::Discussion, 1));
    }

    #[test]
    fn test_load_from_json_with_legacy_field_names() {
        let bank = QuestionBank::from_json_str(
            r#"{
                "1.2": {
                    "title": "Pictures",
                    "totalQuestions": 1,
                    "questions": [
                        { "id": 9, "text": "Look", "part": "1.2", "image": "a.jpg",
                          "type": "analyze", "readingTime": 5, "answerTime": 30 }
                    ]
                }
            }"#,
        )
        .unwrap();

        let prompt = &bank.prompts(PartId::PictureDescription, 1)[0];
        assert_eq!(prompt.media.as_deref(), Some("a.jpg"));
        assert_eq!(prompt.subtype.as_deref(), Some("analyze"));
        assert_eq!(prompt.answer_override_secs, Some(30.0));
        assert!(bank.prompts(PartId::LongTurn, 1).is_empty());
        assert!(bank.part_metadata(PartId::LongTurn).is_none());
    }

    #[test]
    fn test_misfiled_question_is_rejected() {
        let result = QuestionBank::from_json_str(
            r#"{ "2": { "title": "x", "totalQuestions": 1,
                       "questions": [ { "id": 1, "text": "t", "part": "3" } ] } }"#,
        );
        assert!(result.is_err());
    }
}
