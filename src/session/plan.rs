//! Session plan: prompts for every part with their phase durations resolved
//! before anything is acquired.

use super::parts::{PartId, Phase};
use super::prompt::{Prompt, PromptSource};
use crate::config::{check_duration, ConfigError, PlayerConfig};

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedQuestion {
    pub prompt: Prompt,
    /// Reading or preparation time
    pub first_phase_secs: f64,
    pub answer_secs: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlannedPart {
    pub part: PartId,
    pub questions: Vec<PlannedQuestion>,
}

/// All four parts, in test order
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    parts: Vec<PlannedPart>,
}

impl SessionPlan {
    /// Pull prompts for every part and resolve every duration.
    ///
    /// Fails on the first prompt whose durations cannot be resolved, so a
    /// misconfigured test never starts recording.
    pub fn resolve(config: &PlayerConfig, source: &dyn PromptSource) -> Result<Self, ConfigError> {
        let mut parts = Vec::with_capacity(PartId::ALL.len());

        for part in PartId::ALL {
            let wanted = config.timing(part).question_count;
            let mut prompts = source.prompts(part, wanted);
            prompts.truncate(wanted);
            if prompts.len() < wanted {
                tracing::warn!(
                    "Part {}: {} of {} prompts available",
                    part.key(),
                    prompts.len(),
                    wanted
                );
            }

            let questions = prompts
                .into_iter()
                .map(|prompt| {
                    let (first_phase_secs, answer_secs) = resolve_durations(config, part, &prompt)?;
                    Ok(PlannedQuestion {
                        prompt,
                        first_phase_secs,
                        answer_secs,
                    })
                })
                .collect::<Result<Vec<_>, ConfigError>>()?;

            parts.push(PlannedPart { part, questions });
        }

        Ok(Self { parts })
    }

    /// A plan from already-resolved parts; missing parts are left empty
    pub fn from_parts(mut planned: Vec<PlannedPart>) -> Self {
        let parts = PartId::ALL
            .into_iter()
            .map(|part| match planned.iter().position(|p| p.part == part) {
                Some(i) => planned.swap_remove(i),
                None => PlannedPart {
                    part,
                    questions: Vec::new(),
                },
            })
            .collect();
        Self { parts }
    }

    pub fn part(&self, part: PartId) -> &PlannedPart {
        &self.parts[part.index()]
    }

    pub fn parts(&self) -> &[PlannedPart] {
        &self.parts
    }

    pub fn question(&self, part: PartId, index: usize) -> Option<&PlannedQuestion> {
        self.part(part).questions.get(index)
    }

    pub fn total_questions(&self) -> usize {
        self.parts.iter().map(|p| p.questions.len()).sum()
    }
}

/// (first phase, answer) durations for one prompt. Per-prompt overrides win;
/// part 1.2 answers fall back to the picture-task table.
pub fn resolve_durations(
    config: &PlayerConfig,
    part: PartId,
    prompt: &Prompt,
) -> Result<(f64, f64), ConfigError> {
    let first = check_duration(
        part,
        part.first_phase(),
        prompt
            .reading_override_secs
            .or(config.timing(part).first_phase_secs),
    )?;
    let answer = check_duration(
        part,
        Phase::Answer,
        prompt
            .answer_override_secs
            .or_else(|| config.answer_secs(part, prompt.subtype.as_deref())),
    )?;
    Ok((first, answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::prompt::PartMetadata;

    struct FixedPrompts(Vec<Prompt>);

    impl PromptSource for FixedPrompts {
        fn prompts(&self, part: PartId, count: usize) -> Vec<Prompt> {
            self.0.iter().filter(|p| p.part == part).take(count).cloned().collect()
        }

        fn part_metadata(&self, _part: PartId) -> Option<PartMetadata> {
            None
        }
    }

    #[test]
    fn test_interpret_without_override_gets_thirty_seconds() {
        let config = PlayerConfig::default();
        let prompt = Prompt::new(3, PartId::PictureDescription, "How do they feel?").with_subtype("interpret");
        assert_eq!(resolve_durations(&config, PartId::PictureDescription, &prompt), Ok((5.0, 30.0)));

        let untyped = Prompt::new(4, PartId::PictureDescription, "What is this?");
        assert_eq!(resolve_durations(&config, PartId::PictureDescription, &untyped), Ok((5.0, 40.0)));
    }

    #[test]
    fn test_prompt_overrides_win() {
        let config = PlayerConfig::default();
        let prompt = Prompt::new(1, PartId::LongTurn, "Describe a journey").with_overrides(Some(10.0), Some(20.0));
        assert_eq!(resolve_durations(&config, PartId::LongTurn, &prompt), Ok((10.0, 20.0)));
    }

    #[test]
    fn test_resolve_accepts_short_and_empty_parts() {
        let source = FixedPrompts(vec![
            Prompt::new(1, PartId::Interview, "a"),
            Prompt::new(2, PartId::Interview, "b"),
            Prompt::new(1, PartId::Discussion, "c"),
            Prompt::new(2, PartId::Discussion, "d"),
        ]);
        let plan = SessionPlan::resolve(&PlayerConfig::default(), &source).unwrap();

        assert_eq!(plan.part(PartId::Interview).questions.len(), 2);
        assert!(plan.part(PartId::PictureDescription).questions.is_empty());
        assert_eq!(plan.part(PartId::Discussion).questions.len(), 1);
        assert_eq!(plan.total_questions(), 3);
    }

    #[test]
    fn test_bad_override_fails_whole_plan() {
        let source = FixedPrompts(vec![
            Prompt::new(1, PartId::LongTurn, "x").with_overrides(None, Some(f64::NAN)),
        ]);
        let err = SessionPlan::resolve(&PlayerConfig::default(), &source).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { part: "2", phase: Phase::Answer, .. }));
    }

    #[test]
    fn test_oversized_override_fails_whole_plan() {
        let config = PlayerConfig::default();
        let huge = Prompt::new(1, PartId::LongTurn, "x").with_overrides(None, Some(1e30));
        assert!(matches!(
            resolve_durations(&config, PartId::LongTurn, &huge),
            Err(ConfigError::InvalidDuration { value, .. }) if value == 1e30
        ));

        let source = FixedPrompts(vec![huge]);
        assert!(SessionPlan::resolve(&config, &source).is_err());
    }
}
