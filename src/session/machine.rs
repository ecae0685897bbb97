//! Session state machine
//!
//! A pure transition function: [`SessionMachine::handle`] takes an event and
//! returns the effects to perform, in order. It never sleeps, speaks or
//! records; the controller does that and reports back with events.
//!
//! Every effect that completes later (narration, timer, delay, finalize) is
//! issued with a fresh [`Ticket`]. Only the most recent ticket is honored, so
//! a timer that fires after a stop, or narration that ends after the test
//! completed, is rejected as stale.

use super::announce;
use super::filename::SessionEnd;
use super::parts::{PartId, Phase};
use super::plan::SessionPlan;
use crate::narration::Announcement;
use serde::Serialize;
use thiserror::Error;

pub type Ticket = u64;

/// Where the current question is within its phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum QuestionStep {
    /// Prompt being read out
    Narrating,
    /// Reading or preparation timer running
    FirstPhase,
    /// Answer timer running
    Answering,
    /// Pause before the next question
    Settling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum TransitionStep {
    Narrating,
    Holding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FinishStep {
    /// Pulling and delivering the artifact
    Finalizing,
    /// Saying goodbye
    Narrating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum StopStep {
    Finalizing,
    /// Leaving the download status up before completing
    Lingering,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Active {
        part: PartId,
        question: usize,
        /// `None` while a part 2 or 3 prompt is still being read out
        phase: Option<Phase>,
        step: QuestionStep,
    },
    Transitioning {
        from: PartId,
        to: PartId,
        step: TransitionStep,
    },
    Finishing {
        step: FinishStep,
    },
    StoppingManually {
        step: StopStep,
    },
    Completed {
        end: SessionEnd,
    },
}

impl SessionState {
    /// Short name for status surfaces and logs
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Active { .. } => "active",
            SessionState::Transitioning { .. } => "transitioning",
            SessionState::Finishing { .. } => "finishing",
            SessionState::StoppingManually { .. } => "stoppingManually",
            SessionState::Completed { .. } => "completed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Begin,
    NarrationFinished { ticket: Ticket },
    TimerFinished { ticket: Ticket },
    DelayElapsed { ticket: Ticket },
    ArtifactHandled { ticket: Ticket },
    StopRequested,
}

impl SessionEvent {
    fn ticket(&self) -> Option<Ticket> {
        match self {
            SessionEvent::NarrationFinished { ticket }
            | SessionEvent::TimerFinished { ticket }
            | SessionEvent::DelayElapsed { ticket }
            | SessionEvent::ArtifactHandled { ticket } => Some(*ticket),
            SessionEvent::Begin | SessionEvent::StopRequested => None,
        }
    }
}

/// Which configured delay to wait out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayKind {
    Settle,
    TransitionHold,
    ManualStop,
    CompletionGrace,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    EnterPart {
        part: PartId,
        total_questions: usize,
    },
    ShowQuestion {
        part: PartId,
        /// 1-based
        number: usize,
        total: usize,
        text: String,
    },
    /// `None` hides any picture from the previous question
    ShowMedia {
        media: Option<String>,
    },
    SetPhase(Phase),
    Announce {
        ticket: Ticket,
        announcement: Announcement,
    },
    StartTimer {
        ticket: Ticket,
        phase: Phase,
        seconds: f64,
    },
    StopTimer,
    CancelNarration,
    Schedule {
        ticket: Ticket,
        delay: DelayKind,
    },
    ShowTransition {
        from: PartId,
        to: PartId,
    },
    HideTransition,
    /// Extract the artifact, deliver it, release the buffers
    Finalize {
        ticket: Ticket,
        end: SessionEnd,
    },
    ShowCompletion,
    Cleanup,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineError {
    #[error("Session already started")]
    AlreadyStarted,

    #[error("No active session to stop")]
    NotActive,

    #[error("Stale event {0:?}")]
    Stale(SessionEvent),

    #[error("Event {event:?} not expected in state {state}")]
    Unexpected {
        event: SessionEvent,
        state: &'static str,
    },
}

pub struct SessionMachine {
    plan: SessionPlan,
    state: SessionState,
    pending: Option<Ticket>,
    next_ticket: Ticket,
    cleaned_up: bool,
}

impl SessionMachine {
    pub fn new(plan: SessionPlan) -> Self {
        Self {
            plan,
            state: SessionState::Idle,
            pending: None,
            next_ticket: 1,
            cleaned_up: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn plan(&self) -> &SessionPlan {
        &self.plan
    }

    /// Between a successful start and the end of the test
    pub fn is_active(&self) -> bool {
        !matches!(self.state, SessionState::Idle | SessionState::Completed { .. })
    }

    /// Completed and resources released
    pub fn is_finished(&self) -> bool {
        self.cleaned_up
    }

    pub fn handle(&mut self, event: SessionEvent) -> Result<Vec<Effect>, MachineError> {
        if let Some(ticket) = event.ticket() {
            if self.pending != Some(ticket) {
                return Err(MachineError::Stale(event));
            }
        }

        let effects = match (self.state, event) {
            (SessionState::Idle, SessionEvent::Begin) => {
                tracing::debug!("Session beginning");
                let mut effects = Vec::new();
                self.enter_part(PartId::Interview, &mut effects);
                effects
            }
            (_, SessionEvent::Begin) => return Err(MachineError::AlreadyStarted),

            (SessionState::Active { .. } | SessionState::Transitioning { .. }, SessionEvent::StopRequested) => {
                self.stop_manually()
            }
            (_, SessionEvent::StopRequested) => return Err(MachineError::NotActive),

            (
                SessionState::Active {
                    part,
                    question,
                    phase: current,
                    step: QuestionStep::Narrating,
                },
                SessionEvent::NarrationFinished { .. },
            ) => {
                let phase = part.first_phase();
                let seconds = self
                    .plan
                    .question(part, question)
                    .map(|q| q.first_phase_secs)
                    .unwrap_or_default();
                self.state = SessionState::Active {
                    part,
                    question,
                    phase: Some(phase),
                    step: QuestionStep::FirstPhase,
                };

                let mut effects = Vec::with_capacity(2);
                if current.is_none() {
                    effects.push(Effect::SetPhase(phase));
                }
                effects.push(Effect::StartTimer {
                    ticket: self.issue(),
                    phase,
                    seconds,
                });
                effects
            }

            (
                SessionState::Active {
                    part,
                    question,
                    step: QuestionStep::FirstPhase,
                    ..
                },
                SessionEvent::TimerFinished { .. },
            ) => {
                let seconds = self
                    .plan
                    .question(part, question)
                    .map(|q| q.answer_secs)
                    .unwrap_or_default();
                self.state = SessionState::Active {
                    part,
                    question,
                    phase: Some(Phase::Answer),
                    step: QuestionStep::Answering,
                };
                vec![
                    Effect::SetPhase(Phase::Answer),
                    Effect::StartTimer {
                        ticket: self.issue(),
                        phase: Phase::Answer,
                        seconds,
                    },
                ]
            }

            (
                SessionState::Active {
                    part,
                    question,
                    step: QuestionStep::Answering,
                    ..
                },
                SessionEvent::TimerFinished { .. },
            ) => self.complete_question(part, question),

            (
                SessionState::Active {
                    part,
                    question,
                    step: QuestionStep::Settling,
                    ..
                },
                SessionEvent::DelayElapsed { .. },
            ) => {
                let mut effects = Vec::new();
                self.start_question(part, question, &mut effects);
                effects
            }

            (
                SessionState::Transitioning {
                    from,
                    to,
                    step: TransitionStep::Narrating,
                },
                SessionEvent::NarrationFinished { .. },
            ) => {
                self.state = SessionState::Transitioning {
                    from,
                    to,
                    step: TransitionStep::Holding,
                };
                vec![
                    Effect::ShowTransition { from, to },
                    Effect::Schedule {
                        ticket: self.issue(),
                        delay: DelayKind::TransitionHold,
                    },
                ]
            }

            (
                SessionState::Transitioning {
                    to,
                    step: TransitionStep::Holding,
                    ..
                },
                SessionEvent::DelayElapsed { .. },
            ) => {
                let mut effects = vec![Effect::HideTransition];
                self.enter_part(to, &mut effects);
                effects
            }

            (
                SessionState::Finishing {
                    step: FinishStep::Finalizing,
                },
                SessionEvent::ArtifactHandled { .. },
            ) => {
                self.state = SessionState::Finishing {
                    step: FinishStep::Narrating,
                };
                vec![Effect::Announce {
                    ticket: self.issue(),
                    announcement: announce::completion(PartId::Discussion),
                }]
            }

            (
                SessionState::Finishing {
                    step: FinishStep::Narrating,
                },
                SessionEvent::NarrationFinished { .. },
            ) => {
                tracing::info!("Test completed");
                self.state = SessionState::Completed {
                    end: SessionEnd::Complete,
                };
                vec![
                    Effect::ShowCompletion,
                    Effect::Schedule {
                        ticket: self.issue(),
                        delay: DelayKind::CompletionGrace,
                    },
                ]
            }

            (
                SessionState::StoppingManually {
                    step: StopStep::Finalizing,
                },
                SessionEvent::ArtifactHandled { .. },
            ) => {
                self.state = SessionState::StoppingManually {
                    step: StopStep::Lingering,
                };
                vec![Effect::Schedule {
                    ticket: self.issue(),
                    delay: DelayKind::ManualStop,
                }]
            }

            (
                SessionState::StoppingManually {
                    step: StopStep::Lingering,
                },
                SessionEvent::DelayElapsed { .. },
            ) => {
                self.state = SessionState::Completed {
                    end: SessionEnd::Manual,
                };
                self.pending = None;
                self.cleaned_up = true;
                vec![Effect::ShowCompletion, Effect::Cleanup]
            }

            (SessionState::Completed { .. }, SessionEvent::DelayElapsed { .. }) => {
                self.pending = None;
                self.cleaned_up = true;
                vec![Effect::Cleanup]
            }

            (state, event) => {
                return Err(MachineError::Unexpected {
                    event,
                    state: state.name(),
                })
            }
        };

        Ok(effects)
    }

    /// Drop back to idle, forgetting any pending ticket
    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.pending = None;
    }

    fn issue(&mut self) -> Ticket {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.pending = Some(ticket);
        ticket
    }

    fn enter_part(&mut self, part: PartId, effects: &mut Vec<Effect>) {
        let total_questions = self.plan.part(part).questions.len();
        tracing::info!("Starting Part {} ({} questions)", part.key(), total_questions);
        effects.push(Effect::EnterPart {
            part,
            total_questions,
        });

        if total_questions == 0 {
            effects.extend(self.complete_part(part));
        } else {
            self.start_question(part, 0, effects);
        }
    }

    fn start_question(&mut self, part: PartId, question: usize, effects: &mut Vec<Effect>) {
        let planned = &self.plan.part(part).questions;
        let total = planned.len();
        let Some(current) = planned.get(question) else {
            effects.extend(self.complete_part(part));
            return;
        };

        tracing::debug!("Question {} of {} in Part {}", question + 1, total, part.key());
        // Reading starts with the prompt; preparation only once it has been read
        let phase = Some(part.first_phase()).filter(|p| *p == Phase::Reading);
        effects.push(Effect::ShowQuestion {
            part,
            number: question + 1,
            total,
            text: current.prompt.text.clone(),
        });
        effects.push(Effect::ShowMedia {
            media: current.prompt.media.clone(),
        });
        if let Some(phase) = phase {
            effects.push(Effect::SetPhase(phase));
        }
        let announcement = announce::question(part, &current.prompt.text);

        self.state = SessionState::Active {
            part,
            question,
            phase,
            step: QuestionStep::Narrating,
        };
        effects.push(Effect::Announce {
            ticket: self.issue(),
            announcement,
        });
    }

    fn complete_question(&mut self, part: PartId, question: usize) -> Vec<Effect> {
        tracing::debug!("Question {} of Part {} completed", question + 1, part.key());
        let next = question + 1;

        if next < self.plan.part(part).questions.len() {
            self.state = SessionState::Active {
                part,
                question: next,
                phase: Some(Phase::Answer),
                step: QuestionStep::Settling,
            };
            vec![Effect::Schedule {
                ticket: self.issue(),
                delay: DelayKind::Settle,
            }]
        } else {
            self.complete_part(part)
        }
    }

    fn complete_part(&mut self, part: PartId) -> Vec<Effect> {
        tracing::info!("Part {} completed", part.key());

        match part.next() {
            Some(next) => {
                self.state = SessionState::Transitioning {
                    from: part,
                    to: next,
                    step: TransitionStep::Narrating,
                };
                vec![Effect::Announce {
                    ticket: self.issue(),
                    announcement: announce::transition(part, next),
                }]
            }
            None => {
                self.state = SessionState::Finishing {
                    step: FinishStep::Finalizing,
                };
                vec![Effect::Finalize {
                    ticket: self.issue(),
                    end: SessionEnd::Complete,
                }]
            }
        }
    }

    fn stop_manually(&mut self) -> Vec<Effect> {
        tracing::info!("Test stopped manually");
        let mut effects = vec![Effect::StopTimer, Effect::CancelNarration];
        if matches!(
            self.state,
            SessionState::Transitioning {
                step: TransitionStep::Holding,
                ..
            }
        ) {
            effects.push(Effect::HideTransition);
        }

        self.state = SessionState::StoppingManually {
            step: StopStep::Finalizing,
        };
        effects.push(Effect::Finalize {
            ticket: self.issue(),
            end: SessionEnd::Manual,
        });
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narration::AnnouncementKind;
    use crate::session::plan::{PlannedPart, PlannedQuestion};
    use crate::session::prompt::Prompt;

    fn question(part: PartId, id: u32) -> PlannedQuestion {
        PlannedQuestion {
            prompt: Prompt::new(id, part, format!("prompt {}", id)),
            first_phase_secs: 1.0,
            answer_secs: 2.0,
        }
    }

    fn plan(counts: [usize; 4]) -> SessionPlan {
        SessionPlan::from_parts(
            PartId::ALL
                .into_iter()
                .zip(counts)
                .map(|(part, n)| PlannedPart {
                    part,
                    questions: (1..=n as u32).map(|id| question(part, id)).collect(),
                })
                .collect(),
        )
    }

    /// The ticket of the last ticketed effect
    fn ticket_of(effects: &[Effect]) -> Ticket {
        effects
            .iter()
            .rev()
            .find_map(|e| match e {
                Effect::Announce { ticket, .. }
                | Effect::StartTimer { ticket, .. }
                | Effect::Schedule { ticket, .. }
                | Effect::Finalize { ticket, .. } => Some(*ticket),
                _ => None,
            })
            .expect("no ticketed effect")
    }

    /// Feed the completion event matching whatever was last issued
    fn complete(machine: &mut SessionMachine, effects: &[Effect]) -> Vec<Effect> {
        let ticket = ticket_of(effects);
        let event = match effects.iter().rev().find(|e| {
            matches!(
                e,
                Effect::Announce { .. } | Effect::StartTimer { .. } | Effect::Schedule { .. } | Effect::Finalize { .. }
            )
        }) {
            Some(Effect::Announce { .. }) => SessionEvent::NarrationFinished { ticket },
            Some(Effect::StartTimer { .. }) => SessionEvent::TimerFinished { ticket },
            Some(Effect::Schedule { .. }) => SessionEvent::DelayElapsed { ticket },
            _ => SessionEvent::ArtifactHandled { ticket },
        };
        machine.handle(event).unwrap()
    }

    /// Run to the end, collecting every effect
    fn run_to_end(machine: &mut SessionMachine) -> Vec<Effect> {
        let mut all = Vec::new();
        let mut effects = machine.handle(SessionEvent::Begin).unwrap();
        loop {
            all.extend(effects.clone());
            if machine.is_finished() {
                return all;
            }
            effects = complete(machine, &effects);
        }
    }

    #[test]
    fn test_first_question_narrates_before_any_timer() {
        let mut machine = SessionMachine::new(plan([3, 3, 1, 1]));
        let effects = machine.handle(SessionEvent::Begin).unwrap();

        assert_eq!(
            effects[0],
            Effect::EnterPart {
                part: PartId::Interview,
                total_questions: 3
            }
        );
        assert!(matches!(effects[1], Effect::ShowQuestion { number: 1, total: 3, .. }));
        assert_eq!(effects[3], Effect::SetPhase(Phase::Reading));
        match &effects[4] {
            Effect::Announce { announcement, .. } => {
                assert_eq!(announcement.kind, AnnouncementKind::Question);
                assert_eq!(announcement.text, "Question: prompt 1");
            }
            other => panic!("expected announce, got {:?}", other),
        }
        assert!(!effects.iter().any(|e| matches!(e, Effect::StartTimer { .. })));
    }

    #[test]
    fn test_answer_timer_only_after_first_phase_completes() {
        let mut machine = SessionMachine::new(plan([1, 0, 0, 0]));
        let effects = machine.handle(SessionEvent::Begin).unwrap();
        let effects = complete(&mut machine, &effects);
        assert!(matches!(
            effects[..],
            [Effect::StartTimer {
                phase: Phase::Reading,
                seconds,
                ..
            }] if seconds == 1.0
        ));

        let effects = complete(&mut machine, &effects);
        assert_eq!(effects[0], Effect::SetPhase(Phase::Answer));
        assert!(matches!(
            effects[1],
            Effect::StartTimer {
                phase: Phase::Answer,
                ..
            }
        ));
    }

    #[test]
    fn test_three_completions_trigger_one_part_complete() {
        let mut machine = SessionMachine::new(plan([3, 1, 0, 0]));
        let all = run_to_end(&mut machine);

        let transitions: Vec<_> = all
            .iter()
            .filter(|e| matches!(e, Effect::ShowTransition { .. }))
            .collect();
        assert_eq!(
            transitions[0],
            &Effect::ShowTransition {
                from: PartId::Interview,
                to: PartId::PictureDescription
            }
        );
        // 1.1 -> 1.2, 1.2 -> 2, 2 -> 3
        assert_eq!(transitions.len(), 3);

        let settles = all
            .iter()
            .filter(|e| matches!(e, Effect::Schedule { delay: DelayKind::Settle, .. }))
            .count();
        assert_eq!(settles, 2);
    }

    #[test]
    fn test_natural_completion_finalizes_once() {
        let mut machine = SessionMachine::new(plan([3, 3, 1, 1]));
        let all = run_to_end(&mut machine);

        let finals: Vec<_> = all.iter().filter(|e| matches!(e, Effect::Finalize { .. })).collect();
        assert_eq!(finals.len(), 1);
        assert!(matches!(
            finals[0],
            Effect::Finalize {
                end: SessionEnd::Complete,
                ..
            }
        ));

        let goodbye = all.iter().find_map(|e| match e {
            Effect::Announce { announcement, .. } if announcement.kind == AnnouncementKind::Completion => {
                Some(announcement.text.clone())
            }
            _ => None,
        });
        assert_eq!(goodbye.as_deref(), Some("Part 3 finished. Test completed. Thank you."));
        assert_eq!(all.last(), Some(&Effect::Cleanup));
        assert_eq!(
            machine.state(),
            SessionState::Completed {
                end: SessionEnd::Complete
            }
        );
    }

    #[test]
    fn test_empty_parts_complete_immediately() {
        let mut machine = SessionMachine::new(plan([0, 0, 0, 0]));
        let effects = machine.handle(SessionEvent::Begin).unwrap();
        assert!(matches!(effects.last(), Some(Effect::Announce { .. })));
        assert!(matches!(
            machine.state(),
            SessionState::Transitioning {
                from: PartId::Interview,
                to: PartId::PictureDescription,
                ..
            }
        ));

        let all = run_to_end(&mut SessionMachine::new(plan([0, 0, 0, 0])));
        assert_eq!(all.iter().filter(|e| matches!(e, Effect::Finalize { .. })).count(), 1);
    }

    #[test]
    fn test_begin_twice_is_rejected() {
        let mut machine = SessionMachine::new(plan([1, 0, 0, 0]));
        machine.handle(SessionEvent::Begin).unwrap();
        let before = machine.state();
        assert_eq!(machine.handle(SessionEvent::Begin), Err(MachineError::AlreadyStarted));
        assert_eq!(machine.state(), before);
    }

    #[test]
    fn test_manual_stop_cancels_and_finalizes() {
        let mut machine = SessionMachine::new(plan([3, 3, 1, 1]));
        let effects = machine.handle(SessionEvent::Begin).unwrap();
        let narration = ticket_of(&effects);
        let effects = complete(&mut machine, &effects);
        let timer = ticket_of(&effects);

        let stop = machine.handle(SessionEvent::StopRequested).unwrap();
        assert_eq!(stop[0], Effect::StopTimer);
        assert_eq!(stop[1], Effect::CancelNarration);
        assert!(matches!(
            stop[2],
            Effect::Finalize {
                end: SessionEnd::Manual,
                ..
            }
        ));

        // Late callbacks from before the stop are stale
        assert!(matches!(
            machine.handle(SessionEvent::TimerFinished { ticket: timer }),
            Err(MachineError::Stale(_))
        ));
        assert!(matches!(
            machine.handle(SessionEvent::NarrationFinished { ticket: narration }),
            Err(MachineError::Stale(_))
        ));

        let linger = complete(&mut machine, &stop);
        assert!(matches!(
            linger[..],
            [Effect::Schedule {
                delay: DelayKind::ManualStop,
                ..
            }]
        ));
        let done = complete(&mut machine, &linger);
        assert_eq!(done, vec![Effect::ShowCompletion, Effect::Cleanup]);
        assert!(machine.is_finished());

        assert_eq!(machine.handle(SessionEvent::StopRequested), Err(MachineError::NotActive));
    }

    #[test]
    fn test_stop_during_transition_hides_interstitial() {
        let mut machine = SessionMachine::new(plan([0, 1, 0, 0]));
        let effects = machine.handle(SessionEvent::Begin).unwrap();
        complete(&mut machine, &effects);
        let stop = machine.handle(SessionEvent::StopRequested).unwrap();
        assert!(stop.contains(&Effect::HideTransition));

        // still announcing the transition: nothing is on screen yet
        let mut machine = SessionMachine::new(plan([0, 1, 0, 0]));
        machine.handle(SessionEvent::Begin).unwrap();
        let stop = machine.handle(SessionEvent::StopRequested).unwrap();
        assert!(!stop.contains(&Effect::HideTransition));
    }

    #[test]
    fn test_transition_is_announced_before_it_is_shown() {
        let mut machine = SessionMachine::new(plan([1, 1, 0, 0]));
        let mut effects = machine.handle(SessionEvent::Begin).unwrap();
        while !matches!(machine.state(), SessionState::Transitioning { .. }) {
            effects = complete(&mut machine, &effects);
        }
        assert!(matches!(
            effects[..],
            [Effect::Announce { ref announcement, .. }] if announcement.kind == AnnouncementKind::Transition
        ));

        let held = complete(&mut machine, &effects);
        assert_eq!(
            held[0],
            Effect::ShowTransition {
                from: PartId::Interview,
                to: PartId::PictureDescription
            }
        );
        assert!(matches!(
            held[1],
            Effect::Schedule {
                delay: DelayKind::TransitionHold,
                ..
            }
        ));
    }

    #[test]
    fn test_cue_card_is_read_before_preparation_starts() {
        let mut machine = SessionMachine::new(plan([0, 0, 1, 0]));
        let mut effects = machine.handle(SessionEvent::Begin).unwrap();
        while !effects.iter().any(|e| matches!(e, Effect::EnterPart { part: PartId::LongTurn, .. })) {
            effects = complete(&mut machine, &effects);
        }

        assert!(!effects.iter().any(|e| matches!(e, Effect::SetPhase(_))));
        assert!(matches!(effects.last(), Some(Effect::Announce { .. })));
        assert!(matches!(
            machine.state(),
            SessionState::Active {
                part: PartId::LongTurn,
                phase: None,
                step: QuestionStep::Narrating,
                ..
            }
        ));

        let effects = complete(&mut machine, &effects);
        assert_eq!(effects[0], Effect::SetPhase(Phase::Preparation));
        assert!(matches!(
            effects[1],
            Effect::StartTimer {
                phase: Phase::Preparation,
                ..
            }
        ));
        assert!(matches!(
            machine.state(),
            SessionState::Active {
                phase: Some(Phase::Preparation),
                ..
            }
        ));
    }

    #[test]
    fn test_stop_rejected_outside_active_states() {
        let mut machine = SessionMachine::new(plan([0, 0, 0, 0]));
        assert_eq!(machine.handle(SessionEvent::StopRequested), Err(MachineError::NotActive));

        // Run until the artifact is being finalized
        let mut effects = machine.handle(SessionEvent::Begin).unwrap();
        while !matches!(machine.state(), SessionState::Finishing { .. }) {
            effects = complete(&mut machine, &effects);
        }
        assert_eq!(machine.handle(SessionEvent::StopRequested), Err(MachineError::NotActive));
    }

    #[test]
    fn test_question_index_stays_in_bounds() {
        let mut machine = SessionMachine::new(plan([3, 0, 0, 0]));
        let mut effects = machine.handle(SessionEvent::Begin).unwrap();
        while !machine.is_finished() {
            if let SessionState::Active { part, question, .. } = machine.state() {
                assert!(question < machine.plan().part(part).questions.len());
            }
            effects = complete(&mut machine, &effects);
        }
    }

    #[test]
    fn test_reset_forgets_pending_ticket() {
        let mut machine = SessionMachine::new(plan([1, 0, 0, 0]));
        let effects = machine.handle(SessionEvent::Begin).unwrap();
        let ticket = ticket_of(&effects);
        machine.reset();
        assert_eq!(machine.state(), SessionState::Idle);
        assert!(matches!(
            machine.handle(SessionEvent::NarrationFinished { ticket }),
            Err(MachineError::Stale(_))
        ));
    }
}
