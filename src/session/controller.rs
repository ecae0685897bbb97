//! Test controller
//!
//! Owns the ports and runs one session at a time. A session is driven by a
//! single task that holds the [`SessionMachine`] and its event receiver, so
//! transitions never interleave. Effects that take time (narration, delays,
//! artifact delivery) run as child tasks and report back on the same channel;
//! the countdown reports back through its completion callback.

use super::events::{NoticeLevel, Screen, UiEvent};
use super::filename::{artifact_filename, CandidateInfo, SessionEnd};
use super::machine::{DelayKind, Effect, MachineError, SessionEvent, SessionMachine, SessionState};
use super::parts::{PartId, Phase};
use super::plan::SessionPlan;
use super::prompt::PromptSource;
use crate::capture::CaptureError;
use crate::config::{ConfigError, PlayerConfig};
use crate::download::DownloadSink;
use crate::narration::NarrationPort;
use crate::recorder::{CapturePort, CaptureStatus, RecordingEvent};
use crate::timer::{format_clock, CountdownTimer, TickCallback};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use uuid::Uuid;

const DRIVER_LOST_NOTICE: &str = "The test stopped unexpectedly. Please start again.";

const RUNTIME_ERROR_NOTICE: &str =
    "An unexpected error occurred. The test will continue, but please report this issue.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("A test is already in progress")]
    AlreadyActive,

    #[error("No test in progress")]
    NotActive,

    #[error("The previous test is still closing")]
    CleanupPending,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Recording access failed: {0}")]
    Acquisition(CaptureError),

    #[error("Failed to start recording: {0}")]
    Capture(CaptureError),

    #[error("Test start cancelled")]
    Cancelled,
}

/// Snapshot for status surfaces
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestStatus {
    pub screen: Screen,
    pub session_id: Option<Uuid>,
    pub session_active: bool,
    pub state: &'static str,
    pub started_at: Option<DateTime<Utc>>,
    pub current_part: Option<PartId>,
    /// 1-based
    pub current_question: Option<usize>,
    pub total_questions: Option<usize>,
    pub current_phase: Option<Phase>,
    pub capture: CaptureStatus,
    pub timer_running: bool,
    pub remaining_secs: f64,
}

enum Command {
    Event(SessionEvent),
    Stop(oneshot::Sender<Result<(), SessionError>>),
}

struct SessionRecord {
    id: Uuid,
    started_at: DateTime<Utc>,
    commands: mpsc::UnboundedSender<Command>,
    driver: Option<JoinHandle<()>>,
    state: SessionState,
    /// Prompts per part, in test order
    totals: [usize; 4],
}

struct Shared {
    screen: Screen,
    starting: bool,
    /// Bumped by every emergency stop, so a start in flight can tell it was cancelled
    epoch: u64,
    session: Option<SessionRecord>,
}

struct ControllerCore {
    config: PlayerConfig,
    prompts: Arc<dyn PromptSource>,
    narration: Arc<dyn NarrationPort>,
    capture: Arc<dyn CapturePort>,
    sink: Arc<dyn DownloadSink>,
    timer: CountdownTimer,
    ui_tx: broadcast::Sender<UiEvent>,
    shared: Mutex<Shared>,
}

impl ControllerCore {
    fn emit(&self, event: UiEvent) {
        let _ = self.ui_tx.send(event);
    }

    fn show_screen(&self, screen: Screen) {
        self.shared.lock().screen = screen;
        self.emit(UiEvent::ScreenChanged { screen });
    }

    fn release_resources(&self) {
        self.timer.stop();
        self.narration.cancel();
        self.capture.cleanup();
    }
}

pub struct TestController {
    core: Arc<ControllerCore>,
}

impl TestController {
    pub fn new(
        config: PlayerConfig,
        prompts: Arc<dyn PromptSource>,
        narration: Arc<dyn NarrationPort>,
        capture: Arc<dyn CapturePort>,
        sink: Arc<dyn DownloadSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (ui_tx, _) = broadcast::channel(256);
        let timer = CountdownTimer::new(config.timer_tick());

        Ok(Self {
            core: Arc::new(ControllerCore {
                config,
                prompts,
                narration,
                capture,
                sink,
                timer,
                ui_tx,
                shared: Mutex::new(Shared {
                    screen: Screen::Start,
                    starting: false,
                    epoch: 0,
                    session: None,
                }),
            }),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UiEvent> {
        self.core.ui_tx.subscribe()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.core.config
    }

    /// Acquire recording, start it, and begin Part 1.1.
    ///
    /// Rejected without side effects while another test is starting or
    /// running. A completed test keeps its resources until its grace period
    /// ends; starting before then fails with [`SessionError::CleanupPending`].
    pub async fn start_test(&self, candidate: CandidateInfo) -> Result<Uuid, SessionError> {
        let epoch = {
            let mut shared = self.core.shared.lock();
            if let Some(record) = shared.session.as_ref() {
                if matches!(record.state, SessionState::Completed { .. }) {
                    tracing::warn!("Previous test still closing, ignoring start request");
                    return Err(SessionError::CleanupPending);
                }
            }
            if shared.starting || shared.session.is_some() {
                tracing::warn!("Test already in progress, ignoring start request");
                return Err(SessionError::AlreadyActive);
            }
            shared.starting = true;
            shared.epoch
        };

        tracing::info!("Starting IELTS Speaking Test for candidate {}", candidate.id);
        let result = self.launch(candidate, epoch).await;
        self.core.shared.lock().starting = false;

        if let Err(e) = &result {
            tracing::error!("Test start failed: {}", e);
        }
        result
    }

    async fn launch(&self, candidate: CandidateInfo, epoch: u64) -> Result<Uuid, SessionError> {
        let core = &self.core;

        // Durations are resolved before any device is touched
        let plan = SessionPlan::resolve(&core.config, core.prompts.as_ref())?;

        let mut capture_rx = core.capture.subscribe();
        if let Err(e) = core.capture.acquire().await {
            core.emit(UiEvent::notice(NoticeLevel::Error, e.acquisition_message()));
            return Err(SessionError::Acquisition(e));
        }
        while let Ok(event) = capture_rx.try_recv() {
            forward_capture_event(core, event);
        }

        if core.shared.lock().epoch != epoch {
            core.capture.cleanup();
            return Err(SessionError::Cancelled);
        }

        if let Err(e) = core.capture.start_continuous_capture() {
            core.capture.cleanup();
            return Err(SessionError::Capture(e));
        }

        let mut machine = SessionMachine::new(plan);
        let initial = machine
            .handle(SessionEvent::Begin)
            .map_err(|_| SessionError::AlreadyActive)?;
        let totals = PartId::ALL.map(|part| machine.plan().part(part).questions.len());

        let session_id = Uuid::new_v4();
        let (commands, command_rx) = mpsc::unbounded_channel();
        {
            let mut shared = core.shared.lock();
            if shared.epoch != epoch {
                drop(shared);
                core.capture.cleanup();
                return Err(SessionError::Cancelled);
            }
            shared.session = Some(SessionRecord {
                id: session_id,
                started_at: Utc::now(),
                commands: commands.clone(),
                driver: None,
                state: machine.state(),
                totals,
            });
        }
        core.show_screen(Screen::Speaking);
        tracing::info!("Test session {} started", session_id);

        let driver = SessionDriver {
            core: core.clone(),
            session_id,
            candidate,
            commands,
        };
        let handle = tokio::spawn(driver.run(machine, command_rx, capture_rx, initial));

        let mut shared = core.shared.lock();
        match shared.session.as_mut() {
            Some(record) if record.id == session_id => record.driver = Some(handle),
            _ => handle.abort(),
        }
        Ok(session_id)
    }

    /// Stop early and download what was recorded so far.
    ///
    /// Resolves once the stop is accepted; download progress follows as
    /// [`UiEvent::DownloadProgress`].
    pub async fn stop_test_manually(&self) -> Result<(), SessionError> {
        let commands = self
            .core
            .shared
            .lock()
            .session
            .as_ref()
            .map(|record| record.commands.clone())
            .ok_or(SessionError::NotActive)?;

        let (reply_tx, reply_rx) = oneshot::channel();
        commands
            .send(Command::Stop(reply_tx))
            .map_err(|_| SessionError::NotActive)?;
        reply_rx.await.unwrap_or(Err(SessionError::NotActive))
    }

    /// Tear everything down at once and return to the start screen. Nothing
    /// is downloaded.
    pub fn emergency_stop(&self) {
        tracing::warn!("Emergency stop activated");

        let session = {
            let mut shared = self.core.shared.lock();
            shared.epoch = shared.epoch.wrapping_add(1);
            shared.session.take()
        };
        if let Some(driver) = session.and_then(|record| record.driver) {
            // Dropping the driver drops its child tasks with it
            driver.abort();
        }

        self.core.release_resources();
        self.core.show_screen(Screen::Start);
    }

    /// Surface an unexpected error without interrupting the test. Returns
    /// whether a notice was shown.
    pub fn report_runtime_error(&self, error: &dyn std::fmt::Display) -> bool {
        if !self.is_active() {
            tracing::debug!("Runtime error outside a test: {}", error);
            return false;
        }
        tracing::error!("Runtime error during test: {}", error);
        self.core.emit(UiEvent::notice(NoticeLevel::Error, RUNTIME_ERROR_NOTICE));
        true
    }

    pub fn is_active(&self) -> bool {
        self.core
            .shared
            .lock()
            .session
            .as_ref()
            .map(|record| !matches!(record.state, SessionState::Idle | SessionState::Completed { .. }))
            .unwrap_or(false)
    }

    pub fn status(&self) -> TestStatus {
        let (screen, record) = {
            let shared = self.core.shared.lock();
            let record = shared
                .session
                .as_ref()
                .map(|r| (r.id, r.started_at, r.state, r.totals));
            (shared.screen, record)
        };

        let (part, question, phase) = match record.map(|r| r.2) {
            Some(SessionState::Active {
                part,
                question,
                phase,
                ..
            }) => (Some(part), Some(question + 1), phase),
            Some(SessionState::Transitioning { from, .. }) => (Some(from), None, None),
            _ => (None, None, None),
        };

        let state = record.map(|r| r.2);
        TestStatus {
            screen,
            session_id: record.map(|r| r.0),
            session_active: state
                .map(|s| !matches!(s, SessionState::Idle | SessionState::Completed { .. }))
                .unwrap_or(false),
            state: state.map(|s| s.name()).unwrap_or("idle"),
            started_at: record.map(|r| r.1),
            current_part: part,
            current_question: question,
            total_questions: part.zip(record).map(|(p, r)| r.3[p.index()]),
            current_phase: phase,
            capture: self.core.capture.status(),
            timer_running: self.core.timer.is_running(),
            remaining_secs: self.core.timer.remaining_time(),
        }
    }
}

fn forward_capture_event(core: &ControllerCore, event: RecordingEvent) {
    match event {
        RecordingEvent::FallingBack { notice } => {
            core.emit(UiEvent::notice(NoticeLevel::Warning, notice));
        }
        RecordingEvent::SourceEnded => {
            tracing::warn!("Recording source ended mid-test, continuing without it");
            core.emit(UiEvent::notice(
                NoticeLevel::Warning,
                "Screen sharing ended. Recording stopped.",
            ));
        }
        _ => {}
    }
}

/// Drops the session record if its driver stops without cleaning up
struct DriverGuard {
    core: Arc<ControllerCore>,
    session_id: Uuid,
}

impl Drop for DriverGuard {
    fn drop(&mut self) {
        let orphaned = {
            let mut shared = self.core.shared.lock();
            if shared.session.as_ref().map(|r| r.id) == Some(self.session_id) {
                shared.session = None;
                true
            } else {
                false
            }
        };
        if !orphaned {
            return;
        }

        tracing::error!("Session {} driver exited abnormally, releasing resources", self.session_id);
        self.core.release_resources();
        self.core.emit(UiEvent::notice(NoticeLevel::Error, DRIVER_LOST_NOTICE));
        self.core.show_screen(Screen::Start);
    }
}

struct SessionDriver {
    core: Arc<ControllerCore>,
    session_id: Uuid,
    candidate: CandidateInfo,
    commands: mpsc::UnboundedSender<Command>,
}

impl SessionDriver {
    async fn run(
        self,
        mut machine: SessionMachine,
        mut command_rx: mpsc::UnboundedReceiver<Command>,
        mut capture_rx: broadcast::Receiver<RecordingEvent>,
        initial: Vec<Effect>,
    ) {
        let _guard = DriverGuard {
            core: self.core.clone(),
            session_id: self.session_id,
        };
        let mut tasks = JoinSet::new();
        self.execute_all(initial, &mut tasks);
        self.publish(&machine);

        let mut capture_open = true;
        while !machine.is_finished() {
            tokio::select! {
                command = command_rx.recv() => match command {
                    Some(Command::Event(event)) => {
                        if let Err(e) = self.dispatch(&mut machine, event, &mut tasks) {
                            tracing::warn!("Session event rejected: {}", e);
                        }
                    }
                    Some(Command::Stop(reply)) => {
                        let result = self
                            .dispatch(&mut machine, SessionEvent::StopRequested, &mut tasks)
                            .map_err(|_| SessionError::NotActive);
                        let _ = reply.send(result);
                    }
                    None => break,
                },
                event = capture_rx.recv(), if capture_open => match event {
                    Ok(event) => forward_capture_event(&self.core, event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Missed {} recorder events", skipped);
                    }
                    Err(RecvError::Closed) => capture_open = false,
                },
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!("Session task panicked: {}", e);
                        }
                    }
                }
            }
        }

        tracing::debug!("Session {} driver finished", self.session_id);
    }

    fn dispatch(
        &self,
        machine: &mut SessionMachine,
        event: SessionEvent,
        tasks: &mut JoinSet<()>,
    ) -> Result<(), MachineError> {
        let effects = match machine.handle(event) {
            Ok(effects) => effects,
            Err(MachineError::Stale(event)) => {
                tracing::debug!("Ignoring stale {:?}", event);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.execute_all(effects, tasks);
        self.publish(machine);
        Ok(())
    }

    fn is_current(&self) -> bool {
        self.core
            .shared
            .lock()
            .session
            .as_ref()
            .map(|record| record.id == self.session_id)
            .unwrap_or(false)
    }

    fn publish(&self, machine: &SessionMachine) {
        let mut shared = self.core.shared.lock();
        if let Some(record) = shared.session.as_mut() {
            if record.id == self.session_id {
                record.state = machine.state();
            }
        }
    }

    fn send_later(&self, event: SessionEvent) -> impl FnOnce() + Send + 'static {
        let commands = self.commands.clone();
        move || {
            let _ = commands.send(Command::Event(event));
        }
    }

    fn execute_all(&self, effects: Vec<Effect>, tasks: &mut JoinSet<()>) {
        for effect in effects {
            if !self.is_current() {
                tracing::debug!("Session {} no longer current, dropping effects", self.session_id);
                return;
            }
            self.execute(effect, tasks);
        }
    }

    fn execute(&self, effect: Effect, tasks: &mut JoinSet<()>) {
        let core = &self.core;
        match effect {
            Effect::EnterPart {
                part,
                total_questions,
            } => {
                let title = core
                    .prompts
                    .part_metadata(part)
                    .map(|meta| meta.title)
                    .unwrap_or_else(|| format!("Part {} - {}", part.key(), part.name()));
                core.emit(UiEvent::PartStarted {
                    part,
                    title,
                    total_questions,
                });
            }
            Effect::ShowQuestion {
                part,
                number,
                total,
                text,
            } => core.emit(UiEvent::QuestionShown {
                part,
                number,
                total,
                text,
            }),
            Effect::ShowMedia { media } => core.emit(UiEvent::MediaShown { media }),
            Effect::SetPhase(phase) => core.emit(UiEvent::PhaseChanged { phase }),
            Effect::Announce {
                ticket,
                announcement,
            } => {
                let narration = core.narration.clone();
                let done = self.send_later(SessionEvent::NarrationFinished { ticket });
                tasks.spawn(async move {
                    narration.announce(&announcement).await;
                    done();
                });
            }
            Effect::StartTimer {
                ticket,
                phase,
                seconds,
            } => {
                let ui_tx = core.ui_tx.clone();
                let on_tick: TickCallback = Box::new(move |remaining, elapsed| {
                    let progress = if seconds > 0.0 {
                        (elapsed / seconds).min(1.0)
                    } else {
                        1.0
                    };
                    let _ = ui_tx.send(UiEvent::TimerTick {
                        phase,
                        remaining_secs: remaining,
                        elapsed_secs: elapsed,
                        progress,
                        clock: format_clock(remaining),
                    });
                });
                core.timer.start(
                    seconds,
                    self.send_later(SessionEvent::TimerFinished { ticket }),
                    Some(on_tick),
                );
            }
            Effect::StopTimer => core.timer.stop(),
            Effect::CancelNarration => core.narration.cancel(),
            Effect::Schedule { ticket, delay } => {
                let wait = match delay {
                    DelayKind::Settle => core.config.settle_delay(),
                    DelayKind::TransitionHold => core.config.transition_hold(),
                    DelayKind::ManualStop => core.config.manual_stop_delay(),
                    DelayKind::CompletionGrace => core.config.completion_grace(),
                };
                let done = self.send_later(SessionEvent::DelayElapsed { ticket });
                tasks.spawn(async move {
                    tokio::time::sleep(wait).await;
                    done();
                });
            }
            Effect::ShowTransition { from, to } => core.emit(UiEvent::TransitionShown {
                from,
                to,
                title: format!("Part {} Finished", from.key()),
                message: format!("Preparing for Part {}...", to.key()),
            }),
            Effect::HideTransition => core.emit(UiEvent::TransitionHidden),
            Effect::Finalize { ticket, end } => {
                if end == SessionEnd::Manual {
                    core.emit(UiEvent::progress(0, "Preparing video download..."));
                }
                let core = core.clone();
                let candidate = self.candidate.clone();
                let done = self.send_later(SessionEvent::ArtifactHandled { ticket });
                tasks.spawn(async move {
                    finalize(&core, &candidate, end).await;
                    done();
                });
            }
            Effect::ShowCompletion => core.show_screen(Screen::Completion),
            Effect::Cleanup => {
                tracing::info!("Cleaning up test session {}", self.session_id);
                core.release_resources();
                let mut shared = core.shared.lock();
                if shared.session.as_ref().map(|r| r.id) == Some(self.session_id) {
                    shared.session = None;
                }
            }
        }
    }
}

/// Pull the artifact, name it, hand it to the sink, release the buffers
async fn finalize(core: &ControllerCore, candidate: &CandidateInfo, end: SessionEnd) {
    let manual = end == SessionEnd::Manual;
    tracing::info!("Getting final video recording...");

    match core.capture.extract_artifact().await {
        Ok(Some(artifact)) if !artifact.is_empty() => {
            let filename = artifact_filename(end, candidate, Utc::now());
            tracing::info!("Video ready: {}KB", artifact.size_kb());
            if manual {
                core.emit(UiEvent::progress(90, "Preparing download..."));
            }

            match core.sink.deliver(&artifact, &filename).await {
                Ok(()) => {
                    tracing::info!("Video download completed: {}", filename);
                    if manual {
                        core.emit(UiEvent::progress(100, "Video downloaded successfully!"));
                    }
                }
                Err(e) => {
                    tracing::error!("Video download failed: {:#}", e);
                    if manual {
                        core.emit(UiEvent::progress(0, "Download failed. Please try again."));
                    } else {
                        core.emit(UiEvent::notice(
                            NoticeLevel::Error,
                            "Download failed. Please try again.",
                        ));
                    }
                }
            }

            core.capture.release_buffered_segments();
        }
        Ok(_) => {
            tracing::warn!("No video data available or empty recording");
            if manual {
                core.emit(UiEvent::progress(0, "No video recording available to download."));
            }
        }
        Err(e) => {
            tracing::error!("Error finalizing recording: {}", e);
            if manual {
                core.emit(UiEvent::progress(0, "Error occurred during download."));
            }
        }
    }
}
