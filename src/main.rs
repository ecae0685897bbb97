//! Headless player
//!
//! Runs a full test against synthetic devices and paced speech, writing the
//! recording into a downloads directory. UI events are logged as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use ielts_speaking_player::capture::{CaptureError, SyntheticDevices};
use ielts_speaking_player::download::DirectoryDownloadSink;
use ielts_speaking_player::narration::{Narrator, PacedSpeech};
use ielts_speaking_player::question_bank::QuestionBank;
use ielts_speaking_player::recorder::RecordingCoordinator;
use ielts_speaking_player::session::Screen;
use ielts_speaking_player::utils::ErrorResponse;
use ielts_speaking_player::{init_tracing, CandidateInfo, PlayerConfig, TestController, UiEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "ielts-speaking-player", version, about = "Run a speaking test headless")]
struct Cli {
    /// Player config (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Question bank (JSON); the built-in bank is used otherwise
    #[arg(long)]
    questions: Option<PathBuf>,

    /// Where recordings are written
    #[arg(long, default_value = "downloads")]
    downloads: PathBuf,

    #[arg(long, default_value = "")]
    candidate_id: String,

    #[arg(long, default_value = "")]
    candidate_name: String,

    #[arg(long, default_value = "")]
    phone: String,

    /// Seed for question selection
    #[arg(long)]
    seed: Option<u64>,

    /// Stop the test manually after this many seconds
    #[arg(long)]
    stop_after: Option<u64>,

    /// Pretend the host cannot share its screen
    #[arg(long)]
    no_screen: bool,

    /// Speaking pace of the narrator
    #[arg(long, default_value_t = 150.0)]
    words_per_minute: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PlayerConfig::from_json_file(path)?,
        None => PlayerConfig::default(),
    };
    let bank = match &cli.questions {
        Some(path) => QuestionBank::from_json_file(path)?,
        None => QuestionBank::builtin(),
    };
    let bank = match cli.seed {
        Some(seed) => bank.with_seed(seed),
        None => bank,
    };

    let devices = Arc::new(SyntheticDevices::new(4096));
    if cli.no_screen {
        devices.fail_display(CaptureError::Unsupported("no display on this host".to_string()));
    }

    let narrator = Arc::new(Narrator::new(
        Arc::new(PacedSpeech::new(cli.words_per_minute)),
        config.narration_timeout(),
    ));
    let capture = Arc::new(RecordingCoordinator::new(devices, config.recorder.clone()));
    let sink = Arc::new(DirectoryDownloadSink::new(&cli.downloads));

    let controller = TestController::new(config, Arc::new(bank), narrator, capture, sink)
        .context("Invalid player configuration")?;
    let mut ui = controller.subscribe();

    let candidate = CandidateInfo::new(cli.candidate_id, cli.candidate_name, cli.phone);
    if let Err(e) = controller.start_test(candidate).await {
        let response = ErrorResponse::from(e);
        anyhow::bail!("{}", serde_json::to_string(&response)?);
    }

    let deadline = Instant::now() + Duration::from_secs(cli.stop_after.unwrap_or(0));
    let mut stop_pending = cli.stop_after.is_some();
    let mut poll = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            event = ui.recv() => match event {
                Ok(UiEvent::TimerTick { .. }) => {}
                Ok(event) => tracing::info!("{}", serde_json::to_string(&event)?),
                Err(RecvError::Lagged(skipped)) => tracing::debug!("Skipped {} UI events", skipped),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::time::sleep_until(deadline), if stop_pending => {
                stop_pending = false;
                if let Err(e) = controller.stop_test_manually().await {
                    tracing::warn!("Manual stop rejected: {}", e);
                }
            }
            _ = poll.tick() => {
                let status = controller.status();
                if status.screen == Screen::Completion && status.session_id.is_none() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                controller.emergency_stop();
                break;
            }
        }
    }

    tracing::info!("Player finished");
    Ok(())
}
