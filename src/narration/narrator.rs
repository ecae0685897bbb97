//! Fail-open narrator
//!
//! Wraps a [`SpeechEngine`] so that an announcement always resolves: a missing
//! engine, an engine error, an engine that never finishes and a cancelled
//! announcement all count as "announcement skipped".

use super::engine::{select_voice, SpeechEngine, Utterance};
use super::{Announcement, NarrationPort};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub struct Narrator<E: SpeechEngine> {
    engine: Arc<E>,
    /// Upper bound on a single announcement
    timeout: Duration,
    /// Generation of the announcement allowed to finish; bumped to cancel
    current: watch::Sender<u64>,
    speaking: AtomicBool,
}

impl<E: SpeechEngine> Narrator<E> {
    pub fn new(engine: Arc<E>, timeout: Duration) -> Self {
        let (current, _) = watch::channel(0);
        Self {
            engine,
            timeout,
            current,
            speaking: AtomicBool::new(false),
        }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    fn utterance(&self, announcement: &Announcement) -> Utterance {
        let voices = self.engine.voices();
        let voice = select_voice(&voices).map(|v| v.name.clone());
        Utterance::new(announcement.text.clone())
            .with_rate(announcement.kind.rate())
            .with_voice(voice)
    }

    /// Invalidate whatever is in flight and return the new generation
    fn supersede(&self) -> u64 {
        let mut generation = 0;
        self.current.send_modify(|g| {
            *g = g.wrapping_add(1);
            generation = *g;
        });
        self.engine.cancel();
        generation
    }
}

#[async_trait]
impl<E: SpeechEngine + 'static> NarrationPort for Narrator<E> {
    async fn announce(&self, announcement: &Announcement) {
        if !self.engine.is_supported() {
            tracing::warn!("Speech synthesis not supported, skipping announcement");
            return;
        }

        let generation = self.supersede();
        let mut cancelled = self.current.subscribe();
        let utterance = self.utterance(announcement);

        self.speaking.store(true, Ordering::SeqCst);
        tracing::debug!(
            "Speech started: {}",
            announcement.text.chars().take(50).collect::<String>()
        );

        tokio::select! {
            result = tokio::time::timeout(self.timeout, self.engine.speak(&utterance)) => {
                match result {
                    Ok(Ok(())) => tracing::debug!("Speech ended"),
                    Ok(Err(e)) => tracing::warn!("Speech error, announcement skipped: {}", e),
                    Err(_) => {
                        tracing::warn!("Speech timed out after {:?}, announcement skipped", self.timeout);
                        self.engine.cancel();
                    }
                }
            }
            _ = cancelled.wait_for(|g| *g != generation) => {
                tracing::debug!("Speech cancelled");
            }
        }

        if *self.current.borrow() == generation {
            self.speaking.store(false, Ordering::SeqCst);
        }
    }

    fn cancel(&self) {
        self.supersede();
        self.speaking.store(false, Ordering::SeqCst);
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }
}
