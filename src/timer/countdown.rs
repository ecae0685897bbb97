//! Countdown timer
//!
//! Runs one countdown at a time on a tokio ticker task. Starting a new
//! countdown cancels the previous one; there is no queueing.

use super::state::{TimerState, TimerStatus};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Called with `(remaining_secs, elapsed_secs)` on every evaluation
pub type TickCallback = Box<dyn Fn(f64, f64) + Send + Sync + 'static>;

/// Called once when the countdown reaches zero
pub type CompleteCallback = Box<dyn FnOnce() + Send + 'static>;

struct Run {
    state: TimerState,
    /// Bumped on every start/stop; a ticker only acts while its generation is current
    generation: u64,
    on_complete: Option<CompleteCallback>,
    on_tick: Option<Arc<TickCallback>>,
}

/// Single-instance countdown timer
#[derive(Clone)]
pub struct CountdownTimer {
    run: Arc<Mutex<Run>>,
    ticker: Arc<Mutex<Option<JoinHandle<()>>>>,
    tick_interval: Duration,
}

impl CountdownTimer {
    pub fn new(tick_interval: Duration) -> Self {
        Self {
            run: Arc::new(Mutex::new(Run {
                state: TimerState::new(),
                generation: 0,
                on_complete: None,
                on_tick: None,
            })),
            ticker: Arc::new(Mutex::new(None)),
            tick_interval: tick_interval.max(Duration::from_millis(1)),
        }
    }

    /// Start a countdown, cancelling any run in progress.
    ///
    /// A non-positive duration completes on the first evaluation. One too
    /// large to represent runs until stopped.
    pub fn start<F>(&self, duration_secs: f64, on_complete: F, on_tick: Option<TickCallback>)
    where
        F: FnOnce() + Send + 'static,
    {
        let duration = if duration_secs.is_nan() || duration_secs <= 0.0 {
            Duration::ZERO
        } else {
            Duration::try_from_secs_f64(duration_secs).unwrap_or_else(|e| {
                tracing::warn!("Timer duration {} out of range ({}), clamping", duration_secs, e);
                Duration::MAX
            })
        };

        let generation = {
            let mut run = self.run.lock();
            run.generation = run.generation.wrapping_add(1);
            run.state.begin(duration, Instant::now());
            run.on_complete = Some(Box::new(on_complete));
            run.on_tick = on_tick.map(Arc::new);
            run.generation
        };

        tracing::debug!("Timer started: {:.1} seconds", duration.as_secs_f64());

        let run = self.run.clone();
        let tick_interval = self.tick_interval;
        let handle = tokio::spawn(async move {
            let mut interval = time::interval(tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;

                let (remaining, elapsed, on_tick, finished) = {
                    let mut guard = run.lock();
                    if guard.generation != generation {
                        return;
                    }
                    if guard.state.status == TimerStatus::Paused {
                        continue;
                    }
                    let now = Instant::now();
                    let remaining = guard.state.remaining_at(now);
                    let elapsed = guard.state.elapsed_at(now);
                    let on_tick = guard.on_tick.clone();
                    let finished = if remaining.is_zero() {
                        guard.state.complete();
                        guard.on_tick = None;
                        guard.on_complete.take()
                    } else {
                        None
                    };
                    (remaining, elapsed, on_tick, finished)
                };

                if let Some(on_tick) = on_tick {
                    on_tick(remaining.as_secs_f64(), elapsed.as_secs_f64());
                }

                if let Some(on_complete) = finished {
                    tracing::debug!("Timer completed");
                    on_complete();
                    return;
                }
            }
        });

        if let Some(previous) = self.ticker.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Cancel the active countdown and drop its callbacks. Idempotent.
    pub fn stop(&self) {
        {
            let mut run = self.run.lock();
            run.generation = run.generation.wrapping_add(1);
            run.state.reset();
            run.on_complete = None;
            run.on_tick = None;
        }
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
    }

    pub fn pause(&self) {
        if self.run.lock().state.pause(Instant::now()) {
            tracing::debug!("Timer paused");
        }
    }

    pub fn resume(&self) {
        if self.run.lock().state.resume(Instant::now()) {
            tracing::debug!("Timer resumed");
        }
    }

    pub fn remaining_time(&self) -> f64 {
        self.run.lock().state.remaining_at(Instant::now()).as_secs_f64()
    }

    pub fn elapsed_time(&self) -> f64 {
        self.run.lock().state.elapsed_at(Instant::now()).as_secs_f64()
    }

    /// Counting down and not paused
    pub fn is_running(&self) -> bool {
        self.run.lock().state.status == TimerStatus::Running
    }

    pub fn status(&self) -> TimerStatus {
        self.run.lock().state.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_once_after_duration() {
        let timer = CountdownTimer::new(Duration::from_millis(100));
        let (fired, on_complete) = counter();
        timer.start(2.0, on_complete, None);

        time::sleep(Duration::from_millis(1900)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(timer.is_running());

        time::sleep(Duration::from_millis(300)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_running());

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_duration_runs_until_stopped() {
        let timer = CountdownTimer::new(Duration::from_millis(100));
        let (fired, on_complete) = counter();
        timer.start(1e30, on_complete, None);

        time::sleep(Duration::from_secs(60)).await;
        assert!(timer.is_running());
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        timer.stop();
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_duration_fires_on_first_evaluation() {
        let timer = CountdownTimer::new(Duration::from_millis(100));
        let (fired, on_complete) = counter();
        timer.start(0.0, on_complete, None);
        time::sleep(Duration::from_millis(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_overwrites_previous_run() {
        let timer = CountdownTimer::new(Duration::from_millis(100));
        let (first, first_complete) = counter();
        let (second, second_complete) = counter();

        timer.start(1.0, first_complete, None);
        time::sleep(Duration::from_millis(500)).await;
        timer.start(1.0, second_complete, None);
        time::sleep(Duration::from_secs(3)).await;

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent_and_drops_callbacks() {
        let timer = CountdownTimer::new(Duration::from_millis(100));
        let (fired, on_complete) = counter();
        timer.start(1.0, on_complete, None);
        timer.stop();
        timer.stop();
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(timer.remaining_time(), 0.0);
        assert_eq!(timer.status(), TimerStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_freezes_countdown() {
        let timer = CountdownTimer::new(Duration::from_millis(100));
        let (fired, on_complete) = counter();
        timer.start(3.0, on_complete, None);

        time::sleep(Duration::from_secs(1)).await;
        timer.pause();
        let frozen = timer.remaining_time();
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(timer.remaining_time(), frozen);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!timer.is_running());

        timer.resume();
        time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_millis(700)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_report_progress() {
        let timer = CountdownTimer::new(Duration::from_millis(100));
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let sink = ticks.clone();
        timer.start(
            0.5,
            || {},
            Some(Box::new(move |remaining, elapsed| {
                sink.lock().push((remaining, elapsed));
            })),
        );
        time::sleep(Duration::from_secs(1)).await;

        let ticks = ticks.lock();
        assert!(ticks.len() >= 5);
        assert_eq!(ticks.last().map(|t| t.0), Some(0.0));
        assert!(ticks.windows(2).all(|w| w[0].0 >= w[1].0));
    }
}
