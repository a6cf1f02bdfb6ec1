//! Per-auction round timers
//!
//! At most one countdown task runs per tournament code. The task measures
//! real elapsed time between ticks and hands it to a [`TimerDriver`], which
//! applies it to the room under the room lock. When a round runs out the
//! task waits out the intermission, then asks the driver for the next round.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use draft_core::Countdown;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    Stopped,
    Running,
    Paused,
}

/// What the timer task should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerStep {
    Continue,
    /// The round closed; open the next one after `gap`
    Intermission {
        gap: Duration,
        passed_over: Option<Uuid>,
    },
    Stop,
}

/// Applies elapsed time to a room
pub trait TimerDriver: Send + Sync + 'static {
    fn advance(
        &self,
        code: &str,
        countdown: &mut Countdown,
        elapsed: Duration,
    ) -> impl Future<Output = TimerStep> + Send;

    /// Open the round that follows an intermission and re-base `countdown` on it
    fn next_round(
        &self,
        code: &str,
        countdown: &mut Countdown,
        passed_over: Option<Uuid>,
    ) -> impl Future<Output = TimerStep> + Send;
}

struct TimerEntry {
    id: u64,
    phase: TimerPhase,
    handle: Option<JoinHandle<()>>,
}

pub struct TimerRegistry {
    entries: Mutex<HashMap<String, TimerEntry>>,
    next_id: AtomicU64,
}

impl Default for TimerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, TimerEntry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("Timer registry mutex poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn phase(&self, code: &str) -> TimerPhase {
        self.entries()
            .get(code)
            .map_or(TimerPhase::Stopped, |entry| entry.phase)
    }

    /// Start counting down, replacing any task already registered for `code`
    pub fn start<D: TimerDriver>(
        self: &Arc<Self>,
        code: &str,
        countdown: Countdown,
        tick: Duration,
        driver: Arc<D>,
    ) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut entries = self.entries();

        if let Some(previous) = entries.remove(code) {
            if let Some(handle) = previous.handle {
                handle.abort();
            }
        }

        let handle = tokio::spawn(run_timer(
            Arc::clone(self),
            driver,
            code.to_string(),
            id,
            countdown,
            tick,
        ));
        entries.insert(
            code.to_string(),
            TimerEntry {
                id,
                phase: TimerPhase::Running,
                handle: Some(handle),
            },
        );
        debug!(code, id, seconds = countdown.seconds(), "Timer started");
    }

    /// Cancel the task and remember that the room is paused
    pub fn pause(&self, code: &str) {
        let mut entries = self.entries();
        let entry = entries.entry(code.to_string()).or_insert(TimerEntry {
            id: 0,
            phase: TimerPhase::Paused,
            handle: None,
        });
        if let Some(handle) = entry.handle.take() {
            handle.abort();
        }
        entry.phase = TimerPhase::Paused;
        debug!(code, "Timer paused");
    }

    pub fn stop(&self, code: &str) {
        if let Some(entry) = self.entries().remove(code) {
            if let Some(handle) = entry.handle {
                handle.abort();
            }
            debug!(code, "Timer stopped");
        }
    }

    pub fn stop_all(&self) {
        for (_, entry) in self.entries().drain() {
            if let Some(handle) = entry.handle {
                handle.abort();
            }
        }
    }

    /// Called by a task on its way out; stale ids are ignored
    fn finished(&self, code: &str, id: u64) {
        let mut entries = self.entries();
        let Some(entry) = entries.get_mut(code) else {
            return;
        };
        if entry.id != id {
            return;
        }
        if entry.phase == TimerPhase::Running {
            entries.remove(code);
        } else {
            entry.handle = None;
        }
    }
}

async fn run_timer<D: TimerDriver>(
    registry: Arc<TimerRegistry>,
    driver: Arc<D>,
    code: String,
    id: u64,
    mut countdown: Countdown,
    tick: Duration,
) {
    let mut last = Instant::now();
    let mut interval = interval_at(last + tick, tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        let now = Instant::now();
        let elapsed = now - last;
        last = now;

        let mut step = driver.advance(&code, &mut countdown, elapsed).await;
        if let TimerStep::Intermission { gap, passed_over } = step {
            debug!(code = %code, gap_ms = gap.as_millis() as u64, "Round closed, intermission");
            tokio::time::sleep(gap).await;
            step = driver.next_round(&code, &mut countdown, passed_over).await;
            last = Instant::now();
            interval.reset();
        }
        if step == TimerStep::Stop {
            break;
        }
    }

    debug!(code = %code, id, "Timer task finished");
    registry.finished(&code, id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    /// Counts down a bare countdown and records what it saw. With a gap
    /// set, every expiry is followed by one more round.
    struct Recorder {
        ticks: AtomicU32,
        last_seen: AtomicU32,
        rounds_opened: AtomicU32,
        gap: Option<Duration>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Self::with_gap(None)
        }

        fn with_gap(gap: Option<Duration>) -> Arc<Self> {
            Arc::new(Self {
                ticks: AtomicU32::new(0),
                last_seen: AtomicU32::new(u32::MAX),
                rounds_opened: AtomicU32::new(0),
                gap,
            })
        }
    }

    impl TimerDriver for Recorder {
        fn advance(
            &self,
            _code: &str,
            countdown: &mut Countdown,
            elapsed: Duration,
        ) -> impl Future<Output = TimerStep> + Send {
            let remaining = countdown.advance(elapsed);
            self.ticks.fetch_add(1, Ordering::SeqCst);
            self.last_seen.store(remaining, Ordering::SeqCst);
            let step = match (remaining, self.gap) {
                (0, Some(gap)) => TimerStep::Intermission {
                    gap,
                    passed_over: None,
                },
                (0, None) => TimerStep::Stop,
                _ => TimerStep::Continue,
            };
            async move { step }
        }

        fn next_round(
            &self,
            _code: &str,
            countdown: &mut Countdown,
            _passed_over: Option<Uuid>,
        ) -> impl Future<Output = TimerStep> + Send {
            let opened = self.rounds_opened.fetch_add(1, Ordering::SeqCst) + 1;
            *countdown = Countdown::new(countdown.round() + 1, 3);
            async move {
                if opened > 1 {
                    TimerStep::Stop
                } else {
                    TimerStep::Continue
                }
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_to_zero_and_deregisters() {
        let registry = Arc::new(TimerRegistry::new());
        let recorder = Recorder::new();
        registry.start("ABCD", Countdown::new(1, 3), Duration::from_secs(1), Arc::clone(&recorder));
        assert_eq!(registry.phase("ABCD"), TimerPhase::Running);

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(recorder.ticks.load(Ordering::SeqCst), 3);
        assert_eq!(recorder.last_seen.load(Ordering::SeqCst), 0);
        assert_eq!(registry.phase("ABCD"), TimerPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_intermission_delays_next_round() {
        let registry = Arc::new(TimerRegistry::new());
        let recorder = Recorder::with_gap(Some(Duration::from_secs(3)));
        registry.start("ABCD", Countdown::new(1, 2), Duration::from_secs(1), Arc::clone(&recorder));

        // Expired at 2s; nothing ticks during the gap
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        assert_eq!(recorder.ticks.load(Ordering::SeqCst), 2);
        assert_eq!(recorder.rounds_opened.load(Ordering::SeqCst), 0);
        assert_eq!(registry.phase("ABCD"), TimerPhase::Running);

        // Next round opened at 5s and ticks from there
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(recorder.rounds_opened.load(Ordering::SeqCst), 1);
        assert_eq!(recorder.ticks.load(Ordering::SeqCst), 2);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(recorder.ticks.load(Ordering::SeqCst), 3);
        assert_eq!(recorder.last_seen.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_cancels_task() {
        let registry = Arc::new(TimerRegistry::new());
        let recorder = Recorder::new();
        registry.start("ABCD", Countdown::new(1, 30), Duration::from_secs(1), Arc::clone(&recorder));

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        registry.pause("ABCD");
        let ticks = recorder.ticks.load(Ordering::SeqCst);
        assert_eq!(ticks, 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(recorder.ticks.load(Ordering::SeqCst), ticks);
        assert_eq!(registry.phase("ABCD"), TimerPhase::Paused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_previous_task() {
        let registry = Arc::new(TimerRegistry::new());
        let first = Recorder::new();
        let second = Recorder::new();
        registry.start("ABCD", Countdown::new(1, 30), Duration::from_secs(1), Arc::clone(&first));
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        registry.start("ABCD", Countdown::new(2, 30), Duration::from_secs(1), Arc::clone(&second));
        tokio::time::sleep(Duration::from_millis(5_500)).await;

        assert_eq!(first.ticks.load(Ordering::SeqCst), 1);
        assert_eq!(second.ticks.load(Ordering::SeqCst), 5);
        assert_eq!(second.last_seen.load(Ordering::SeqCst), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all() {
        let registry = Arc::new(TimerRegistry::new());
        let recorder = Recorder::new();
        registry.start("AAAA", Countdown::new(1, 30), Duration::from_secs(1), Arc::clone(&recorder));
        registry.start("BBBB", Countdown::new(1, 30), Duration::from_secs(1), Arc::clone(&recorder));

        registry.stop_all();
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(recorder.ticks.load(Ordering::SeqCst), 0);
        assert_eq!(registry.phase("AAAA"), TimerPhase::Stopped);
    }
}
