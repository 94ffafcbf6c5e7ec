//! Debounced autosave.
//!
//! Each collection owns one [`SaveScheduler`]. An exclusive unlock calls
//! [`SaveScheduler::notify_changed`]; the first call of a burst spawns a
//! timer task that sleeps until the earlier of two deadlines:
//!
//! - the debounce deadline, pushed forward on every notify, and
//! - the max-delay deadline, fixed when the burst starts.
//!
//! Both deadlines live in one mutex-guarded [`SaveState`]. The timer task
//! re-reads them under that mutex after every wakeup, so a notify racing
//! with the timer either extends the burst or, if the burst was already
//! taken, starts a new one. Taking the burst out of the state is the
//! one-shot guard: only the task that takes it persists.

use super::sink::ErrorSink;
use crate::core::{Result, StoreConfig};
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{Level, debug, event, warn};

/// Something the scheduler can write to disk.
pub(crate) trait Persist: Send + Sync + 'static {
    fn persist(self: Arc<Self>) -> BoxFuture<'static, Result<()>>;
}

/// Counters describing autosave activity of one collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveStats {
    /// Bursts started since load
    pub bursts: u64,
    /// Scheduler-triggered saves that succeeded
    pub autosaves: u64,
    /// Scheduler-triggered saves that failed and went to the error sink
    pub failed_autosaves: u64,
    /// Whether a burst is waiting for one of its deadlines
    pub pending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FireReason {
    Debounce,
    MaxDelay,
}

impl FireReason {
    fn as_str(self) -> &'static str {
        match self {
            FireReason::Debounce => "debounce",
            FireReason::MaxDelay => "max_delay",
        }
    }
}

enum Wakeup {
    Fire(FireReason),
    Sleep(Instant),
    Gone,
}

struct Burst {
    id: u64,
    debounce_at: Instant,
    max_at: Instant,
    timer: Option<JoinHandle<()>>,
}

impl Burst {
    fn next_deadline(&self) -> Instant {
        self.debounce_at.min(self.max_at)
    }
}

#[derive(Default)]
struct SaveState {
    burst: Option<Burst>,
    next_id: u64,
}

struct SchedulerCore {
    target: Weak<dyn Persist>,
    location: String,
    runtime: Handle,
    debounce: Duration,
    max_delay: Duration,
    enabled: bool,
    sink: ErrorSink,
    state: Mutex<SaveState>,
    bursts: AtomicU64,
    autosaves: AtomicU64,
    failed_autosaves: AtomicU64,
}

impl SchedulerCore {
    fn lock_state(&self) -> MutexGuard<'_, SaveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wakeup(&self, id: u64) -> Wakeup {
        let mut state = self.lock_state();
        let Some(burst) = state.burst.as_ref().filter(|b| b.id == id) else {
            return Wakeup::Gone;
        };

        let now = Instant::now();
        let reason = if now >= burst.max_at {
            FireReason::MaxDelay
        } else if now >= burst.debounce_at {
            FireReason::Debounce
        } else {
            return Wakeup::Sleep(burst.next_deadline());
        };

        // The burst leaves the state before the save starts, so the next
        // mutation opens a fresh burst even while this one is still writing.
        state.burst = None;
        Wakeup::Fire(reason)
    }

    async fn persist(&self, reason: FireReason) {
        let Some(target) = self.target.upgrade() else {
            warn!(location = %self.location, "collection dropped before autosave, changes lost");
            return;
        };

        event!(Level::DEBUG, location = %self.location, reason = reason.as_str(), "autosave fired");
        match target.persist().await {
            Ok(()) => {
                self.autosaves.fetch_add(1, Ordering::Relaxed);
            }
            Err(err) => {
                self.failed_autosaves.fetch_add(1, Ordering::Relaxed);
                debug!(location = %self.location, error = %err, "autosave failed");
                self.sink.report(err).await;
            }
        }
    }
}

async fn run_burst(core: Arc<SchedulerCore>, id: u64) {
    let mut deadline = {
        let state = core.lock_state();
        match state.burst.as_ref().filter(|b| b.id == id) {
            Some(burst) => burst.next_deadline(),
            None => return,
        }
    };

    loop {
        sleep_until(deadline).await;
        match core.wakeup(id) {
            Wakeup::Sleep(next) => deadline = next,
            Wakeup::Fire(reason) => {
                core.persist(reason).await;
                return;
            }
            Wakeup::Gone => return,
        }
    }
}

pub struct SaveScheduler {
    core: Arc<SchedulerCore>,
}

impl SaveScheduler {
    pub(crate) fn new(
        target: Weak<dyn Persist>,
        location: &str,
        config: &StoreConfig,
        runtime: Handle,
    ) -> Self {
        Self {
            core: Arc::new(SchedulerCore {
                target,
                location: location.to_string(),
                runtime,
                debounce: config.debounce,
                max_delay: config.max_delay,
                enabled: config.autosave,
                sink: config.error_sink.clone(),
                state: Mutex::new(SaveState::default()),
                bursts: AtomicU64::new(0),
                autosaves: AtomicU64::new(0),
                failed_autosaves: AtomicU64::new(0),
            }),
        }
    }

    /// Records a mutation: opens a burst or extends the current one.
    pub fn notify_changed(&self) {
        if !self.core.enabled {
            return;
        }

        // Deadlines must come from the runtime clock the timer sleeps on,
        // even when the guard is released on a foreign thread.
        let _enter = self.core.runtime.enter();
        let now = Instant::now();
        let mut state = self.core.lock_state();

        if let Some(burst) = state.burst.as_mut() {
            burst.debounce_at = now + self.core.debounce;
            return;
        }

        state.next_id += 1;
        let id = state.next_id;
        let timer = self.core.runtime.spawn(run_burst(Arc::clone(&self.core), id));
        state.burst = Some(Burst {
            id,
            debounce_at: now + self.core.debounce,
            max_at: now + self.core.max_delay,
            timer: Some(timer),
        });
        self.core.bursts.fetch_add(1, Ordering::Relaxed);
        event!(Level::TRACE, location = %self.core.location, burst = id, "burst started");
    }

    /// Drops the pending burst, if any, without saving.
    ///
    /// Returns true if a burst was pending.
    pub fn cancel_pending(&self) -> bool {
        let burst = self.core.lock_state().burst.take();
        match burst {
            Some(mut burst) => {
                if let Some(timer) = burst.timer.take() {
                    timer.abort();
                }
                true
            }
            None => false,
        }
    }

    pub fn stats(&self) -> SaveStats {
        SaveStats {
            bursts: self.core.bursts.load(Ordering::Relaxed),
            autosaves: self.core.autosaves.load(Ordering::Relaxed),
            failed_autosaves: self.core.failed_autosaves.load(Ordering::Relaxed),
            pending: self.core.lock_state().burst.is_some(),
        }
    }
}

impl Drop for SaveScheduler {
    fn drop(&mut self) {
        if self.cancel_pending() {
            warn!(location = %self.core.location, "collection dropped with unsaved changes");
        }
    }
}
