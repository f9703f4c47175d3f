//! Periodic refresh timers tied to subject interest.
//!
//! One timer task exists per subject key no matter how many consumers show
//! the same subject; attachments are reference-counted and the task is
//! aborted when the last interested consumer detaches. Detaching stops
//! future fetch issuance immediately but does not cancel an in-flight
//! request; the orchestrator's per-key token discards any late completion.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default re-fetch interval.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

type BoxedFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Fetch closure invoked on every tick.
pub type FetchFn = Arc<dyn Fn() -> BoxedFuture + Send + Sync>;

#[derive(Debug)]
struct TimerEntry {
    interested: usize,
    task: JoinHandle<()>,
}

type TimerMap = Arc<Mutex<HashMap<String, TimerEntry>>>;

/// Attaches periodic re-invocation of a fetch to the lifetime of an
/// interested subject.
#[derive(Debug, Default)]
pub struct RefreshScheduler {
    timers: TimerMap,
}

impl RefreshScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in `subject_key`. The first attachment for a key
    /// spawns its timer; later attachments share it. The returned handle
    /// must be detached (or dropped) on loss of interest.
    pub fn attach(&self, subject_key: &str, interval: Duration, fetch: FetchFn) -> RefreshHandle {
        let mut timers = self.timers.lock();
        match timers.get_mut(subject_key) {
            Some(entry) => {
                entry.interested += 1;
                tracing::debug!(subject_key, interested = entry.interested, "sharing refresh timer");
            }
            None => {
                tracing::debug!(subject_key, ?interval, "starting refresh timer");
                let key = subject_key.to_string();
                let task = tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(interval);
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    // The interval's first tick completes immediately;
                    // consume it so fetches start one interval from now.
                    ticker.tick().await;
                    loop {
                        ticker.tick().await;
                        tracing::debug!(subject_key = %key, "refresh tick");
                        fetch().await;
                    }
                });
                timers.insert(
                    subject_key.to_string(),
                    TimerEntry {
                        interested: 1,
                        task,
                    },
                );
            }
        }

        RefreshHandle {
            subject_key: subject_key.to_string(),
            timers: Arc::clone(&self.timers),
            detached: AtomicBool::new(false),
        }
    }

    /// Number of live timer tasks (one per subject key with interest).
    pub fn active_timers(&self) -> usize {
        self.timers.lock().len()
    }
}

/// Detach token for one attachment. Idempotent; also detaches on drop.
#[derive(Debug)]
pub struct RefreshHandle {
    subject_key: String,
    timers: TimerMap,
    detached: AtomicBool,
}

impl RefreshHandle {
    pub fn detach(&self) {
        if self.detached.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut timers = self.timers.lock();
        if let Some(entry) = timers.get_mut(&self.subject_key) {
            entry.interested -= 1;
            if entry.interested == 0 {
                if let Some(entry) = timers.remove(&self.subject_key) {
                    entry.task.abort();
                    tracing::debug!(subject_key = %self.subject_key, "stopped refresh timer");
                }
            }
        }
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.detach();
    }
}
