//! Repeating timers bound to a worker's event loop.

use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::types::JobTask;

/// Identifier returned by [`Timers::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    #[inline]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Timers owned by one worker.
///
/// Must be used from inside a tokio runtime. A callback that panics is
/// logged and the timer keeps firing. Dropping `Timers` cancels everything.
pub struct Timers {
    label: String,
    next_id: u64,
    handles: HashMap<TimerId, JoinHandle<()>>,
}

impl Timers {
    /// `label` identifies the owner in log lines.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            next_id: 1,
            handles: HashMap::new(),
        }
    }

    /// Fire `callback` every `period`, first after one full period.
    pub fn add(&mut self, period: Duration, callback: JobTask) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;

        let label = self.label.clone();
        let first = Instant::now() + period;
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(first, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if let Err(payload) = catch_unwind(AssertUnwindSafe(|| callback())) {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "non-string panic payload".to_string());
                    tracing::error!(job = %label, timer = %id, error = %message, "job task panicked");
                }
            }
        });

        tracing::debug!(job = %self.label, timer = %id, period_ms = period.as_millis() as u64, "timer added");
        self.handles.insert(id, handle);
        id
    }

    /// Stop a timer. Returns false if `id` is unknown.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.handles.remove(&id) {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Stop every timer.
    pub fn cancel_all(&mut self) {
        for (_, handle) in self.handles.drain() {
            handle.abort();
        }
    }

    /// Active timer ids in creation order.
    pub fn ids(&self) -> Vec<TimerId> {
        let mut ids: Vec<TimerId> = self.handles.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

impl fmt::Debug for Timers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timers")
            .field("label", &self.label)
            .field("ids", &self.ids())
            .finish()
    }
}
