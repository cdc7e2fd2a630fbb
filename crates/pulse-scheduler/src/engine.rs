use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    error::TaskError,
    store::{Firing, Registry, MIN_INTERVAL},
    types::{Eviction, TaskKey},
};

/// State shared between the [`Scheduler`](crate::Scheduler) handles and the
/// dispatch loop.
pub(crate) struct Shared<K> {
    registry: Mutex<Registry<K>>,
    /// Signalled whenever the earliest deadline may have moved.
    pub(crate) wake: Notify,
    pub(crate) clock: Arc<dyn Clock>,
    /// Never below [`MIN_INTERVAL`], or an empty queue would busy-loop.
    pub(crate) idle_interval: Duration,
    pub(crate) evicted_tx: Option<mpsc::Sender<Eviction<K>>>,
    pub(crate) shutdown: watch::Sender<bool>,
}

impl<K: TaskKey> Shared<K> {
    pub(crate) fn new(
        registry: Registry<K>,
        clock: Arc<dyn Clock>,
        idle_interval: Duration,
        evicted_tx: Option<mpsc::Sender<Eviction<K>>>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            registry: Mutex::new(registry),
            wake: Notify::new(),
            clock,
            idle_interval: idle_interval.max(MIN_INTERVAL),
            evicted_tx,
            shutdown,
        }
    }

    /// The lock is never held across a callback, so a poisoned guard can only
    /// come from a panic inside the registry itself; its data is still usable.
    pub(crate) fn registry(&self) -> MutexGuard<'_, Registry<K>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The dispatch loop. Obtain one from [`Scheduler::engine`](crate::Scheduler::engine)
/// and drive it with [`run`](Self::run), or let
/// [`Scheduler::start`](crate::Scheduler::start) spawn it.
///
/// Exactly one engine should run per scheduler. Two engines would race each
/// other for due tasks; nothing prevents it.
pub struct SchedulerEngine<K: TaskKey> {
    shared: Arc<Shared<K>>,
    shutdown: watch::Receiver<bool>,
}

impl<K: TaskKey> SchedulerEngine<K> {
    pub(crate) fn new(shared: Arc<Shared<K>>) -> Self {
        let shutdown = shared.shutdown.subscribe();
        Self { shared, shutdown }
    }

    /// Main event loop. Sleeps until the earliest deadline (or until a
    /// schedule change wakes it), fires everything due, and repeats until
    /// shutdown is requested.
    pub async fn run(mut self) {
        info!("scheduler engine started");
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let earliest = self.shared.registry().peek_deadline();
            let now = self.shared.clock.now();
            let wait = match earliest {
                None => Some(self.shared.idle_interval),
                Some(deadline) if deadline > now => Some(deadline - now),
                Some(_) => None,
            };

            match wait {
                Some(wait) => {
                    // Any wake-up leads back to the top, which re-reads the
                    // earliest deadline before firing anything.
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        _ = self.shared.wake.notified() => {
                            debug!("engine woken by schedule change");
                        }
                        _ = self.shutdown.changed() => {}
                    }
                }
                None => self.drain(now).await,
            }
        }
        info!("scheduler engine shutting down");
    }

    /// Fire every task due at `now`, earliest first.
    async fn drain(&self, now: Instant) {
        loop {
            let next = self.shared.registry().take_due(now);
            let Some(firing) = next else {
                break;
            };
            let outcome = AssertUnwindSafe(firing.callback.fire())
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(TaskError::Panicked(panic_message(panic.as_ref()))));

            match outcome {
                Ok(()) => {
                    let done = self.shared.clock.now();
                    if self.shared.registry().complete(&firing, done) {
                        debug!(task = ?firing.key, "task fired");
                    } else {
                        debug!(task = ?firing.key, "task fired but was removed meanwhile");
                    }
                }
                Err(e) => self.evict(firing, e),
            }
        }
    }

    fn evict(&self, firing: Firing<K>, e: TaskError) {
        let evicted = self.shared.registry().evict(&firing);
        let Some(fire_count) = evicted else {
            warn!(task = ?firing.key, code = e.code(), "task failed after it was removed: {e}");
            return;
        };
        error!(task = ?firing.key, code = e.code(), fire_count, "task failed, evicting: {e}");

        // try_send never blocks the dispatch loop; log a warning if the channel is full.
        if let Some(ref tx) = self.shared.evicted_tx {
            let report = Eviction {
                key: firing.key.clone(),
                error: e,
                at: Utc::now(),
                fire_count,
            };
            if tx.try_send(report).is_err() {
                warn!(task = ?firing.key, "eviction channel full or closed, report dropped");
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
