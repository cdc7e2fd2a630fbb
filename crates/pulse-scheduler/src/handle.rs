use std::borrow::Borrow;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use pulse_core::config::SchedulerConfig;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{
    callback::Callback,
    clock::{Clock, SystemClock},
    engine::{SchedulerEngine, Shared},
    store::Registry,
    types::{Eviction, TaskInfo, TaskKey},
};

/// Cloneable, thread-safe handle to one scheduler instance.
///
/// All clones share the same registrations and dispatch loop. Mutating calls
/// take a short internal lock and return immediately; they never wait for a
/// callback to finish.
pub struct Scheduler<K: TaskKey> {
    shared: Arc<Shared<K>>,
}

impl<K: TaskKey> Clone for Scheduler<K> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K: TaskKey> Scheduler<K> {
    /// Create a scheduler on the Tokio clock.
    ///
    /// Pass `Some(tx)` to receive an [`Eviction`] for every task whose callback
    /// fails. The sender is non-blocking (`try_send`).
    pub fn new(config: &SchedulerConfig, evicted_tx: Option<mpsc::Sender<Eviction<K>>>) -> Self {
        Self::with_clock(config, Arc::new(SystemClock), evicted_tx)
    }

    /// Create a scheduler that reads deadlines from `clock`.
    ///
    /// The dispatch loop still sleeps on Tokio time and nothing wakes it when
    /// an injected clock jumps, so a clock passed here must follow Tokio time
    /// whenever the engine runs. A [`ManualClock`](crate::ManualClock) is only
    /// suitable for driving the handle without starting the engine.
    pub fn with_clock(
        config: &SchedulerConfig,
        clock: Arc<dyn Clock>,
        evicted_tx: Option<mpsc::Sender<Eviction<K>>>,
    ) -> Self {
        let registry = Registry::new(config.resolution());
        Self {
            shared: Arc::new(Shared::new(
                registry,
                clock,
                config.idle_interval(),
                evicted_tx,
            )),
        }
    }

    /// Register `callback` to fire every `interval`, first at `now + interval`.
    ///
    /// An existing registration under the same key is replaced, not added to.
    pub fn add<C: Callback>(&self, key: K, interval: Duration, callback: C) {
        let now = self.shared.clock.now();
        let deadline = self
            .shared
            .registry()
            .insert(key.clone(), interval, Arc::new(callback), now);
        self.shared.wake.notify_one();
        debug!(
            task = ?key,
            ?interval,
            in_ms = (deadline - now).as_millis() as u64,
            "task scheduled"
        );
    }

    /// Cancel a registration. Returns false if the key was unknown.
    ///
    /// Once this returns the task will not start another firing; a firing
    /// already in progress runs to completion.
    pub fn remove<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let removed = self.shared.registry().remove(key);
        if removed {
            debug!(task = ?key, "task removed");
        }
        removed
    }

    /// Re-arm a registration for `now + interval`, discarding its current
    /// deadline. Returns false if the key was unknown.
    pub fn reset<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Debug + ?Sized,
    {
        let now = self.shared.clock.now();
        let deadline = self.shared.registry().reset(key, now);
        match deadline {
            Some(_) => {
                self.shared.wake.notify_one();
                debug!(task = ?key, "task reset");
                true
            }
            None => false,
        }
    }

    /// Spawn the dispatch loop on the current Tokio runtime.
    ///
    /// Call once per scheduler: every call spawns another loop, and the loops
    /// would race each other for due tasks.
    pub fn start(&self) -> JoinHandle<()> {
        info!("spawning scheduler engine");
        tokio::spawn(self.engine().run())
    }

    /// A dispatch loop for this scheduler, for callers that drive it
    /// themselves instead of using [`start`](Self::start).
    pub fn engine(&self) -> SchedulerEngine<K> {
        SchedulerEngine::new(Arc::clone(&self.shared))
    }

    /// Ask the dispatch loop to exit. Registrations are kept, but a loop
    /// started after this exits immediately.
    pub fn shutdown(&self) {
        self.shared.shutdown.send_replace(true);
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.registry().contains(key)
    }

    pub fn len(&self) -> usize {
        self.shared.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.registry().is_empty()
    }

    pub fn next_deadline<Q>(&self, key: &Q) -> Option<Instant>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.registry().next_deadline(key)
    }

    /// Successful firings of the current registration under `key`.
    pub fn fire_count<Q>(&self, key: &Q) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.shared.registry().fire_count(key)
    }

    /// All registrations, earliest deadline first.
    pub fn snapshot(&self) -> Vec<TaskInfo<K>> {
        self.shared.registry().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::from_fn;
    use crate::clock::ManualClock;

    fn manual() -> (Arc<ManualClock>, Scheduler<u64>) {
        let clock = Arc::new(ManualClock::default());
        let scheduler = Scheduler::with_clock(&SchedulerConfig::default(), clock.clone(), None);
        (clock, scheduler)
    }

    #[test]
    fn add_uses_injected_clock() {
        let (clock, scheduler) = manual();
        let start = clock.now();
        scheduler.add(1, Duration::from_secs(2), from_fn(|| Ok(())));
        assert_eq!(scheduler.next_deadline(&1), Some(start + Duration::from_secs(2)));
        assert_eq!(scheduler.fire_count(&1), Some(0));
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn reset_rearms_from_current_time() {
        let (clock, scheduler) = manual();
        scheduler.add(1, Duration::from_secs(2), from_fn(|| Ok(())));
        clock.advance(Duration::from_millis(1900));
        assert!(scheduler.reset(&1));
        assert_eq!(
            scheduler.next_deadline(&1),
            Some(clock.now() + Duration::from_secs(2))
        );
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let (_clock, scheduler) = manual();
        assert!(!scheduler.remove(&7));
        assert!(!scheduler.reset(&7));
        assert!(scheduler.is_empty());
        assert!(scheduler.next_deadline(&7).is_none());
    }

    #[test]
    fn clones_share_registrations() {
        let (_clock, scheduler) = manual();
        let other = scheduler.clone();
        scheduler.add(3, Duration::from_secs(1), from_fn(|| Ok(())));
        assert!(other.contains(&3));
        assert!(other.remove(&3));
        assert!(!scheduler.contains(&3));
    }

    #[test]
    fn string_keys_accept_str_lookups() {
        let scheduler: Scheduler<String> = Scheduler::new(&SchedulerConfig::default(), None);
        scheduler.add("conn-1".to_string(), Duration::from_secs(5), from_fn(|| Ok(())));
        assert!(scheduler.contains("conn-1"));
        assert!(scheduler.reset("conn-1"));
        assert!(scheduler.remove("conn-1"));
    }
}
