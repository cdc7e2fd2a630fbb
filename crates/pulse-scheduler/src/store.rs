//! Registration store: key → queue slot, plus per-task bookkeeping.
//!
//! Every key in `index` owns exactly one live record in `queue` and every
//! record carries the key that owns it. All methods keep that bijection intact
//! before returning.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::callback::Callback;
use crate::queue::{DeadlineQueue, SlotId};
use crate::types::{TaskInfo, TaskKey};

/// Floor for the configured resolution; a zero interval would fire forever.
pub(crate) const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Ceiling for any interval, the same 30-year horizon Tokio treats as "far
/// future". Keeps `now + interval` representable.
pub(crate) const MAX_INTERVAL: Duration = Duration::from_secs(86_400 * 365 * 30);

/// `now + interval` without the overflow panic. Intervals are already capped
/// at [`MAX_INTERVAL`], so the fallbacks only matter for an `Instant` near the
/// end of its range.
fn deadline_after(now: Instant, interval: Duration) -> Instant {
    now.checked_add(interval)
        .or_else(|| now.checked_add(MAX_INTERVAL))
        .unwrap_or(now)
}

struct Task<K> {
    key: K,
    interval: Duration,
    callback: Arc<dyn Callback>,
    /// Unique per `insert`; tells a replacement apart from its predecessor.
    registration: u64,
    /// Bumped whenever the deadline is moved by a reset or a firing.
    epoch: u64,
    fire_count: u64,
}

/// One firing handed from the registry to the dispatch loop.
pub struct Firing<K> {
    pub key: K,
    pub callback: Arc<dyn Callback>,
    registration: u64,
    epoch: u64,
}

pub struct Registry<K> {
    index: HashMap<K, SlotId>,
    queue: DeadlineQueue<Task<K>>,
    min_interval: Duration,
    next_registration: u64,
}

impl<K: TaskKey> Registry<K> {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            index: HashMap::new(),
            queue: DeadlineQueue::new(),
            min_interval: min_interval.clamp(MIN_INTERVAL, MAX_INTERVAL),
            next_registration: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Register `key`, replacing any previous registration. Returns the first
    /// deadline.
    pub fn insert(
        &mut self,
        key: K,
        interval: Duration,
        callback: Arc<dyn Callback>,
        now: Instant,
    ) -> Instant {
        let interval = interval.clamp(self.min_interval, MAX_INTERVAL);
        let deadline = deadline_after(now, interval);
        self.remove(&key);
        self.next_registration += 1;
        let task = Task {
            key: key.clone(),
            interval,
            callback,
            registration: self.next_registration,
            epoch: 0,
            fire_count: 0,
        };
        let slot = self.queue.push(deadline, task);
        self.index.insert(key, slot);
        deadline
    }

    pub fn remove<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        match self.index.remove(key) {
            Some(slot) => self.queue.remove(slot).is_some(),
            None => false,
        }
    }

    /// Re-arm `key` for `now + interval`. Returns the new deadline.
    pub fn reset<Q>(&mut self, key: &Q, now: Instant) -> Option<Instant>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = *self.index.get(key)?;
        let task = self.queue.get_mut(slot)?;
        task.epoch += 1;
        let deadline = deadline_after(now, task.interval);
        self.queue.reschedule(slot, deadline);
        Some(deadline)
    }

    pub fn peek_deadline(&self) -> Option<Instant> {
        self.queue.peek().map(|(_, deadline)| deadline)
    }

    pub fn next_deadline<Q>(&self, key: &Q) -> Option<Instant>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.queue.deadline(*self.index.get(key)?)
    }

    pub fn fire_count<Q>(&self, key: &Q) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.queue.get(*self.index.get(key)?).map(|t| t.fire_count)
    }

    /// Take the earliest task if it is due at `now`.
    ///
    /// The task stays registered and is provisionally re-armed for
    /// `now + interval`, so a slow callback cannot make it look due again.
    pub fn take_due(&mut self, now: Instant) -> Option<Firing<K>> {
        let (slot, deadline) = self.queue.peek()?;
        if deadline > now {
            return None;
        }
        let task = self.queue.get_mut(slot)?;
        task.epoch += 1;
        let firing = Firing {
            key: task.key.clone(),
            callback: Arc::clone(&task.callback),
            registration: task.registration,
            epoch: task.epoch,
        };
        let next = deadline_after(now, task.interval);
        self.queue.reschedule(slot, next);
        Some(firing)
    }

    /// Record a successful firing and re-arm from `now`.
    ///
    /// Returns false if the registration was removed or replaced while the
    /// callback ran. A reset that landed during the firing keeps its deadline.
    pub fn complete(&mut self, firing: &Firing<K>, now: Instant) -> bool {
        let Some(slot) = self.current_slot(firing) else {
            return false;
        };
        let Some(task) = self.queue.get_mut(slot) else {
            return false;
        };
        task.fire_count += 1;
        if task.epoch == firing.epoch {
            let deadline = deadline_after(now, task.interval);
            self.queue.reschedule(slot, deadline);
        }
        true
    }

    /// Drop the registration that produced `firing`. Returns its successful
    /// fire count, or `None` if it was already removed or replaced.
    pub fn evict(&mut self, firing: &Firing<K>) -> Option<u64> {
        let slot = self.current_slot(firing)?;
        self.index.remove(&firing.key);
        self.queue.remove(slot).map(|t| t.fire_count)
    }

    /// All registrations, earliest deadline first.
    pub fn snapshot(&self) -> Vec<TaskInfo<K>> {
        let mut tasks: Vec<_> = self
            .queue
            .iter()
            .map(|(_, deadline, task)| TaskInfo {
                key: task.key.clone(),
                interval: task.interval,
                next_deadline: deadline,
                fire_count: task.fire_count,
            })
            .collect();
        tasks.sort_by_key(|t| t.next_deadline);
        tasks
    }

    fn current_slot(&self, firing: &Firing<K>) -> Option<SlotId> {
        let slot = *self.index.get(&firing.key)?;
        let task = self.queue.get(slot)?;
        (task.registration == firing.registration).then_some(slot)
    }

    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let bijective = self.index.len() == self.queue.len()
            && self
                .index
                .iter()
                .all(|(key, &slot)| self.queue.get(slot).is_some_and(|t| &t.key == key));
        bijective && self.queue.is_consistent()
    }
}
