use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::error::TaskError;

/// Anything usable as a registration identity.
pub trait TaskKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> TaskKey for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

/// Report sent when a task is evicted after its callback failed.
#[derive(Debug)]
pub struct Eviction<K> {
    pub key: K,
    pub error: TaskError,
    /// Wall-clock time of the eviction.
    pub at: DateTime<Utc>,
    /// Successful firings before the failure.
    pub fire_count: u64,
}

/// Read-only snapshot of one registration.
#[derive(Debug, Clone)]
pub struct TaskInfo<K> {
    pub key: K,
    pub interval: Duration,
    pub next_deadline: Instant,
    pub fire_count: u64,
}
