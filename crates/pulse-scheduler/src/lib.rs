//! `pulse-scheduler` — in-process recurring-task scheduler on Tokio.
//!
//! # Overview
//!
//! Callers register a [`Callback`] under a key together with a repeat
//! interval. A single background task (the [`SchedulerEngine`]) sleeps until
//! the earliest deadline, fires whatever is due, and re-arms it for
//! `now + interval`. Registrations can be cancelled or re-armed from any
//! thread without disturbing the others.
//!
//! # Layout
//!
//! | Module     | Role                                                        |
//! |------------|-------------------------------------------------------------|
//! | `queue`    | Min-heap of deadlines over an arena, with O(log n) removal  |
//! | `store`    | Key → slot index and per-task bookkeeping                   |
//! | `engine`   | Dispatch loop: sleep, drain due tasks, reschedule or evict  |
//! | `handle`   | [`Scheduler`], the cloneable thread-safe facade             |
//! | `clock`    | Injectable time source                                      |
//!
//! # Failure policy
//!
//! A callback that returns an error (or panics) is evicted on the spot. There
//! is no retry. Evictions are logged and, if a channel was supplied, reported
//! as [`Eviction`] values.

pub mod callback;
pub mod clock;
pub mod engine;
pub mod error;
pub mod handle;
pub mod queue;
pub mod store;
pub mod types;

pub use callback::{from_fn, Callback};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::SchedulerEngine;
pub use error::TaskError;
pub use handle::Scheduler;
pub use types::{Eviction, TaskInfo, TaskKey};
