pub mod config;
pub mod error;

pub use config::{JobConfig, KeepaliveConfig, PulseConfig, SchedulerConfig};
pub use error::{PulseError, Result};
