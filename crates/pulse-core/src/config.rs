use std::time::Duration;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_RESOLUTION_MS: u64 = 1_000; // second-level granularity
pub const DEFAULT_IDLE_INTERVAL_MS: u64 = 1_000; // re-check cadence while nothing is scheduled
pub const DEFAULT_EVICTION_BUFFER: usize = 256;
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_PING_PAYLOAD: &str = "ping";

/// Top-level config (pulse.toml + PULSE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PulseConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
    /// Recurring jobs registered by the daemon at startup.
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

/// Timing parameters for a scheduler instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Smallest interval the scheduler honours. Shorter intervals are raised
    /// to this value.
    #[serde(default = "default_resolution_ms")]
    pub resolution_ms: u64,
    /// How long the dispatch loop waits before re-checking an empty queue.
    #[serde(default = "default_idle_interval_ms")]
    pub idle_interval_ms: u64,
    /// Capacity of the eviction report channel.
    #[serde(default = "default_eviction_buffer")]
    pub eviction_buffer: usize,
}

impl SchedulerConfig {
    pub fn resolution(&self) -> Duration {
        Duration::from_millis(self.resolution_ms)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_ms)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            resolution_ms: DEFAULT_RESOLUTION_MS,
            idle_interval_ms: DEFAULT_IDLE_INTERVAL_MS,
            eviction_buffer: DEFAULT_EVICTION_BUFFER,
        }
    }
}

/// Ping keepalive settings for client connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    /// Default cadence for clients that do not pick their own interval.
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// Bytes written to the client on every ping.
    #[serde(default = "default_ping_payload")]
    pub payload: String,
}

impl KeepaliveConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: DEFAULT_PING_INTERVAL_SECS,
            payload: DEFAULT_PING_PAYLOAD.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    pub every_secs: u64,
    /// When set, the job reports failure once it has run this many times,
    /// which evicts it from the scheduler.
    #[serde(default)]
    pub fail_after: Option<u32>,
}

impl JobConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.every_secs)
    }
}

fn default_resolution_ms() -> u64 {
    DEFAULT_RESOLUTION_MS
}
fn default_idle_interval_ms() -> u64 {
    DEFAULT_IDLE_INTERVAL_MS
}
fn default_eviction_buffer() -> usize {
    DEFAULT_EVICTION_BUFFER
}
fn default_ping_interval_secs() -> u64 {
    DEFAULT_PING_INTERVAL_SECS
}
fn default_ping_payload() -> String {
    DEFAULT_PING_PAYLOAD.to_string()
}

impl PulseConfig {
    /// Load config from a TOML file with PULSE_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `PULSE_SCHEDULER__RESOLUTION_MS=500`. A missing file is not an error;
    /// every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        debug!(%path, "loading configuration");

        let config: PulseConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PULSE_").split("__"))
            .extract()
            .map_err(|e| crate::error::PulseError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.pulse/pulse.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn load(path: &str) -> Result<PulseConfig, figment::Error> {
        PulseConfig::load(Some(path)).map_err(|e| figment::Error::from(e.to_string()))
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_jail| {
            let config = load("does-not-exist.toml")?;
            assert_eq!(config.scheduler.resolution(), Duration::from_secs(1));
            assert_eq!(config.scheduler.idle_interval(), Duration::from_secs(1));
            assert_eq!(config.scheduler.eviction_buffer, DEFAULT_EVICTION_BUFFER);
            assert_eq!(config.keepalive.ping_interval(), Duration::from_secs(30));
            assert_eq!(config.keepalive.payload, "ping");
            assert!(config.jobs.is_empty());
            Ok(())
        });
    }

    #[test]
    fn toml_file_is_read() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "pulse.toml",
                r#"
                [scheduler]
                resolution_ms = 250

                [keepalive]
                payload = "hb"

                [[jobs]]
                name = "heartbeat"
                every_secs = 5

                [[jobs]]
                name = "flaky"
                every_secs = 2
                fail_after = 3
                "#,
            )?;
            let config = load("pulse.toml")?;
            assert_eq!(config.scheduler.resolution(), Duration::from_millis(250));
            // untouched fields keep their defaults
            assert_eq!(config.scheduler.idle_interval_ms, DEFAULT_IDLE_INTERVAL_MS);
            assert_eq!(config.keepalive.payload, "hb");
            assert_eq!(config.jobs.len(), 2);
            assert_eq!(config.jobs[0].interval(), Duration::from_secs(5));
            assert_eq!(config.jobs[0].fail_after, None);
            assert_eq!(config.jobs[1].fail_after, Some(3));
            Ok(())
        });
    }

    #[test]
    fn env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("pulse.toml", "[scheduler]\nresolution_ms = 250\n")?;
            jail.set_env("PULSE_SCHEDULER__RESOLUTION_MS", "500");
            jail.set_env("PULSE_KEEPALIVE__PING_INTERVAL_SECS", "10");
            let config = load("pulse.toml")?;
            assert_eq!(config.scheduler.resolution_ms, 500);
            assert_eq!(config.keepalive.ping_interval_secs, 10);
            Ok(())
        });
    }

    #[test]
    fn malformed_value_is_config_error() {
        Jail::expect_with(|jail| {
            jail.create_file("pulse.toml", "[scheduler]\nresolution_ms = \"soon\"\n")?;
            let err = PulseConfig::load(Some("pulse.toml")).unwrap_err();
            assert_eq!(err.code(), "CONFIG_ERROR");
            Ok(())
        });
    }
}
