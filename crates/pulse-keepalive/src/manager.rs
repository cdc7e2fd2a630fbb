use std::sync::Arc;
use std::time::Duration;

use pulse_core::config::{KeepaliveConfig, SchedulerConfig};
use pulse_scheduler::{Eviction, Scheduler, TaskError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::client::Client;

/// Pings every registered client on its own interval.
///
/// Registrations are keyed by [`Client::conn_id`]; adding a client whose id
/// is already registered replaces the old registration.
#[derive(Clone)]
pub struct PingManager {
    scheduler: Scheduler<String>,
    payload: Arc<[u8]>,
}

impl PingManager {
    /// Pass `Some(tx)` to be told about clients dropped after a failed ping.
    pub fn new(
        scheduler: &SchedulerConfig,
        keepalive: &KeepaliveConfig,
        evicted_tx: Option<mpsc::Sender<Eviction<String>>>,
    ) -> Self {
        Self::with_scheduler(Scheduler::new(scheduler, evicted_tx), keepalive)
    }

    /// Build on an existing scheduler (e.g. one with an injected clock).
    pub fn with_scheduler(scheduler: Scheduler<String>, keepalive: &KeepaliveConfig) -> Self {
        Self {
            scheduler,
            payload: Arc::from(keepalive.payload.as_bytes()),
        }
    }

    /// Start pinging `client` every `client.ping_interval()`.
    pub fn add<C: Client>(&self, client: Arc<C>) {
        let interval = client.ping_interval();
        self.add_with_interval(client, interval);
    }

    /// Like [`add`](Self::add) but with an explicit cadence, for clients that
    /// have no preference of their own.
    pub fn add_with_interval<C: Client>(&self, client: Arc<C>, interval: Duration) {
        let conn_id = client.conn_id().to_string();
        let payload = Arc::clone(&self.payload);
        self.scheduler.add(conn_id.clone(), interval, move || {
            let client = Arc::clone(&client);
            let payload = Arc::clone(&payload);
            async move {
                client.write_message(&payload).await.map_err(TaskError::from)?;
                debug!(conn_id = client.conn_id(), "ping sent");
                Ok::<(), TaskError>(())
            }
        });
        info!(%conn_id, ?interval, "client registered for keepalive");
    }

    /// Stop pinging `conn_id`. Returns false if it was not registered.
    pub fn remove(&self, conn_id: &str) -> bool {
        let removed = self.scheduler.remove(conn_id);
        if removed {
            info!(conn_id, "client removed from keepalive");
        }
        removed
    }

    /// Push the next ping for `conn_id` a full interval into the future.
    pub fn reset(&self, conn_id: &str) -> bool {
        self.scheduler.reset(conn_id)
    }

    pub fn contains(&self, conn_id: &str) -> bool {
        self.scheduler.contains(conn_id)
    }

    pub fn len(&self) -> usize {
        self.scheduler.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scheduler.is_empty()
    }

    /// Spawn the ping loop. Call once.
    pub fn start(&self) -> JoinHandle<()> {
        self.scheduler.start()
    }

    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }

    pub fn scheduler(&self) -> &Scheduler<String> {
        &self.scheduler
    }
}
