use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::KeepaliveError;

/// A connection that must be pinged periodically.
#[async_trait]
pub trait Client: Send + Sync + 'static {
    /// Stable identity of the connection; one keepalive registration per id.
    fn conn_id(&self) -> &str;

    fn ping_interval(&self) -> Duration;

    /// Write `data` to the peer. An error ends the keepalive registration.
    async fn write_message(&self, data: &[u8]) -> Result<(), KeepaliveError>;
}

/// Client whose writes go into the outbound queue of a per-connection writer
/// task (the task that owns the socket's sink).
///
/// Writes never wait: a full queue means the peer is not keeping up and is
/// treated as a failed ping, as is a queue whose writer has gone away.
#[derive(Debug, Clone)]
pub struct ChannelClient {
    conn_id: String,
    ping_interval: Duration,
    tx: mpsc::Sender<Vec<u8>>,
}

impl ChannelClient {
    /// New client with a random UUID v4 connection id.
    pub fn new(ping_interval: Duration, tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self::with_conn_id(uuid::Uuid::new_v4().to_string(), ping_interval, tx)
    }

    pub fn with_conn_id(
        conn_id: impl Into<String>,
        ping_interval: Duration,
        tx: mpsc::Sender<Vec<u8>>,
    ) -> Self {
        Self {
            conn_id: conn_id.into(),
            ping_interval,
            tx,
        }
    }
}

#[async_trait]
impl Client for ChannelClient {
    fn conn_id(&self) -> &str {
        &self.conn_id
    }

    fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    async fn write_message(&self, data: &[u8]) -> Result<(), KeepaliveError> {
        self.tx.try_send(data.to_vec()).map_err(|e| match e {
            TrySendError::Full(_) => KeepaliveError::SlowConsumer {
                conn_id: self.conn_id.clone(),
            },
            TrySendError::Closed(_) => KeepaliveError::Closed {
                conn_id: self.conn_id.clone(),
            },
        })
    }
}
