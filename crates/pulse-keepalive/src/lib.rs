//! `pulse-keepalive` — periodic pings for long-lived client connections.
//!
//! Each registered [`Client`] gets the configured payload written to it every
//! [`Client::ping_interval`]. A client whose write fails is dropped from the
//! keepalive set on the spot and reported like any other scheduler eviction.
//! Traffic that already proves the peer is alive can push the next ping back
//! with [`PingManager::reset`].

pub mod client;
pub mod error;
pub mod manager;

pub use client::{ChannelClient, Client};
pub use error::KeepaliveError;
pub use manager::PingManager;
