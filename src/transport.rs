use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::TransportError;

/// Lifecycle notification emitted by a transport to its subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkEvent {
    /// The persistent connection was established.
    Connected,
    /// The connection was lost.
    Disconnected { reason: String },
    /// The transport hit an error. Treated as a disconnect by the manager.
    Error { message: String },
    /// The transport is about to retry the connection.
    Reconnecting,
}

/// Instantaneous statistics reported by a transport.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransportStats {
    /// Most recent round-trip time measurement, if one is available.
    pub latency: Option<Duration>,
    /// Total bytes sent over the current connection.
    pub bytes_sent: u64,
    /// Total bytes received over the current connection.
    pub bytes_received: u64,
}

/// Tuning parameters the manager may push down to a transport.
///
/// All fields are optional; a transport applies what it recognizes and keeps
/// its current settings for the rest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportTuning {
    /// Wait interval before the next reconnection attempt.
    pub reconnect_interval: Option<Duration>,
    /// Enable payload compression on the wire.
    pub enable_compression: Option<bool>,
    /// Cap on the outbound message queue, in pending messages.
    pub message_queue_size: Option<usize>,
}

impl TransportTuning {
    /// Tuning that only adjusts the retry timer.
    pub fn retry_interval(interval: Duration) -> Self {
        Self {
            reconnect_interval: Some(interval),
            ..Self::default()
        }
    }

    /// Tuning that enables compression and bounds the outbound queue.
    pub fn congestion_relief(queue_size: usize) -> Self {
        Self {
            enable_compression: Some(true),
            message_queue_size: Some(queue_size),
            ..Self::default()
        }
    }
}

/// Trait for the underlying persistent-connection transport.
///
/// The manager never opens or closes connections itself; it observes the
/// transport through this seam and issues best-effort corrective requests.
#[async_trait]
pub trait Transport: Send + Sync + fmt::Debug {
    /// Check whether the persistent connection is currently up.
    fn is_connected(&self) -> bool;

    /// Get the transport's current statistics.
    async fn stats(&self) -> TransportStats;

    /// Force an immediate reconnection attempt.
    async fn reconnect(&self) -> Result<(), TransportError>;

    /// Apply tuning parameters.
    async fn configure(&self, tuning: TransportTuning) -> Result<(), TransportError>;

    /// Subscribe to lifecycle notifications.
    ///
    /// Each call returns an independent receiver; the transport fans events
    /// out to every live subscriber.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<LinkEvent>;
}
