use std::collections::VecDeque;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::optimize::OptimizationAction;
use crate::quality::QualityLevel;

/// Maximum number of lifecycle events retained in the log.
pub const EVENT_LOG_CAPACITY: usize = 500;

/// What happened, with the payload the event carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConnectionEventKind {
    /// Connection established.
    Connect,
    /// Connection lost. Transport errors are recorded here with reason `"error"`.
    Disconnect { reason: String },
    /// Reconnection attempt started.
    Reconnect { attempt: u32 },
    /// Quality level transitioned between assessment ticks.
    QualityChange {
        from: QualityLevel,
        to: QualityLevel,
        score: f64,
    },
    /// An optimization strategy was applied.
    Optimization(OptimizationAction),
}

/// One timestamped entry in the event log. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionEvent {
    pub kind: ConnectionEventKind,
    /// Wall-clock timestamp for display and serialization.
    pub timestamp: DateTime<Utc>,
    /// Monotonic timestamp used for trailing-window arithmetic.
    #[serde(skip, default = "Instant::now")]
    pub recorded_at: Instant,
}

impl ConnectionEvent {
    pub fn new(kind: ConnectionEventKind) -> Self {
        Self {
            kind,
            timestamp: Utc::now(),
            recorded_at: Instant::now(),
        }
    }

    pub fn is_disconnect(&self) -> bool {
        matches!(self.kind, ConnectionEventKind::Disconnect { .. })
    }
}

/// Append-only, capacity-bounded record of lifecycle and optimization events.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<ConnectionEvent>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog {
    pub fn new() -> Self {
        Self::with_capacity(EVENT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an event, silently dropping the oldest entry beyond capacity.
    pub fn push(&mut self, event: ConnectionEvent) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(event);
    }

    pub fn record(&mut self, kind: ConnectionEventKind) {
        self.push(ConnectionEvent::new(kind));
    }

    /// The most recent `limit` events, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<ConnectionEvent> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Count disconnect events recorded within the trailing `window`.
    pub fn disconnects_within(&self, window: Duration) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .rev()
            .take_while(|e| now.duration_since(e.recorded_at) <= window)
            .filter(|e| e.is_disconnect())
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
