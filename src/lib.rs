pub mod config;
pub mod error;
pub mod event;
pub mod manager;
pub mod optimize;
pub mod quality;
pub mod reconnect;
pub mod transport;

pub use config::{ConfigPatch, ConnectionManagerConfig, LatencyThresholds};
pub use error::{ConfigError, TransportError};
pub use event::{ConnectionEvent, ConnectionEventKind, EventLog, EVENT_LOG_CAPACITY};
pub use manager::{ConnectionManager, ConnectionStats};
pub use optimize::{OptimizationAction, OPTIMIZATION_SCORE_THRESHOLD};
pub use quality::{
    ConnectionQuality, QualityHistory, QualityLevel, QUALITY_HISTORY_CAPACITY,
    UNMEASURABLE_LATENCY,
};
pub use reconnect::ReconnectPolicy;
pub use transport::{LinkEvent, Transport, TransportStats, TransportTuning};
