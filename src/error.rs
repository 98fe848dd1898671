use thiserror::Error;

/// Errors reported by a transport when a corrective request cannot be honored.
///
/// The taxonomy is deliberately narrow: connectivity problems are represented
/// as the `Disconnected` quality level, not as errors. These variants only
/// exist so a transport can reject a reconfiguration or reconnect request;
/// the manager logs them and moves on.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport unavailable")]
    Unavailable,

    #[error("configuration rejected: {reason}")]
    Configuration { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Validation errors for manager configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must be non-zero")]
    ZeroInterval { field: &'static str },

    #[error("latency thresholds must be ordered: excellent <= good <= fair")]
    UnorderedThresholds,
}
