use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::LatencyThresholds;
use crate::quality::{ConnectionQuality, QualityLevel};

/// Quality score below which automatic optimization kicks in.
pub const OPTIMIZATION_SCORE_THRESHOLD: f64 = 60.0;

/// Cool-down before a delayed reconnection on a badly flapping link.
pub const STABILITY_BACKOFF_COOLDOWN: Duration = Duration::from_secs(30);

/// Outbound queue cap applied when relieving congestion.
pub const CONGESTION_QUEUE_LIMIT: usize = 50;

const LOW_STABILITY: f64 = 50.0;
const CRITICAL_STABILITY: f64 = 30.0;
const LOW_THROUGHPUT: f64 = 1.0;

/// A corrective action chosen by the optimization controller, carrying the
/// metric that triggered it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptimizationAction {
    /// Backoff interval pushed to the transport's retry timer.
    AdaptiveReconnect { interval: Duration, attempt: u32 },
    /// Immediate reconnect because latency exceeded the fair threshold.
    ReconnectHighLatency { latency_ms: f64 },
    /// Reconnect on an unstable link; delayed by the cool-down when the link
    /// is flapping badly enough that an immediate retry would thrash.
    StabilityBackoff { stability: f64, delayed: bool },
    /// Compression plus a bounded outbound queue to relieve congestion.
    ThroughputOptimization { throughput: f64 },
}

impl OptimizationAction {
    /// Wire name of the strategy, as recorded in optimization events.
    pub fn strategy(&self) -> &'static str {
        match self {
            OptimizationAction::AdaptiveReconnect { .. } => "adaptive-reconnect",
            OptimizationAction::ReconnectHighLatency { .. } => "reconnect-high-latency",
            OptimizationAction::StabilityBackoff { .. } => "stability-backoff",
            OptimizationAction::ThroughputOptimization { .. } => "throughput-optimization",
        }
    }
}

/// Choose at most one corrective strategy for the given snapshot.
///
/// The decision chain is ordered by severity: nothing can be optimized while
/// disconnected, high latency wins over instability, and congestion relief is
/// the last resort.
pub fn plan(
    quality: &ConnectionQuality,
    thresholds: &LatencyThresholds,
) -> Option<OptimizationAction> {
    if quality.level == QualityLevel::Disconnected {
        return None;
    }
    if quality.latency_ms > thresholds.fair_ms {
        return Some(OptimizationAction::ReconnectHighLatency {
            latency_ms: quality.latency_ms,
        });
    }
    if quality.stability < LOW_STABILITY {
        return Some(OptimizationAction::StabilityBackoff {
            stability: quality.stability,
            delayed: quality.stability < CRITICAL_STABILITY,
        });
    }
    if quality.throughput < LOW_THROUGHPUT {
        return Some(OptimizationAction::ThroughputOptimization {
            throughput: quality.throughput,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(latency_ms: f64, recent_disconnects: usize, throughput: f64) -> ConnectionQuality {
        ConnectionQuality::assess(
            latency_ms,
            recent_disconnects,
            throughput,
            &LatencyThresholds::default(),
        )
    }

    #[test]
    fn nothing_to_optimize_while_disconnected() {
        let quality = ConnectionQuality::disconnected();
        assert_eq!(plan(&quality, &LatencyThresholds::default()), None);
    }

    #[test]
    fn high_latency_forces_reconnect() {
        let quality = snapshot(800.0, 0, 5.0);
        let action = plan(&quality, &LatencyThresholds::default()).unwrap();
        assert_eq!(
            action,
            OptimizationAction::ReconnectHighLatency { latency_ms: 800.0 }
        );
        assert_eq!(action.strategy(), "reconnect-high-latency");
    }

    #[test]
    fn latency_takes_precedence_over_stability() {
        // Both high latency and low stability; latency branch wins.
        let quality = snapshot(800.0, 4, 5.0);
        let action = plan(&quality, &LatencyThresholds::default()).unwrap();
        assert!(matches!(
            action,
            OptimizationAction::ReconnectHighLatency { .. }
        ));
    }

    #[test]
    fn low_stability_backs_off() {
        // 3 disconnects -> stability 40: reconnect now.
        let quality = snapshot(20.0, 3, 5.0);
        let action = plan(&quality, &LatencyThresholds::default()).unwrap();
        assert_eq!(
            action,
            OptimizationAction::StabilityBackoff {
                stability: 40.0,
                delayed: false
            }
        );

        // 4 disconnects -> stability 20: delay behind the cool-down.
        let quality = snapshot(20.0, 4, 5.0);
        let action = plan(&quality, &LatencyThresholds::default()).unwrap();
        assert_eq!(
            action,
            OptimizationAction::StabilityBackoff {
                stability: 20.0,
                delayed: true
            }
        );
        assert_eq!(action.strategy(), "stability-backoff");
    }

    #[test]
    fn starved_throughput_tunes_the_transport() {
        let quality = snapshot(20.0, 0, 0.2);
        let action = plan(&quality, &LatencyThresholds::default()).unwrap();
        assert_eq!(
            action,
            OptimizationAction::ThroughputOptimization { throughput: 0.2 }
        );
        assert_eq!(action.strategy(), "throughput-optimization");
    }

    #[test]
    fn healthy_connection_needs_no_action() {
        let quality = snapshot(20.0, 0, 5.0);
        assert_eq!(plan(&quality, &LatencyThresholds::default()), None);
    }
}
