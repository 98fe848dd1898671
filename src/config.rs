use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Latency boundaries (milliseconds) for quality level classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyThresholds {
    /// Upper bound for the `excellent` level.
    pub excellent_ms: f64,
    /// Upper bound for the `good` level.
    pub good_ms: f64,
    /// Upper bound for the `fair` level; anything above classifies as `poor`.
    pub fair_ms: f64,
}

impl Default for LatencyThresholds {
    fn default() -> Self {
        Self {
            excellent_ms: 50.0,
            good_ms: 150.0,
            fair_ms: 300.0,
        }
    }
}

/// Configuration for a [`ConnectionManager`](crate::manager::ConnectionManager).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionManagerConfig {
    /// Cadence of the quality assessment tick.
    pub quality_check_interval: Duration,
    /// Latency boundaries for level classification.
    pub latency_thresholds: LatencyThresholds,
    /// Trailing window over which recent disconnects reduce stability.
    pub stability_window: Duration,
    /// Trailing window over which message rate is computed.
    pub throughput_window: Duration,
    /// Run the optimization controller automatically when quality drops.
    pub auto_optimize: bool,
    /// Vary the reconnection backoff by attempt count.
    pub adaptive_reconnect: bool,
}

impl Default for ConnectionManagerConfig {
    fn default() -> Self {
        Self {
            quality_check_interval: Duration::from_secs(5),
            latency_thresholds: LatencyThresholds::default(),
            stability_window: Duration::from_secs(60),
            throughput_window: Duration::from_secs(10),
            auto_optimize: true,
            adaptive_reconnect: true,
        }
    }
}

impl ConnectionManagerConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quality_check_interval.is_zero() {
            return Err(ConfigError::ZeroInterval {
                field: "quality_check_interval",
            });
        }
        if self.stability_window.is_zero() {
            return Err(ConfigError::ZeroInterval {
                field: "stability_window",
            });
        }
        if self.throughput_window.is_zero() {
            return Err(ConfigError::ZeroInterval {
                field: "throughput_window",
            });
        }
        let t = &self.latency_thresholds;
        if t.excellent_ms > t.good_ms || t.good_ms > t.fair_ms {
            return Err(ConfigError::UnorderedThresholds);
        }
        Ok(())
    }
}

/// Partial configuration update.
///
/// Unset fields leave the current value untouched, so callers can adjust a
/// single knob without restating the whole configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatch {
    pub quality_check_interval: Option<Duration>,
    pub latency_thresholds: Option<LatencyThresholds>,
    pub stability_window: Option<Duration>,
    pub throughput_window: Option<Duration>,
    pub auto_optimize: Option<bool>,
    pub adaptive_reconnect: Option<bool>,
}

impl ConfigPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quality_check_interval(mut self, interval: Duration) -> Self {
        self.quality_check_interval = Some(interval);
        self
    }

    pub fn latency_thresholds(mut self, thresholds: LatencyThresholds) -> Self {
        self.latency_thresholds = Some(thresholds);
        self
    }

    pub fn stability_window(mut self, window: Duration) -> Self {
        self.stability_window = Some(window);
        self
    }

    pub fn throughput_window(mut self, window: Duration) -> Self {
        self.throughput_window = Some(window);
        self
    }

    pub fn auto_optimize(mut self, enabled: bool) -> Self {
        self.auto_optimize = Some(enabled);
        self
    }

    pub fn adaptive_reconnect(mut self, enabled: bool) -> Self {
        self.adaptive_reconnect = Some(enabled);
        self
    }

    /// Merge the set fields of this patch into `config`.
    pub fn apply(&self, config: &mut ConnectionManagerConfig) {
        if let Some(interval) = self.quality_check_interval {
            config.quality_check_interval = interval;
        }
        if let Some(ref thresholds) = self.latency_thresholds {
            config.latency_thresholds = thresholds.clone();
        }
        if let Some(window) = self.stability_window {
            config.stability_window = window;
        }
        if let Some(window) = self.throughput_window {
            config.throughput_window = window;
        }
        if let Some(enabled) = self.auto_optimize {
            config.auto_optimize = enabled;
        }
        if let Some(enabled) = self.adaptive_reconnect {
            config.adaptive_reconnect = enabled;
        }
    }
}
