use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::LatencyThresholds;

/// Maximum number of quality snapshots retained in history.
pub const QUALITY_HISTORY_CAPACITY: usize = 100;

/// Sentinel latency recorded when the connection is down and the round-trip
/// time cannot be measured.
pub const UNMEASURABLE_LATENCY: f64 = -1.0;

/// Derived quality classification for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    Disconnected,
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityLevel::Excellent => write!(f, "excellent"),
            QualityLevel::Good => write!(f, "good"),
            QualityLevel::Fair => write!(f, "fair"),
            QualityLevel::Poor => write!(f, "poor"),
            QualityLevel::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// One immutable quality snapshot, produced per assessment tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionQuality {
    /// Derived classification; never set independently of the metrics.
    pub level: QualityLevel,
    /// Round-trip latency in milliseconds; [`UNMEASURABLE_LATENCY`] iff disconnected.
    pub latency_ms: f64,
    /// Stability score 0-100, reduced by recent disconnections.
    pub stability: f64,
    /// Messages observed per second over the trailing throughput window.
    pub throughput: f64,
    /// Weighted composite 0-100, rounded to the nearest integer.
    pub score: f64,
    /// When this snapshot was taken.
    pub assessed_at: DateTime<Utc>,
}

impl ConnectionQuality {
    /// Snapshot for a transport that reports no connection.
    pub fn disconnected() -> Self {
        Self {
            level: QualityLevel::Disconnected,
            latency_ms: UNMEASURABLE_LATENCY,
            stability: 0.0,
            throughput: 0.0,
            score: 0.0,
            assessed_at: Utc::now(),
        }
    }

    /// Assess quality from current metrics.
    ///
    /// `recent_disconnects` is the number of disconnect events within the
    /// stability window; each one costs 20 stability points, floored at 0.
    pub fn assess(
        latency_ms: f64,
        recent_disconnects: usize,
        throughput: f64,
        thresholds: &LatencyThresholds,
    ) -> Self {
        let stability = (100.0 - 20.0 * recent_disconnects as f64).max(0.0);
        Self {
            level: classify(latency_ms, stability, thresholds),
            latency_ms,
            stability,
            throughput,
            score: composite_score(latency_ms, stability, throughput),
            assessed_at: Utc::now(),
        }
    }
}

/// Classify latency and stability into a quality level. First matching rule
/// wins, evaluated strictest first.
fn classify(latency_ms: f64, stability: f64, thresholds: &LatencyThresholds) -> QualityLevel {
    if latency_ms < thresholds.excellent_ms && stability > 90.0 {
        QualityLevel::Excellent
    } else if latency_ms < thresholds.good_ms && stability > 70.0 {
        QualityLevel::Good
    } else if latency_ms < thresholds.fair_ms && stability > 50.0 {
        QualityLevel::Fair
    } else {
        QualityLevel::Poor
    }
}

/// Weighted composite: latency 40%, stability 40%, throughput 20%.
fn composite_score(latency_ms: f64, stability: f64, throughput: f64) -> f64 {
    let latency_score = (100.0 - latency_ms / 10.0).max(0.0);
    let throughput_score = (throughput * 10.0).min(100.0);
    (latency_score * 0.4 + stability * 0.4 + throughput_score * 0.2).round()
}

/// Capacity-bounded, append-only history of quality snapshots.
#[derive(Debug, Clone, Default)]
pub struct QualityHistory {
    entries: VecDeque<ConnectionQuality>,
}

impl QualityHistory {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::with_capacity(QUALITY_HISTORY_CAPACITY),
        }
    }

    /// Append a snapshot, evicting the oldest entry beyond capacity.
    pub fn push(&mut self, quality: ConnectionQuality) {
        if self.entries.len() == QUALITY_HISTORY_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(quality);
    }

    /// Most recent snapshot, if any.
    pub fn latest(&self) -> Option<&ConnectionQuality> {
        self.entries.back()
    }

    /// The most recent `limit` snapshots, oldest first.
    pub fn recent(&self, limit: usize) -> Vec<ConnectionQuality> {
        let skip = self.entries.len().saturating_sub(limit);
        self.entries.iter().skip(skip).cloned().collect()
    }

    /// Mean score across the whole history, 0.0 when empty.
    pub fn average_score(&self) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.entries.iter().map(|q| q.score).sum::<f64>() / self.entries.len() as f64
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disconnected_snapshot_fields() {
        let quality = ConnectionQuality::disconnected();
        assert_eq!(quality.level, QualityLevel::Disconnected);
        assert_eq!(quality.latency_ms, UNMEASURABLE_LATENCY);
        assert_eq!(quality.stability, 0.0);
        assert_eq!(quality.throughput, 0.0);
        assert_eq!(quality.score, 0.0);
    }

    #[test]
    fn low_latency_no_disconnects_is_excellent() {
        let thresholds = LatencyThresholds::default();
        let quality = ConnectionQuality::assess(30.0, 0, 2.0, &thresholds);
        assert_eq!(quality.level, QualityLevel::Excellent);
        assert_eq!(quality.stability, 100.0);
        // (100 - 3) * 0.4 + 100 * 0.4 + 20 * 0.2 = 82.8
        assert_eq!(quality.score, 83.0);
    }

    #[test]
    fn high_latency_is_poor_despite_stability() {
        let thresholds = LatencyThresholds::default();
        let quality = ConnectionQuality::assess(800.0, 0, 5.0, &thresholds);
        assert_eq!(quality.level, QualityLevel::Poor);
        // (100 - 80) * 0.4 + 100 * 0.4 + 50 * 0.2 = 58
        assert_eq!(quality.score, 58.0);
    }

    #[test]
    fn latency_score_floors_at_zero() {
        let thresholds = LatencyThresholds::default();
        let quality = ConnectionQuality::assess(2000.0, 0, 0.0, &thresholds);
        // 0 * 0.4 + 100 * 0.4 + 0 * 0.2 = 40
        assert_eq!(quality.score, 40.0);
    }

    #[test]
    fn disconnects_erode_stability() {
        let thresholds = LatencyThresholds::default();
        for (disconnects, expected) in [(0, 100.0), (1, 80.0), (2, 60.0), (5, 0.0), (8, 0.0)] {
            let quality = ConnectionQuality::assess(20.0, disconnects, 0.0, &thresholds);
            assert_eq!(quality.stability, expected);
        }
    }

    #[test]
    fn classification_order_is_strictest_first() {
        let thresholds = LatencyThresholds::default();
        // Low latency but shaky: one disconnect drops stability to 80,
        // failing the excellent rule but passing good.
        let quality = ConnectionQuality::assess(20.0, 1, 0.0, &thresholds);
        assert_eq!(quality.level, QualityLevel::Good);

        // Two disconnects (stability 60) only qualify as fair.
        let quality = ConnectionQuality::assess(20.0, 2, 0.0, &thresholds);
        assert_eq!(quality.level, QualityLevel::Fair);

        // Three disconnects (stability 40) fail every rule.
        let quality = ConnectionQuality::assess(20.0, 3, 0.0, &thresholds);
        assert_eq!(quality.level, QualityLevel::Poor);
    }

    #[test]
    fn score_stays_within_bounds() {
        let thresholds = LatencyThresholds::default();
        for latency in [0.0, 10.0, 500.0, 5000.0] {
            for disconnects in [0, 3, 10] {
                for throughput in [0.0, 0.5, 50.0] {
                    let q = ConnectionQuality::assess(latency, disconnects, throughput, &thresholds);
                    assert!((0.0..=100.0).contains(&q.score), "score {} out of range", q.score);
                    assert!((0.0..=100.0).contains(&q.stability));
                    assert!(q.latency_ms >= 0.0);
                }
            }
        }
    }

    #[test]
    fn throughput_score_caps_at_100() {
        let thresholds = LatencyThresholds::default();
        // throughput 50 msg/s would score 500 uncapped; capped contribution is 20.
        let quality = ConnectionQuality::assess(0.0, 0, 50.0, &thresholds);
        assert_eq!(quality.score, 100.0);
    }

    #[test]
    fn history_evicts_oldest_beyond_capacity() {
        let thresholds = LatencyThresholds::default();
        let mut history = QualityHistory::new();
        for i in 0..150 {
            let mut quality = ConnectionQuality::assess(i as f64, 0, 0.0, &thresholds);
            quality.throughput = i as f64; // marker
            history.push(quality);
        }
        assert_eq!(history.len(), QUALITY_HISTORY_CAPACITY);
        // Oldest 50 were dropped; the front marker is 50, the back is 149.
        assert_eq!(history.recent(1000).first().unwrap().throughput, 50.0);
        assert_eq!(history.latest().unwrap().throughput, 149.0);
    }

    #[test]
    fn recent_returns_newest_last() {
        let thresholds = LatencyThresholds::default();
        let mut history = QualityHistory::new();
        for i in 0..10 {
            history.push(ConnectionQuality::assess(i as f64, 0, 0.0, &thresholds));
        }
        let recent = history.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].latency_ms, 7.0);
        assert_eq!(recent[2].latency_ms, 9.0);
    }

    #[test]
    fn average_score_of_empty_history_is_zero() {
        let history = QualityHistory::new();
        assert_eq!(history.average_score(), 0.0);
        assert!(history.latest().is_none());
    }
}
