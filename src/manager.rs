use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::{ConfigPatch, ConnectionManagerConfig};
use crate::error::ConfigError;
use crate::event::{ConnectionEvent, ConnectionEventKind, EventLog};
use crate::optimize::{
    self, CONGESTION_QUEUE_LIMIT, OPTIMIZATION_SCORE_THRESHOLD, OptimizationAction,
    STABILITY_BACKOFF_COOLDOWN,
};
use crate::quality::{ConnectionQuality, QualityHistory};
use crate::reconnect::ReconnectPolicy;
use crate::transport::{LinkEvent, Transport, TransportStats, TransportTuning};

/// Aggregate statistics exposed to diagnostics consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStats {
    /// Accumulated time spent connected across all sessions.
    pub total_connection_time: Duration,
    /// Number of disconnections observed since the last reset.
    pub disconnection_count: u64,
    /// Mean quality score across the retained history, 0.0 when empty.
    pub average_quality: f64,
    /// Most recent quality snapshot, if any.
    pub current_quality: Option<ConnectionQuality>,
    /// Time since the most recent successful connect, zero while disconnected.
    pub uptime: Duration,
}

/// Mutable manager state. Everything here is touched by both the assessment
/// tick and the transport lifecycle listener, so it lives behind one mutex
/// and each path holds the lock for its full read-modify-append cycle.
#[derive(Debug)]
struct ManagerState {
    config: ConnectionManagerConfig,
    quality_history: QualityHistory,
    events: EventLog,
    connection_attempts: u32,
    disconnection_count: u64,
    total_connection_time: Duration,
    last_connected_at: Option<Instant>,
    message_timestamps: VecDeque<Instant>,
}

impl ManagerState {
    fn new(config: ConnectionManagerConfig) -> Self {
        Self {
            config,
            quality_history: QualityHistory::new(),
            events: EventLog::new(),
            connection_attempts: 0,
            disconnection_count: 0,
            total_connection_time: Duration::ZERO,
            last_connected_at: None,
            message_timestamps: VecDeque::new(),
        }
    }

    /// Clear histories and counters. Configuration survives a reset.
    fn reset(&mut self) {
        self.quality_history.clear();
        self.events.clear();
        self.connection_attempts = 0;
        self.disconnection_count = 0;
        self.total_connection_time = Duration::ZERO;
        self.last_connected_at = None;
        self.message_timestamps.clear();
    }
}

/// Façade that keeps a persistent transport healthy: scores its quality on a
/// fixed cadence, adapts reconnection backoff to the attempt count, and
/// applies corrective strategies when quality degrades.
///
/// One instance per process is expected, constructed and destroyed by
/// application startup/shutdown code. A fresh instance can be built per test.
#[derive(Debug)]
pub struct ConnectionManager {
    transport: Arc<dyn Transport>,
    state: Arc<Mutex<ManagerState>>,
    policy: ReconnectPolicy,
    tick_task: Mutex<Option<JoinHandle<()>>>,
    listener_task: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    /// Create a manager with the default configuration.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, ConnectionManagerConfig::default())
    }

    /// Create a manager with a custom configuration.
    pub fn with_config(transport: Arc<dyn Transport>, config: ConnectionManagerConfig) -> Self {
        Self {
            transport,
            state: Arc::new(Mutex::new(ManagerState::new(config))),
            policy: ReconnectPolicy::new(),
            tick_task: Mutex::new(None),
            listener_task: Mutex::new(None),
        }
    }

    /// Start the lifecycle listener and the assessment tick. Idempotent.
    pub async fn start(&self) {
        self.spawn_listener().await;
        self.restart_tick().await;
    }

    /// Merge a partial configuration update.
    ///
    /// The merged configuration is validated before it is committed. If the
    /// assessment tick is running it is restarted, so a new cadence takes
    /// effect on the very next tick.
    pub async fn configure(&self, patch: ConfigPatch) -> Result<(), ConfigError> {
        {
            let mut state = self.state.lock().await;
            let mut merged = state.config.clone();
            patch.apply(&mut merged);
            merged.validate()?;
            state.config = merged;
        }
        let running = self.tick_task.lock().await.is_some();
        if running {
            self.restart_tick().await;
        }
        Ok(())
    }

    /// Most recent quality snapshot, or `None` before the first assessment.
    pub async fn current_quality(&self) -> Option<ConnectionQuality> {
        self.state.lock().await.quality_history.latest().cloned()
    }

    /// The most recent `limit` quality snapshots, newest last.
    pub async fn quality_history(&self, limit: usize) -> Vec<ConnectionQuality> {
        self.state.lock().await.quality_history.recent(limit)
    }

    /// The most recent `limit` lifecycle and optimization events, newest last.
    pub async fn connection_events(&self, limit: usize) -> Vec<ConnectionEvent> {
        self.state.lock().await.events.recent(limit)
    }

    /// Aggregate connection statistics.
    pub async fn connection_stats(&self) -> ConnectionStats {
        let state = self.state.lock().await;
        let uptime = match (self.transport.is_connected(), state.last_connected_at) {
            (true, Some(connected_at)) => connected_at.elapsed(),
            _ => Duration::ZERO,
        };
        ConnectionStats {
            total_connection_time: state.total_connection_time,
            disconnection_count: state.disconnection_count,
            average_quality: state.quality_history.average_score(),
            current_quality: state.quality_history.latest().cloned(),
            uptime,
        }
    }

    /// Run the optimization controller out-of-band against the latest
    /// snapshot. A no-op before the first assessment.
    pub async fn force_optimization(&self) {
        let mut state = self.state.lock().await;
        let Some(snapshot) = state.quality_history.latest().cloned() else {
            return;
        };
        Self::apply_optimization(&self.transport, &mut state, &snapshot).await;
    }

    /// Record an observed inbound message for throughput accounting.
    pub async fn record_message(&self) {
        self.state
            .lock()
            .await
            .message_timestamps
            .push_back(Instant::now());
    }

    /// Clear all histories and counters without touching the connection.
    pub async fn reset_stats(&self) {
        self.state.lock().await.reset();
    }

    /// Stop the assessment tick and lifecycle listener, then reset stats.
    ///
    /// No further ticks fire after this returns. Safe to call without a prior
    /// [`start`](Self::start), and safe to call more than once.
    pub async fn destroy(&self) {
        Self::stop_task(&self.tick_task).await;
        Self::stop_task(&self.listener_task).await;
        self.reset_stats().await;
    }

    async fn stop_task(slot: &Mutex<Option<JoinHandle<()>>>) {
        let task = slot.lock().await.take();
        if let Some(task) = task {
            task.abort();
            // Wait the abort out so no tick can still be mid-cycle.
            let _ = task.await;
        }
    }

    async fn spawn_listener(&self) {
        let mut slot = self.listener_task.lock().await;
        if slot.is_some() {
            return;
        }
        let mut events = self.transport.subscribe();
        let transport = Arc::clone(&self.transport);
        let state = Arc::clone(&self.state);
        let policy = self.policy;
        *slot = Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                Self::handle_link_event(&transport, &state, policy, event).await;
            }
        }));
    }

    /// (Re)start the assessment tick with the currently configured cadence.
    async fn restart_tick(&self) {
        Self::stop_task(&self.tick_task).await;
        let interval = self.state.lock().await.config.quality_check_interval;
        let transport = Arc::clone(&self.transport);
        let state = Arc::clone(&self.state);
        let mut slot = self.tick_task.lock().await;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // interval() fires immediately; consume that so the first
            // assessment lands one full cadence after start.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                Self::assess(&transport, &state).await;
            }
        }));
    }

    /// Handle one transport lifecycle notification. Serialized against the
    /// assessment tick through the state mutex.
    async fn handle_link_event(
        transport: &Arc<dyn Transport>,
        state: &Arc<Mutex<ManagerState>>,
        policy: ReconnectPolicy,
        event: LinkEvent,
    ) {
        let mut state = state.lock().await;
        match event {
            LinkEvent::Connected => {
                info!("transport connected after {} attempts", state.connection_attempts);
                state.connection_attempts = 0;
                state.last_connected_at = Some(Instant::now());
                state.events.record(ConnectionEventKind::Connect);
            }
            LinkEvent::Disconnected { reason } => {
                Self::record_disconnect(&mut state, reason);
            }
            LinkEvent::Error { message } => {
                // Errors are not surfaced to callers; they are connectivity
                // signals and get folded into the disconnect bookkeeping.
                warn!("transport error: {message}");
                Self::record_disconnect(&mut state, "error".to_string());
            }
            LinkEvent::Reconnecting => {
                state.connection_attempts += 1;
                let attempt = state.connection_attempts;
                state.events.record(ConnectionEventKind::Reconnect { attempt });
                if state.config.adaptive_reconnect {
                    let interval = policy.next_interval(attempt);
                    debug!("adaptive reconnect: attempt {attempt}, waiting {interval:?}");
                    state.events.record(ConnectionEventKind::Optimization(
                        OptimizationAction::AdaptiveReconnect { interval, attempt },
                    ));
                    if let Err(e) = transport
                        .configure(TransportTuning::retry_interval(interval))
                        .await
                    {
                        warn!("retry interval update rejected: {e}");
                    }
                }
            }
        }
    }

    fn record_disconnect(state: &mut ManagerState, reason: String) {
        info!("transport disconnected: {reason}");
        state.disconnection_count += 1;
        if let Some(connected_at) = state.last_connected_at.take() {
            state.total_connection_time += connected_at.elapsed();
        }
        state.events.record(ConnectionEventKind::Disconnect { reason });
    }

    /// One assessment tick: read the transport, build a snapshot, append it
    /// to history, and auto-optimize when quality has fallen too far.
    async fn assess(transport: &Arc<dyn Transport>, state: &Arc<Mutex<ManagerState>>) {
        let connected = transport.is_connected();
        let stats = if connected {
            transport.stats().await
        } else {
            TransportStats::default()
        };

        let mut state = state.lock().await;
        let snapshot = if connected {
            let latency_ms = stats
                .latency
                .map(|rtt| rtt.as_secs_f64() * 1000.0)
                .unwrap_or(0.0);
            let recent_disconnects = state.events.disconnects_within(state.config.stability_window);
            let throughput = Self::update_throughput(&mut state);
            ConnectionQuality::assess(
                latency_ms,
                recent_disconnects,
                throughput,
                &state.config.latency_thresholds,
            )
        } else {
            ConnectionQuality::disconnected()
        };

        if let Some(previous) = state.quality_history.latest().map(|q| q.level) {
            if previous != snapshot.level {
                debug!("quality level {previous} -> {}", snapshot.level);
                state.events.record(ConnectionEventKind::QualityChange {
                    from: previous,
                    to: snapshot.level,
                    score: snapshot.score,
                });
            }
        }
        state.quality_history.push(snapshot.clone());

        if state.config.auto_optimize && snapshot.score < OPTIMIZATION_SCORE_THRESHOLD {
            Self::apply_optimization(transport, &mut state, &snapshot).await;
        }
    }

    /// Prune the trailing message window, record this tick, and compute the
    /// message rate over the throughput window.
    fn update_throughput(state: &mut ManagerState) -> f64 {
        let window = state.config.throughput_window;
        let now = Instant::now();
        while let Some(oldest) = state.message_timestamps.front() {
            if now.duration_since(*oldest) > window {
                state.message_timestamps.pop_front();
            } else {
                break;
            }
        }
        state.message_timestamps.push_back(now);
        state.message_timestamps.len() as f64 / window.as_secs_f64()
    }

    /// Choose and apply at most one corrective strategy for the snapshot.
    /// Every application is recorded, even when the same condition persists
    /// across invocations.
    async fn apply_optimization(
        transport: &Arc<dyn Transport>,
        state: &mut ManagerState,
        snapshot: &ConnectionQuality,
    ) {
        let Some(action) = optimize::plan(snapshot, &state.config.latency_thresholds) else {
            return;
        };
        info!("applying optimization strategy: {}", action.strategy());
        state
            .events
            .record(ConnectionEventKind::Optimization(action.clone()));

        match action {
            OptimizationAction::ReconnectHighLatency { .. } => {
                if let Err(e) = transport.reconnect().await {
                    warn!("forced reconnect rejected: {e}");
                }
            }
            OptimizationAction::StabilityBackoff { delayed: true, .. } => {
                // Flapping link: reconnecting immediately would thrash, so
                // park the reconnect behind the cool-down.
                let transport = Arc::clone(transport);
                tokio::spawn(async move {
                    tokio::time::sleep(STABILITY_BACKOFF_COOLDOWN).await;
                    if let Err(e) = transport.reconnect().await {
                        warn!("delayed reconnect rejected: {e}");
                    }
                });
            }
            OptimizationAction::StabilityBackoff { delayed: false, .. } => {
                if let Err(e) = transport.reconnect().await {
                    warn!("stability reconnect rejected: {e}");
                }
            }
            OptimizationAction::ThroughputOptimization { .. } => {
                let tuning = TransportTuning::congestion_relief(CONGESTION_QUEUE_LIMIT);
                if let Err(e) = transport.configure(tuning).await {
                    warn!("congestion tuning rejected: {e}");
                }
            }
            // Issued from the reconnecting path, never planned here.
            OptimizationAction::AdaptiveReconnect { .. } => {}
        }
    }
}
