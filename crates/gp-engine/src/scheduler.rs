//! The periodic risk monitoring loop.
//!
//! [`RiskMonitoringScheduler`] ticks on a fixed interval; each tick
//! enumerates active VPPs and fans their evaluation out on a
//! [`tokio::task::JoinSet`] — per-VPP risk computation touches disjoint data,
//! so ordering between VPPs within a tick is not guaranteed. A failure
//! evaluating one VPP is logged and never aborts its siblings. Stopping is
//! clean: the in-flight tick finishes before the loop task exits.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

use gp_data::{CacheKey, TtlCache, VppRegistry};
use gp_risk::{AlertDispatcher, RiskAssessor, RiskMetricCalculator};
use gp_types::{GpResult, RiskReport, RiskThresholds, RiskType, TrendDirection, VppId};

/// Scheduler state machine: `Idle → Scanning → Evaluating → Alerting → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Idle,
    Scanning,
    Evaluating,
    Alerting,
}

/// One VPP's evaluation chain: metrics → assessment → alert dispatch, plus
/// the cross-cycle trend bookkeeping.
pub struct EvaluationPipeline {
    calculator: RiskMetricCalculator,
    assessor: RiskAssessor,
    dispatcher: AlertDispatcher,
    thresholds: RiskThresholds,
    trend_epsilon: f64,
    previous_scores: RwLock<HashMap<VppId, HashMap<RiskType, f64>>>,
}

impl EvaluationPipeline {
    pub fn new(
        calculator: RiskMetricCalculator,
        assessor: RiskAssessor,
        dispatcher: AlertDispatcher,
        thresholds: RiskThresholds,
        trend_epsilon: f64,
    ) -> Self {
        Self {
            calculator,
            assessor,
            dispatcher,
            thresholds,
            trend_epsilon,
            previous_scores: RwLock::new(HashMap::new()),
        }
    }

    /// Run the full chain for one VPP and return its risk report.
    pub async fn evaluate(&self, vpp_id: &VppId) -> GpResult<RiskReport> {
        let metrics = self.calculator.calculate(vpp_id, &RiskType::ALL).await;
        let assessments = self.assessor.assess(&metrics, &self.thresholds);
        let trends = self.update_trends(vpp_id, &assessments);
        self.dispatcher.dispatch(vpp_id, &assessments, &trends).await;

        Ok(RiskReport {
            vpp_id: vpp_id.clone(),
            assessments,
            generated_at: Utc::now(),
        })
    }

    /// Compare this cycle's scores against the previous cycle's and record
    /// the new ones.
    fn update_trends(
        &self,
        vpp_id: &VppId,
        assessments: &HashMap<RiskType, gp_types::RiskAssessment>,
    ) -> HashMap<RiskType, TrendDirection> {
        let mut all_previous = self.previous_scores.write();
        let previous = all_previous.entry(vpp_id.clone()).or_default();

        let mut trends = HashMap::with_capacity(assessments.len());
        for (&risk_type, assessment) in assessments {
            let trend = match previous.get(&risk_type) {
                Some(&prior) if assessment.score > prior + self.trend_epsilon => {
                    TrendDirection::Rising
                }
                Some(&prior) if assessment.score < prior - self.trend_epsilon => {
                    TrendDirection::Falling
                }
                Some(_) => TrendDirection::Stable,
                None => TrendDirection::Stable,
            };
            previous.insert(risk_type, assessment.score);
            trends.insert(risk_type, trend);
        }
        trends
    }
}

/// The periodic background loop.
pub struct RiskMonitoringScheduler {
    interval: Duration,
    registry: Arc<dyn VppRegistry>,
    pipeline: Arc<EvaluationPipeline>,
    reports: Arc<TtlCache<RiskReport>>,
    state: Arc<RwLock<MonitorState>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl RiskMonitoringScheduler {
    pub fn new(
        interval: Duration,
        registry: Arc<dyn VppRegistry>,
        pipeline: Arc<EvaluationPipeline>,
        reports: Arc<TtlCache<RiskReport>>,
    ) -> Self {
        Self {
            interval,
            registry,
            pipeline,
            reports,
            state: Arc::new(RwLock::new(MonitorState::Idle)),
            shutdown_tx: None,
            handle: None,
        }
    }

    pub fn state(&self) -> MonitorState {
        *self.state.read()
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Spawn the periodic loop. Idempotent while running.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let interval = self.interval;
        let registry = self.registry.clone();
        let pipeline = self.pipeline.clone();
        let reports = self.reports.clone();
        let state = self.state.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        run_tick(&registry, &pipeline, &reports, &state).await;
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            *state.write() = MonitorState::Idle;
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.handle = Some(handle);
        info!(interval_secs = self.interval.as_secs_f64(), "risk monitoring started");
    }

    /// Signal shutdown and wait for the loop task; an in-flight tick runs to
    /// completion first.
    pub async fn stop(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "monitoring loop task failed on shutdown");
            }
        }
        *self.state.write() = MonitorState::Idle;
        info!("risk monitoring stopped");
    }

    /// Run a single evaluation cycle immediately, outside the periodic loop.
    pub async fn run_tick_now(&self) {
        run_tick(&self.registry, &self.pipeline, &self.reports, &self.state).await;
    }
}

/// One full cycle over every active VPP.
async fn run_tick(
    registry: &Arc<dyn VppRegistry>,
    pipeline: &Arc<EvaluationPipeline>,
    reports: &Arc<TtlCache<RiskReport>>,
    state: &Arc<RwLock<MonitorState>>,
) {
    *state.write() = MonitorState::Scanning;
    let vpps = match registry.active_vpps().await {
        Ok(vpps) => vpps,
        Err(e) => {
            error!(error = %e, "failed to enumerate active VPPs, skipping tick");
            *state.write() = MonitorState::Idle;
            return;
        }
    };
    debug!(vpps = vpps.len(), "evaluating fleet risk");

    *state.write() = MonitorState::Evaluating;
    let mut tasks = JoinSet::new();
    for vpp_id in vpps {
        let pipeline = pipeline.clone();
        let reports = reports.clone();
        tasks.spawn(async move {
            match pipeline.evaluate(&vpp_id).await {
                Ok(report) => {
                    reports.put(CacheKey::new(vpp_id.as_str(), "risk-report"), report);
                }
                Err(e) => {
                    // Fault isolation per entity: log and move on.
                    error!(vpp = %vpp_id, error = %e, "VPP evaluation failed");
                }
            }
        });
    }

    *state.write() = MonitorState::Alerting;
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!(error = %e, "VPP evaluation task panicked");
        }
    }
    *state.write() = MonitorState::Idle;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crossbeam_channel::unbounded;
    use gp_data::{
        AlertSink, InMemoryAlertSink, InMemoryDataSource, InMemoryVppRegistry,
    };
    use gp_types::{DataError, RiskLevel, SignalPoint};

    fn signal(value: f64) -> Vec<SignalPoint> {
        vec![SignalPoint {
            value,
            timestamp: Utc::now(),
        }]
    }

    fn pipeline_with(
        data: Arc<InMemoryDataSource>,
        sink: Arc<InMemoryAlertSink>,
    ) -> Arc<EvaluationPipeline> {
        let (alert_tx, _alert_rx) = unbounded();
        let thresholds = RiskThresholds::default();
        Arc::new(EvaluationPipeline::new(
            RiskMetricCalculator::new(data),
            RiskAssessor::default(),
            AlertDispatcher::new(
                AlertDispatcher::default_rules(&thresholds),
                sink,
                alert_tx,
            ),
            thresholds,
            0.01,
        ))
    }

    #[tokio::test]
    async fn evaluate_covers_every_risk_type() {
        let data = Arc::new(InMemoryDataSource::new());
        let sink = Arc::new(InMemoryAlertSink::new());
        let pipeline = pipeline_with(data, sink);

        let report = pipeline.evaluate(&VppId::from("vpp-1")).await.unwrap();
        assert_eq!(report.assessments.len(), RiskType::ALL.len());
        // No data anywhere: everything degrades to Low, nothing alerts.
        assert_eq!(report.worst_level(), Some(RiskLevel::Low));
    }

    #[tokio::test]
    async fn rising_scores_are_reported_as_rising_trends() {
        let data = Arc::new(InMemoryDataSource::new());
        let sink = Arc::new(InMemoryAlertSink::new());
        let vpp = VppId::from("vpp-1");

        // Credit exposure high enough to alert (threshold 0.70).
        data.set_signal_series(vpp.clone(), RiskType::Credit, signal(0.75));
        let pipeline = pipeline_with(data.clone(), sink.clone());

        pipeline.evaluate(&vpp).await.unwrap();
        let first: Vec<_> = sink.saved();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].trend, TrendDirection::Stable);

        // Exposure worsens: the next cycle's alert carries a rising trend.
        data.set_signal_series(vpp.clone(), RiskType::Credit, signal(0.95));
        pipeline.evaluate(&vpp).await.unwrap();
        let second = sink.saved();
        assert_eq!(second.len(), 2);
        assert_eq!(second[1].trend, TrendDirection::Rising);
    }

    #[tokio::test]
    async fn tick_evaluates_every_registered_vpp() {
        let data = Arc::new(InMemoryDataSource::new());
        let sink = Arc::new(InMemoryAlertSink::new());
        let registry = Arc::new(InMemoryVppRegistry::new(vec![
            VppId::from("vpp-1"),
            VppId::from("vpp-2"),
        ]));
        let reports = Arc::new(TtlCache::new());
        let scheduler = RiskMonitoringScheduler::new(
            Duration::from_secs(300),
            registry,
            pipeline_with(data, sink),
            reports.clone(),
        );

        scheduler.run_tick_now().await;
        assert_eq!(scheduler.state(), MonitorState::Idle);
        for vpp in ["vpp-1", "vpp-2"] {
            assert!(
                reports.get(&CacheKey::new(vpp, "risk-report")).is_some(),
                "missing report for {vpp}"
            );
        }
    }

    struct FailingRegistry;

    #[async_trait]
    impl VppRegistry for FailingRegistry {
        async fn active_vpps(&self) -> GpResult<Vec<VppId>> {
            Err(DataError::SourceUnavailable {
                source_name: "fleet-db".to_string(),
            }
            .into())
        }
    }

    #[tokio::test]
    async fn registry_failure_skips_the_tick_without_panicking() {
        let data = Arc::new(InMemoryDataSource::new());
        let sink = Arc::new(InMemoryAlertSink::new());
        let reports = Arc::new(TtlCache::new());
        let scheduler = RiskMonitoringScheduler::new(
            Duration::from_secs(300),
            Arc::new(FailingRegistry),
            pipeline_with(data, sink),
            reports.clone(),
        );

        scheduler.run_tick_now().await;
        assert_eq!(scheduler.state(), MonitorState::Idle);
        assert!(reports.is_empty());
    }

    /// A sink that always fails: persistence trouble must not abort sibling
    /// evaluations.
    struct FailingSink;

    #[async_trait]
    impl AlertSink for FailingSink {
        async fn save_alert(&self, _alert: &gp_types::Alert) -> GpResult<()> {
            Err(DataError::Storage {
                message: "disk full".to_string(),
            }
            .into())
        }
    }

    #[tokio::test]
    async fn sink_failure_does_not_stop_the_fleet() {
        let data = Arc::new(InMemoryDataSource::new());
        let vpp_hot = VppId::from("vpp-hot");
        data.set_signal_series(vpp_hot.clone(), RiskType::Credit, signal(0.95));

        let (alert_tx, _alert_rx) = unbounded();
        let thresholds = RiskThresholds::default();
        let pipeline = Arc::new(EvaluationPipeline::new(
            RiskMetricCalculator::new(data),
            RiskAssessor::default(),
            AlertDispatcher::new(
                AlertDispatcher::default_rules(&thresholds),
                Arc::new(FailingSink),
                alert_tx,
            ),
            thresholds,
            0.01,
        ));
        let registry = Arc::new(InMemoryVppRegistry::new(vec![
            vpp_hot,
            VppId::from("vpp-cold"),
        ]));
        let reports = Arc::new(TtlCache::new());
        let scheduler = RiskMonitoringScheduler::new(
            Duration::from_secs(300),
            registry,
            pipeline,
            reports.clone(),
        );

        scheduler.run_tick_now().await;
        assert_eq!(reports.len(), 2);
    }

    #[tokio::test]
    async fn periodic_loop_starts_and_stops_cleanly() {
        let data = Arc::new(InMemoryDataSource::new());
        let sink = Arc::new(InMemoryAlertSink::new());
        let registry = Arc::new(InMemoryVppRegistry::new(vec![VppId::from("vpp-1")]));
        let reports = Arc::new(TtlCache::new());
        let mut scheduler = RiskMonitoringScheduler::new(
            Duration::from_millis(10),
            registry,
            pipeline_with(data, sink),
            reports.clone(),
        );

        assert!(!scheduler.is_running());
        scheduler.start();
        assert!(scheduler.is_running());

        // Let at least the immediate first tick land.
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(reports.get(&CacheKey::new("vpp-1", "risk-report")).is_some());

        scheduler.stop().await;
        assert!(!scheduler.is_running());
        assert_eq!(scheduler.state(), MonitorState::Idle);
    }
}
