//! The analytics engine facade.
//!
//! [`AnalyticsEngine`] owns the analysis caches and the monitoring
//! scheduler, wires every component to its collaborators, and exposes the
//! on-demand entry points (optimize / analyze / stress). On-demand calls are
//! reentrant; results are cached per (VPP, parameter fingerprint) for the
//! configured TTL, and racing recomputations for the same key settle
//! last-write-wins.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Receiver;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use gp_analysis::{ParameterSpace, SensitivityAnalyzer, SensitivityRequest};
use gp_data::{
    fingerprint, AlertSink, AssetSource, BaselineSource, CacheKey, CacheStats, ConfigStore,
    HistoricalDataSource, TtlCache, ValuationModel, VppRegistry,
};
use gp_portfolio::{OptimizationRequest, PortfolioOptimizer};
use gp_risk::{AlertDispatcher, RiskAssessor, RiskMetricCalculator};
use gp_stress::{ScenarioLibrary, StressTestEngine};
use gp_types::{
    Alert, GpResult, OptimizationMethod, OptimizationResult, PortfolioAsset, RiskReport,
    SensitivityReport, StressScenario, StressTestResult, VppId,
};

use crate::config::EngineConfig;
use crate::events::{EngineEvent, EventBus};
use crate::scheduler::{EvaluationPipeline, MonitorState, RiskMonitoringScheduler};

/// How often the alert pump drains the dispatcher channel into the bus.
const ALERT_PUMP_PERIOD: Duration = Duration::from_millis(25);

/// Handles to every external system the engine reads or writes.
pub struct EngineCollaborators {
    pub data: Arc<dyn HistoricalDataSource>,
    pub assets: Arc<dyn AssetSource>,
    pub baselines: Arc<dyn BaselineSource>,
    pub model: Arc<dyn ValuationModel>,
    pub alerts: Arc<dyn AlertSink>,
    pub config_store: Arc<dyn ConfigStore>,
    pub registry: Arc<dyn VppRegistry>,
}

/// Hit/miss counters for each engine-owned cache.
#[derive(Debug, Clone)]
pub struct EngineCacheStats {
    pub risk_reports: CacheStats,
    pub optimizations: CacheStats,
    pub sensitivities: CacheStats,
    pub stress_results: CacheStats,
}

pub struct AnalyticsEngine {
    config: EngineConfig,
    events: Arc<EventBus>,
    scheduler: RiskMonitoringScheduler,
    optimizer: PortfolioOptimizer,
    analyzer: SensitivityAnalyzer,
    stress: StressTestEngine,
    assets: Arc<dyn AssetSource>,
    registry: Arc<dyn VppRegistry>,
    config_store: Arc<dyn ConfigStore>,
    alert_rx: Receiver<Alert>,
    risk_reports: Arc<TtlCache<RiskReport>>,
    optimizations: TtlCache<OptimizationResult>,
    sensitivities: TtlCache<SensitivityReport>,
    stress_results: TtlCache<StressTestResult>,
    pump_shutdown: Option<watch::Sender<bool>>,
    pump_handle: Option<JoinHandle<()>>,
    running: bool,
}

impl AnalyticsEngine {
    pub fn new(config: EngineConfig, collaborators: EngineCollaborators) -> Self {
        let ttl = chrono::Duration::seconds(config.cache_ttl_secs);
        let (alert_tx, alert_rx) = crossbeam_channel::unbounded();

        let pipeline = Arc::new(EvaluationPipeline::new(
            RiskMetricCalculator::new(collaborators.data.clone()),
            RiskAssessor::new(config.level_ratios),
            AlertDispatcher::new(
                AlertDispatcher::default_rules(&config.thresholds),
                collaborators.alerts.clone(),
                alert_tx,
            ),
            config.thresholds.clone(),
            config.trend_epsilon,
        ));
        let risk_reports = Arc::new(TtlCache::with_ttl(ttl));
        let scheduler = RiskMonitoringScheduler::new(
            Duration::from_secs(config.monitor_interval_secs),
            collaborators.registry.clone(),
            pipeline,
            risk_reports.clone(),
        );

        Self {
            optimizer: PortfolioOptimizer::new(config.optimizer),
            analyzer: SensitivityAnalyzer::new(collaborators.model.clone()),
            stress: StressTestEngine::new(
                collaborators.baselines.clone(),
                ScenarioLibrary::default(),
            ),
            assets: collaborators.assets,
            registry: collaborators.registry,
            config_store: collaborators.config_store,
            alert_rx,
            risk_reports,
            optimizations: TtlCache::with_ttl(ttl),
            sensitivities: TtlCache::with_ttl(ttl),
            stress_results: TtlCache::with_ttl(ttl),
            events: Arc::new(EventBus::new()),
            scheduler,
            config,
            pump_shutdown: None,
            pump_handle: None,
            running: false,
        }
    }

    /// Construct from the configuration persisted in the config store.
    pub async fn with_stored_config(collaborators: EngineCollaborators) -> GpResult<Self> {
        let config = EngineConfig::load_or_default(&*collaborators.config_store).await?;
        Ok(Self::new(config, collaborators))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Register an event subscriber (lifecycle events and risk alerts).
    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn monitor_state(&self) -> MonitorState {
        self.scheduler.state()
    }

    /// Start the monitoring loop and the alert fan-out.
    pub async fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;

        self.start_alert_pump();
        self.scheduler.start();

        let vpp_count = self
            .registry
            .active_vpps()
            .await
            .map(|v| v.len())
            .unwrap_or(0);
        self.events
            .publish(EngineEvent::ServiceInitialized { vpp_count });
        info!(vpps = vpp_count, "analytics engine initialized");
    }

    /// Stop cleanly: the in-flight monitoring tick finishes, remaining
    /// alerts are drained to subscribers, then the stop event is published.
    pub async fn stop(&mut self, reason: &str) {
        if !self.running {
            return;
        }
        self.scheduler.stop().await;

        if let Some(shutdown) = self.pump_shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(handle) = self.pump_handle.take() {
            let _ = handle.await;
        }

        self.events.publish(EngineEvent::ServiceStopped {
            reason: reason.to_string(),
        });
        self.running = false;
        info!(reason = %reason, "analytics engine stopped");
    }

    /// Run one monitoring cycle immediately (outside the periodic loop).
    pub async fn evaluate_now(&self) {
        self.scheduler.run_tick_now().await;
    }

    /// The most recent risk report for a VPP, if one is cached and fresh.
    pub fn latest_risk_report(&self, vpp_id: &VppId) -> Option<RiskReport> {
        self.risk_reports
            .get(&CacheKey::new(vpp_id.as_str(), "risk-report"))
    }

    /// Optimize capital allocation for one VPP. Identical requests within
    /// the cache TTL are served from cache.
    pub async fn optimize(
        &self,
        vpp_id: &VppId,
        request: &OptimizationRequest,
    ) -> GpResult<OptimizationResult> {
        let key = CacheKey::new(
            vpp_id.as_str(),
            format!("optimize:{}", fingerprint(request)),
        );
        if let Some(cached) = self.optimizations.get(&key) {
            debug!(vpp = %vpp_id, "optimization served from cache");
            return Ok(cached);
        }
        let result = self.optimizer.optimize(request)?;
        self.optimizations.put(key, result.clone());
        Ok(result)
    }

    /// Request builder using the engine's configured default method.
    pub fn request_with_defaults(
        &self,
        assets: Vec<PortfolioAsset>,
        expected_returns: Vec<f64>,
        risk_matrix: Vec<Vec<f64>>,
    ) -> OptimizationRequest {
        OptimizationRequest::new(
            self.config.default_method,
            assets,
            expected_returns,
            risk_matrix,
        )
    }

    /// Explicit-method variant of [`Self::request_with_defaults`].
    pub fn request_for_method(
        &self,
        method: OptimizationMethod,
        assets: Vec<PortfolioAsset>,
        expected_returns: Vec<f64>,
        risk_matrix: Vec<Vec<f64>>,
    ) -> OptimizationRequest {
        OptimizationRequest::new(method, assets, expected_returns, risk_matrix)
    }

    /// Current portfolio assets for a VPP, straight from the collaborator.
    pub async fn portfolio_assets(&self, vpp_id: &VppId) -> GpResult<Vec<PortfolioAsset>> {
        self.assets.portfolio_assets(vpp_id).await
    }

    /// Sensitivity request builder carrying the engine's configured
    /// confidence level.
    pub fn sensitivity_request(
        &self,
        space: ParameterSpace,
        output_metrics: Vec<String>,
    ) -> SensitivityRequest {
        let mut request = SensitivityRequest::new(space, output_metrics);
        request.confidence_level = self.config.confidence_level;
        request
    }

    /// Run (or serve from cache) a sensitivity analysis for one VPP.
    pub async fn analyze_sensitivity(
        &self,
        vpp_id: &VppId,
        request: &SensitivityRequest,
    ) -> GpResult<SensitivityReport> {
        let key = CacheKey::new(
            vpp_id.as_str(),
            format!("sensitivity:{}", fingerprint(request)),
        );
        if let Some(cached) = self.sensitivities.get(&key) {
            debug!(vpp = %vpp_id, "sensitivity report served from cache");
            return Ok(cached);
        }
        let report = self.analyzer.analyze(vpp_id, request).await?;
        self.sensitivities.put(key, report.clone());
        Ok(report)
    }

    /// Run (or serve from cache) a stress scenario for one VPP.
    pub async fn run_stress_scenario(
        &self,
        vpp_id: &VppId,
        scenario: &StressScenario,
    ) -> GpResult<StressTestResult> {
        let key = CacheKey::new(vpp_id.as_str(), format!("stress:{}", fingerprint(scenario)));
        if let Some(cached) = self.stress_results.get(&key) {
            debug!(vpp = %vpp_id, "stress result served from cache");
            return Ok(cached);
        }
        let result = self.stress.run_scenario(vpp_id, scenario).await?;
        self.stress_results.put(key, result.clone());
        Ok(result)
    }

    /// The stress engine's scenario library (defaults and shock profiles).
    pub fn scenario_library(&self) -> &ScenarioLibrary {
        self.stress.library()
    }

    /// Persist the engine's current configuration.
    pub async fn persist_config(&self) -> GpResult<()> {
        self.config.persist(&*self.config_store).await
    }

    pub fn cache_stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            risk_reports: self.risk_reports.stats(),
            optimizations: self.optimizations.stats(),
            sensitivities: self.sensitivities.stats(),
            stress_results: self.stress_results.stats(),
        }
    }

    /// Forward dispatched alerts from the pipeline channel to event-bus
    /// subscribers until shutdown.
    fn start_alert_pump(&mut self) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let alerts = self.alert_rx.clone();
        let bus = self.events.clone();

        let handle = tokio::spawn(async move {
            loop {
                for alert in alerts.try_iter() {
                    bus.publish(EngineEvent::RiskAlert(alert));
                }
                tokio::select! {
                    _ = tokio::time::sleep(ALERT_PUMP_PERIOD) => {}
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            for alert in alerts.try_iter() {
                                bus.publish(EngineEvent::RiskAlert(alert));
                            }
                            break;
                        }
                    }
                }
            }
        });

        self.pump_shutdown = Some(shutdown_tx);
        self.pump_handle = Some(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gp_data::{
        InMemoryAlertSink, InMemoryAssetSource, InMemoryBaselineSource, InMemoryConfigStore,
        InMemoryDataSource, InMemoryValuationModel, InMemoryVppRegistry,
    };
    use gp_types::{BaselineState, RiskType, ScenarioKind, SignalPoint};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn demo_collaborators(vpp: &VppId) -> (EngineCollaborators, Arc<InMemoryAlertSink>) {
        let data = Arc::new(InMemoryDataSource::new());
        // Hot credit exposure so monitoring cycles emit alerts.
        data.set_signal_series(
            vpp.clone(),
            RiskType::Credit,
            vec![SignalPoint {
                value: 0.95,
                timestamp: Utc::now(),
            }],
        );

        let assets = Arc::new(InMemoryAssetSource::new());
        assets.set_assets(
            vpp.clone(),
            vec![
                PortfolioAsset::new("solar-farm", 0.09),
                PortfolioAsset::new("battery-storage", 0.05),
            ],
        );

        let baselines = Arc::new(InMemoryBaselineSource::new());
        baselines.set_baseline(
            vpp.clone(),
            BaselineState {
                revenue: dec!(1_000_000),
                profit: dec!(180_000),
                risk_score: 0.25,
                liquidity: dec!(400_000),
            },
        );

        let model = Arc::new(InMemoryValuationModel::new(|_, sample, metrics| {
            let mut out = HashMap::new();
            for metric in metrics {
                out.insert(metric.clone(), 5.0 * sample[0] + sample[1]);
            }
            Ok(out)
        }));

        let sink = Arc::new(InMemoryAlertSink::new());
        let collaborators = EngineCollaborators {
            data,
            assets,
            baselines,
            model,
            alerts: sink.clone(),
            config_store: Arc::new(InMemoryConfigStore::new()),
            registry: Arc::new(InMemoryVppRegistry::new(vec![vpp.clone()])),
        };
        (collaborators, sink)
    }

    fn engine_for(vpp: &VppId) -> (AnalyticsEngine, Arc<InMemoryAlertSink>) {
        let (collaborators, sink) = demo_collaborators(vpp);
        (AnalyticsEngine::new(EngineConfig::default(), collaborators), sink)
    }

    #[tokio::test]
    async fn lifecycle_events_and_alert_fanout() {
        let vpp = VppId::from("vpp-1");
        let (mut engine, sink) = engine_for(&vpp);
        let events = engine.subscribe();

        engine.start().await;
        assert!(matches!(
            events.try_recv().unwrap(),
            EngineEvent::ServiceInitialized { vpp_count: 1 }
        ));

        engine.evaluate_now().await;
        assert!(engine.latest_risk_report(&vpp).is_some());
        assert!(sink.len() >= 1);

        engine.stop("test over").await;
        // The pump's final drain runs before the stop event, so collect
        // everything and check ordering at the tail.
        let remaining: Vec<EngineEvent> = events.try_iter().collect();
        assert!(remaining
            .iter()
            .any(|e| matches!(e, EngineEvent::RiskAlert(_))));
        assert!(matches!(
            remaining.last().unwrap(),
            EngineEvent::ServiceStopped { .. }
        ));
        assert_eq!(engine.monitor_state(), MonitorState::Idle);
    }

    #[tokio::test]
    async fn optimizations_are_cached_by_fingerprint() {
        let vpp = VppId::from("vpp-1");
        let (engine, _sink) = engine_for(&vpp);

        let assets = engine.portfolio_assets(&vpp).await.unwrap();
        let request = engine.request_with_defaults(
            assets,
            vec![0.09, 0.05],
            vec![vec![0.04, 0.01], vec![0.01, 0.02]],
        );

        let first = engine.optimize(&vpp, &request).await.unwrap();
        let second = engine.optimize(&vpp, &request).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.cache_stats().optimizations.hits, 1);

        // A different method is a different fingerprint.
        let other = engine.request_for_method(
            gp_types::OptimizationMethod::RiskParity,
            engine.portfolio_assets(&vpp).await.unwrap(),
            vec![0.09, 0.05],
            vec![vec![0.04, 0.01], vec![0.01, 0.02]],
        );
        engine.optimize(&vpp, &other).await.unwrap();
        assert_eq!(engine.cache_stats().optimizations.stores, 2);
    }

    #[tokio::test]
    async fn sensitivity_reports_are_cached() {
        let vpp = VppId::from("vpp-1");
        let (engine, _sink) = engine_for(&vpp);

        let space = ParameterSpace::new()
            .add_uniform("price_volatility", 0.0, 1.0)
            .add_uniform("demand", 0.0, 1.0);
        let request = engine
            .sensitivity_request(space, vec!["revenue".to_string()])
            .with_sample_size(16);

        let first = engine.analyze_sensitivity(&vpp, &request).await.unwrap();
        assert_eq!(first.confidence_level, 0.95);
        // Unseeded runs vary, so a repeat must come from cache to be equal.
        let second = engine.analyze_sensitivity(&vpp, &request).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.cache_stats().sensitivities.hits, 1);
    }

    #[tokio::test]
    async fn stress_results_are_cached_and_snapshot_based() {
        let vpp = VppId::from("vpp-1");
        let (engine, _sink) = engine_for(&vpp);

        let scenario = engine
            .scenario_library()
            .default_scenario(ScenarioKind::MarketCrash, 120);
        let first = engine.run_stress_scenario(&vpp, &scenario).await.unwrap();
        let second = engine.run_stress_scenario(&vpp, &scenario).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(engine.cache_stats().stress_results.hits, 1);
        assert_eq!(first.baseline.revenue, dec!(1_000_000));
    }

    #[tokio::test]
    async fn stored_config_drives_the_engine() {
        let vpp = VppId::from("vpp-1");
        let (collaborators, _sink) = demo_collaborators(&vpp);

        let mut stored = EngineConfig::default();
        stored.monitor_interval_secs = 60;
        stored.persist(&*collaborators.config_store).await.unwrap();

        let engine = AnalyticsEngine::with_stored_config(collaborators)
            .await
            .unwrap();
        assert_eq!(engine.config().monitor_interval_secs, 60);
    }
}
