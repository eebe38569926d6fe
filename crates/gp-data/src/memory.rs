//! In-process collaborator implementations.
//!
//! These back the test suites and the demo service binary. Production
//! deployments replace them with adapters over the fleet database, the MQTT
//! collector's series store and the market connector.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use gp_types::{
    Alert, BaselineState, DataError, GpResult, ParameterSample, PortfolioAsset, PricePoint,
    RiskType, SignalPoint, VppId,
};

use crate::sources::{
    AlertSink, AssetSource, BaselineSource, ConfigStore, HistoricalDataSource, ValuationModel,
    VppRegistry,
};

/// Historical series held in memory, keyed per VPP.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    prices: RwLock<HashMap<VppId, Vec<PricePoint>>>,
    signals: RwLock<HashMap<(VppId, RiskType), Vec<SignalPoint>>>,
}

impl InMemoryDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a price series (newest-first, as sources are contracted to
    /// deliver it).
    pub fn set_price_series(&self, vpp_id: VppId, series: Vec<PricePoint>) {
        self.prices.write().insert(vpp_id, series);
    }

    pub fn set_signal_series(&self, vpp_id: VppId, risk_type: RiskType, series: Vec<SignalPoint>) {
        self.signals.write().insert((vpp_id, risk_type), series);
    }
}

#[async_trait]
impl HistoricalDataSource for InMemoryDataSource {
    async fn price_series(&self, vpp_id: &VppId) -> GpResult<Vec<PricePoint>> {
        self.prices
            .read()
            .get(vpp_id)
            .cloned()
            .ok_or_else(|| {
                DataError::SeriesUnavailable {
                    vpp_id: vpp_id.to_string(),
                    series: "price".to_string(),
                }
                .into()
            })
    }

    async fn signal_series(
        &self,
        vpp_id: &VppId,
        risk_type: RiskType,
    ) -> GpResult<Vec<SignalPoint>> {
        self.signals
            .read()
            .get(&(vpp_id.clone(), risk_type))
            .cloned()
            .ok_or_else(|| {
                DataError::SeriesUnavailable {
                    vpp_id: vpp_id.to_string(),
                    series: risk_type.to_string(),
                }
                .into()
            })
    }
}

/// Portfolio assets held in memory.
#[derive(Debug, Default)]
pub struct InMemoryAssetSource {
    assets: RwLock<HashMap<VppId, Vec<PortfolioAsset>>>,
}

impl InMemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_assets(&self, vpp_id: VppId, assets: Vec<PortfolioAsset>) {
        self.assets.write().insert(vpp_id, assets);
    }
}

#[async_trait]
impl AssetSource for InMemoryAssetSource {
    async fn portfolio_assets(&self, vpp_id: &VppId) -> GpResult<Vec<PortfolioAsset>> {
        self.assets.read().get(vpp_id).cloned().ok_or_else(|| {
            DataError::VppNotFound {
                vpp_id: vpp_id.to_string(),
            }
            .into()
        })
    }
}

/// Baseline snapshots held in memory.
#[derive(Debug, Default)]
pub struct InMemoryBaselineSource {
    baselines: RwLock<HashMap<VppId, BaselineState>>,
}

impl InMemoryBaselineSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_baseline(&self, vpp_id: VppId, baseline: BaselineState) {
        self.baselines.write().insert(vpp_id, baseline);
    }
}

#[async_trait]
impl BaselineSource for InMemoryBaselineSource {
    async fn baseline_state(&self, vpp_id: &VppId) -> GpResult<BaselineState> {
        self.baselines.read().get(vpp_id).cloned().ok_or_else(|| {
            DataError::VppNotFound {
                vpp_id: vpp_id.to_string(),
            }
            .into()
        })
    }
}

/// Model evaluation function: maps a parameter sample to metric values.
pub type ModelFn =
    dyn Fn(&VppId, &ParameterSample, &[String]) -> GpResult<HashMap<String, f64>> + Send + Sync;

/// Valuation model backed by a caller-supplied closure — the usual test
/// double for the external simulation service.
pub struct InMemoryValuationModel {
    model: Arc<ModelFn>,
}

impl InMemoryValuationModel {
    pub fn new<F>(model: F) -> Self
    where
        F: Fn(&VppId, &ParameterSample, &[String]) -> GpResult<HashMap<String, f64>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            model: Arc::new(model),
        }
    }
}

#[async_trait]
impl ValuationModel for InMemoryValuationModel {
    async fn run(
        &self,
        vpp_id: &VppId,
        sample: &ParameterSample,
        output_metrics: &[String],
    ) -> GpResult<HashMap<String, f64>> {
        (self.model)(vpp_id, sample, output_metrics)
    }
}

/// Append-only alert store with an inspection accessor for tests.
#[derive(Debug, Default)]
pub struct InMemoryAlertSink {
    alerts: RwLock<Vec<Alert>>,
}

impl InMemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saved(&self) -> Vec<Alert> {
        self.alerts.read().clone()
    }

    pub fn len(&self) -> usize {
        self.alerts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.read().is_empty()
    }
}

#[async_trait]
impl AlertSink for InMemoryAlertSink {
    async fn save_alert(&self, alert: &Alert) -> GpResult<()> {
        self.alerts.write().push(alert.clone());
        Ok(())
    }
}

/// Config persistence over a plain map.
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    values: RwLock<HashMap<String, serde_json::Value>>,
}

impl InMemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn load(&self, key: &str) -> GpResult<Option<serde_json::Value>> {
        Ok(self.values.read().get(key).cloned())
    }

    async fn save(&self, key: &str, value: serde_json::Value) -> GpResult<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }
}

/// Static VPP registry.
#[derive(Debug, Default)]
pub struct InMemoryVppRegistry {
    vpps: RwLock<Vec<VppId>>,
}

impl InMemoryVppRegistry {
    pub fn new(vpps: Vec<VppId>) -> Self {
        Self {
            vpps: RwLock::new(vpps),
        }
    }

    pub fn add(&self, vpp_id: VppId) {
        self.vpps.write().push(vpp_id);
    }
}

#[async_trait]
impl VppRegistry for InMemoryVppRegistry {
    async fn active_vpps(&self) -> GpResult<Vec<VppId>> {
        Ok(self.vpps.read().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gp_types::GpError;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn data_source_returns_stored_series() {
        let source = InMemoryDataSource::new();
        let vpp = VppId::from("vpp-1");
        source.set_price_series(
            vpp.clone(),
            vec![PricePoint {
                price: dec!(42.5),
                timestamp: Utc::now(),
            }],
        );

        let series = source.price_series(&vpp).await.unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].price, dec!(42.5));
    }

    #[tokio::test]
    async fn missing_series_is_a_data_error() {
        let source = InMemoryDataSource::new();
        let err = source.price_series(&VppId::from("nope")).await.unwrap_err();
        assert!(matches!(err, GpError::Data(_)));
    }

    #[tokio::test]
    async fn alert_sink_appends() {
        use gp_types::{DataQuality, RiskLevel, TrendDirection};

        let sink = InMemoryAlertSink::new();
        let alert = Alert::new(
            VppId::from("vpp-1"),
            RiskType::Credit,
            RiskLevel::High,
            0.75,
            0.7,
            TrendDirection::Stable,
            "credit risk level is high (0.750)".to_string(),
            DataQuality::Full,
        );
        sink.save_alert(&alert).await.unwrap();
        sink.save_alert(&alert).await.unwrap();
        assert_eq!(sink.len(), 2);
    }

    #[tokio::test]
    async fn config_store_roundtrip() {
        let store = InMemoryConfigStore::new();
        assert!(store.load("thresholds").await.unwrap().is_none());

        store
            .save("thresholds", serde_json::json!({ "market": 0.05 }))
            .await
            .unwrap();
        let loaded = store.load("thresholds").await.unwrap().unwrap();
        assert_eq!(loaded["market"], 0.05);
    }

    #[tokio::test]
    async fn valuation_model_evaluates_closure() {
        let model = InMemoryValuationModel::new(|_, sample, metrics| {
            let mut out = HashMap::new();
            for metric in metrics {
                out.insert(metric.clone(), sample.iter().sum::<f64>());
            }
            Ok(out)
        });

        let out = model
            .run(
                &VppId::from("vpp-1"),
                &vec![1.0, 2.0, 3.0],
                &["revenue".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(out["revenue"], 6.0);
    }
}
