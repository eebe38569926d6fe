//! Collaborator interfaces consumed by the analytics core.
//!
//! The core never assumes the internal shape of these systems — it only
//! reads data through them and appends alerts/config. No wire protocol is
//! fixed here; implementations may be in-process, database-backed, or remote.

use async_trait::async_trait;
use std::collections::HashMap;

use gp_types::{
    Alert, BaselineState, GpResult, ParameterSample, PortfolioAsset, PricePoint, RiskType,
    SignalPoint, VppId,
};

/// Historical series source: prices for market risk, category signals for
/// everything else. Price series are newest-first.
#[async_trait]
pub trait HistoricalDataSource: Send + Sync {
    async fn price_series(&self, vpp_id: &VppId) -> GpResult<Vec<PricePoint>>;

    async fn signal_series(
        &self,
        vpp_id: &VppId,
        risk_type: RiskType,
    ) -> GpResult<Vec<SignalPoint>>;
}

/// Source of a VPP's portfolio assets. Weights on returned assets are
/// advisory only; the optimizer assigns them.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn portfolio_assets(&self, vpp_id: &VppId) -> GpResult<Vec<PortfolioAsset>>;
}

/// Source of the financial/operational baseline snapshot used by stress
/// testing.
#[async_trait]
pub trait BaselineSource: Send + Sync {
    async fn baseline_state(&self, vpp_id: &VppId) -> GpResult<BaselineState>;
}

/// Valuation/simulation model evaluated once per parameter sample. Used
/// exclusively by the sensitivity analyzer.
#[async_trait]
pub trait ValuationModel: Send + Sync {
    async fn run(
        &self,
        vpp_id: &VppId,
        sample: &ParameterSample,
        output_metrics: &[String],
    ) -> GpResult<HashMap<String, f64>>;
}

/// Append-only persistence for emitted alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn save_alert(&self, alert: &Alert) -> GpResult<()>;
}

/// Persistence for threshold and method defaults, keyed by name.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self, key: &str) -> GpResult<Option<serde_json::Value>>;

    async fn save(&self, key: &str, value: serde_json::Value) -> GpResult<()>;
}

/// Enumeration of VPPs the monitoring loop should evaluate.
#[async_trait]
pub trait VppRegistry: Send + Sync {
    async fn active_vpps(&self) -> GpResult<Vec<VppId>>;
}
