//! Engine configuration: monitoring cadence, thresholds, level ratios and
//! numerical defaults, persisted through the [`ConfigStore`] collaborator.

use serde::{Deserialize, Serialize};

use gp_data::ConfigStore;
use gp_portfolio::OptimizerConfig;
use gp_types::{GpResult, LevelRatios, OptimizationMethod, RiskThresholds};

/// Key under which the engine persists its configuration.
pub const CONFIG_KEY: &str = "risk-engine";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Monitoring loop interval in seconds.
    pub monitor_interval_secs: u64,
    pub thresholds: RiskThresholds,
    pub level_ratios: LevelRatios,
    /// Minimum score change between cycles treated as a trend move.
    pub trend_epsilon: f64,
    /// Validity window for cached analysis results, in seconds.
    pub cache_ttl_secs: i64,
    pub optimizer: OptimizerConfig,
    /// Method used when an optimization call does not name one.
    pub default_method: OptimizationMethod,
    /// Confidence level reported on sensitivity analyses.
    pub confidence_level: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            monitor_interval_secs: 300,
            thresholds: RiskThresholds::default(),
            level_ratios: LevelRatios::default(),
            trend_epsilon: 0.01,
            cache_ttl_secs: 300,
            optimizer: OptimizerConfig::default(),
            default_method: OptimizationMethod::MeanVariance,
            confidence_level: 0.95,
        }
    }
}

impl EngineConfig {
    /// Load the stored configuration, falling back to defaults when nothing
    /// has been persisted yet.
    pub async fn load_or_default(store: &dyn ConfigStore) -> GpResult<Self> {
        match store.load(CONFIG_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Self::default()),
        }
    }

    pub async fn persist(&self, store: &dyn ConfigStore) -> GpResult<()> {
        store.save(CONFIG_KEY, serde_json::to_value(self)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gp_data::InMemoryConfigStore;
    use gp_types::RiskType;

    #[tokio::test]
    async fn missing_config_falls_back_to_defaults() {
        let store = InMemoryConfigStore::new();
        let config = EngineConfig::load_or_default(&store).await.unwrap();
        assert_eq!(config.monitor_interval_secs, 300);
        assert_eq!(config.default_method, OptimizationMethod::MeanVariance);
    }

    #[tokio::test]
    async fn config_roundtrips_through_the_store() {
        let store = InMemoryConfigStore::new();
        let mut config = EngineConfig::default();
        config.monitor_interval_secs = 60;
        config.thresholds.set(RiskType::Market, 0.08);
        config.persist(&store).await.unwrap();

        let loaded = EngineConfig::load_or_default(&store).await.unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.thresholds.get(RiskType::Market), 0.08);
    }
}
