//! Risk metric computation.
//!
//! [`RiskMetricCalculator`] turns historical series from the data
//! collaborator into per-category [`RiskMetric`]s. Market risk uses
//! historical simulation over the price series; the other categories
//! collapse their signal series through the pure scorers in
//! [`crate::scorers`]. The calculator itself performs no side effects and
//! never fails outright: missing or degraded data produces zero-valued
//! metrics flagged [`DataQuality::Degraded`] so the monitoring loop keeps
//! running.

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use statrs::statistics::Statistics;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use gp_data::HistoricalDataSource;
use gp_types::{DataQuality, PricePoint, RiskMetric, RiskMetricValues, RiskType, VppId};

/// Computes per-risk-type metrics for one VPP.
pub struct RiskMetricCalculator {
    source: Arc<dyn HistoricalDataSource>,
}

impl RiskMetricCalculator {
    /// Minimum number of price points for a market metric; shorter series
    /// degrade to a zero-valued metric rather than failing.
    pub const MIN_SERIES_LEN: usize = 30;

    /// Confidence level used for VaR/CVaR.
    pub const CONFIDENCE: f64 = 0.95;

    pub fn new(source: Arc<dyn HistoricalDataSource>) -> Self {
        Self { source }
    }

    /// Compute metrics for the requested risk types. Pure with respect to
    /// the fetched input snapshots: identical series produce identical
    /// metric values.
    pub async fn calculate(
        &self,
        vpp_id: &VppId,
        risk_types: &[RiskType],
    ) -> HashMap<RiskType, RiskMetric> {
        let mut metrics = HashMap::with_capacity(risk_types.len());
        for &risk_type in risk_types {
            let metric = match risk_type {
                RiskType::Market => self.market_metric(vpp_id).await,
                other => self.score_metric(vpp_id, other).await,
            };
            metrics.insert(risk_type, metric);
        }
        metrics
    }

    /// Historical-simulation market metric from the newest-first price
    /// series.
    async fn market_metric(&self, vpp_id: &VppId) -> RiskMetric {
        let series = match self.source.price_series(vpp_id).await {
            Ok(series) => series,
            Err(e) => {
                warn!(vpp = %vpp_id, error = %e, "price series unavailable, degrading market metric");
                return RiskMetric::degraded(RiskType::Market);
            }
        };

        if series.len() < Self::MIN_SERIES_LEN {
            debug!(
                vpp = %vpp_id,
                points = series.len(),
                required = Self::MIN_SERIES_LEN,
                "insufficient price history, degrading market metric"
            );
            return RiskMetric::degraded(RiskType::Market);
        }

        let returns = period_returns(&series);
        if returns.is_empty() {
            return RiskMetric::degraded(RiskType::Market);
        }

        let (var, cvar) = var_cvar(&returns, Self::CONFIDENCE);
        let volatility = returns.as_slice().std_dev();

        RiskMetric {
            risk_type: RiskType::Market,
            values: RiskMetricValues::Market {
                var,
                cvar,
                volatility,
            },
            data_quality: DataQuality::Full,
            computed_at: Utc::now(),
        }
    }

    /// Category score metric from the risk type's signal series.
    async fn score_metric(&self, vpp_id: &VppId, risk_type: RiskType) -> RiskMetric {
        let series = match self.source.signal_series(vpp_id, risk_type).await {
            Ok(series) => series,
            Err(e) => {
                warn!(vpp = %vpp_id, risk = %risk_type, error = %e, "signal series unavailable, degrading metric");
                return RiskMetric::degraded(risk_type);
            }
        };

        if series.is_empty() {
            return RiskMetric::degraded(risk_type);
        }

        let score = crate::scorers::score(risk_type, &series);
        RiskMetric {
            risk_type,
            values: RiskMetricValues::Score { score },
            data_quality: DataQuality::Full,
            computed_at: Utc::now(),
        }
    }
}

/// Simple period returns `r_i = (p_newer - p_older) / p_older` over a
/// newest-first series. Non-finite prices and zero denominators are skipped.
fn period_returns(series: &[PricePoint]) -> Vec<f64> {
    series
        .windows(2)
        .filter_map(|pair| {
            let newer = pair[0].price.to_f64()?;
            let older = pair[1].price.to_f64()?;
            if older == 0.0 {
                None
            } else {
                Some((newer - older) / older)
            }
        })
        .collect()
}

/// Historical VaR and CVaR at the given confidence, both as absolute values.
/// VaR is the return at the `floor(n * (1 - confidence))` index of the
/// ascending-sorted returns; CVaR averages the tail at or below it.
fn var_cvar(returns: &[f64], confidence: f64) -> (f64, f64) {
    let mut sorted = returns.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let idx = ((1.0 - confidence) * sorted.len() as f64).floor() as usize;
    let idx = idx.min(sorted.len() - 1);

    let var = sorted[idx].abs();
    let tail = &sorted[..=idx];
    let cvar = (tail.iter().sum::<f64>() / tail.len() as f64).abs();

    (var, cvar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use gp_data::InMemoryDataSource;
    use gp_types::SignalPoint;
    use rust_decimal::Decimal;

    /// Newest-first price series that declined over time, step sizes cycling
    /// through the given fractions (oldest price is 100).
    fn declining_series(len: usize, steps: &[f64]) -> Vec<PricePoint> {
        let base = Utc::now();
        let mut price = 100.0;
        let mut oldest_first = vec![price];
        for i in 0..len - 1 {
            price *= 1.0 - steps[i % steps.len()];
            oldest_first.push(price);
        }
        oldest_first
            .into_iter()
            .enumerate()
            .map(|(i, p)| PricePoint {
                price: Decimal::from_f64_retain(p).unwrap_or_default(),
                timestamp: base - Duration::days((len - 1 - i) as i64),
            })
            .rev()
            .collect()
    }

    fn source_with_prices(vpp: &VppId, series: Vec<PricePoint>) -> Arc<InMemoryDataSource> {
        let source = Arc::new(InMemoryDataSource::new());
        source.set_price_series(vpp.clone(), series);
        source
    }

    #[tokio::test]
    async fn declining_series_yields_expected_var_band() {
        let vpp = VppId::from("vpp-1");
        // 30 points, drops between 2% and 6% per period.
        let series = declining_series(30, &[0.02, 0.03, 0.04, 0.05, 0.06]);
        let calc = RiskMetricCalculator::new(source_with_prices(&vpp, series));

        let metrics = calc.calculate(&vpp, &[RiskType::Market]).await;
        let metric = &metrics[&RiskType::Market];
        assert_eq!(metric.data_quality, DataQuality::Full);

        match metric.values {
            RiskMetricValues::Market {
                var,
                cvar,
                volatility,
            } => {
                assert!((0.045..=0.065).contains(&var), "var = {var}");
                assert!(cvar >= var - 1e-12, "cvar {cvar} < var {var}");
                assert!(volatility > 0.0);
            }
            _ => panic!("expected market values"),
        }
    }

    #[tokio::test]
    async fn cvar_dominates_var_for_mixed_series() {
        let vpp = VppId::from("vpp-1");
        let series = declining_series(40, &[0.05, 0.01, 0.002, 0.03, 0.006, 0.045]);
        let calc = RiskMetricCalculator::new(source_with_prices(&vpp, series));

        let metrics = calc.calculate(&vpp, &[RiskType::Market]).await;
        match metrics[&RiskType::Market].values {
            RiskMetricValues::Market { var, cvar, .. } => {
                assert!(cvar >= var - 1e-12);
            }
            _ => panic!("expected market values"),
        }
    }

    #[tokio::test]
    async fn short_series_degrades_to_zero() {
        let vpp = VppId::from("vpp-1");
        let series = declining_series(10, &[0.05]);
        let calc = RiskMetricCalculator::new(source_with_prices(&vpp, series));

        let metrics = calc.calculate(&vpp, &[RiskType::Market]).await;
        let metric = &metrics[&RiskType::Market];
        assert_eq!(metric.data_quality, DataQuality::Degraded);
        assert_eq!(metric.composite_score(), 0.0);
    }

    #[tokio::test]
    async fn unavailable_source_degrades_instead_of_failing() {
        let vpp = VppId::from("vpp-1");
        let calc = RiskMetricCalculator::new(Arc::new(InMemoryDataSource::new()));

        let metrics = calc
            .calculate(&vpp, &[RiskType::Market, RiskType::Credit])
            .await;
        assert_eq!(metrics.len(), 2);
        for metric in metrics.values() {
            assert_eq!(metric.data_quality, DataQuality::Degraded);
        }
    }

    #[tokio::test]
    async fn identical_inputs_produce_identical_values() {
        let vpp = VppId::from("vpp-1");
        let series = declining_series(35, &[0.02, 0.05, 0.01]);
        let calc = RiskMetricCalculator::new(source_with_prices(&vpp, series));

        let first = calc.calculate(&vpp, &[RiskType::Market]).await;
        let second = calc.calculate(&vpp, &[RiskType::Market]).await;
        assert_eq!(
            first[&RiskType::Market].values,
            second[&RiskType::Market].values
        );
    }

    #[tokio::test]
    async fn signal_series_feeds_category_scorer() {
        let vpp = VppId::from("vpp-1");
        let source = Arc::new(InMemoryDataSource::new());
        source.set_signal_series(
            vpp.clone(),
            RiskType::Credit,
            vec![SignalPoint {
                value: 0.8,
                timestamp: Utc::now(),
            }],
        );
        let calc = RiskMetricCalculator::new(source);

        let metrics = calc.calculate(&vpp, &[RiskType::Credit]).await;
        let metric = &metrics[&RiskType::Credit];
        assert_eq!(metric.data_quality, DataQuality::Full);
        let score = metric.composite_score();
        assert!((0.0..=1.0).contains(&score));
        assert!(score > 0.0);
    }

    #[test]
    fn var_index_arithmetic() {
        // 20 returns: idx = floor(20 * 0.05) = 1.
        let mut returns: Vec<f64> = (0..20).map(|i| -0.01 * (i as f64 + 1.0)).collect();
        returns.reverse();
        let (var, cvar) = var_cvar(&returns, 0.95);
        // Ascending sort puts -0.20 first, -0.19 at idx 1.
        assert!((var - 0.19).abs() < 1e-12);
        assert!((cvar - 0.195).abs() < 1e-12);
    }
}
