//! The stress-test engine.
//!
//! A scenario run fetches a fresh baseline snapshot, derives a stressed
//! snapshot from it and computes relative impact deltas. The baseline is
//! never mutated, so multiple scenarios for one VPP are independent: each
//! starts from the same immutable baseline, never from a previously stressed
//! state.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use gp_data::BaselineSource;
use gp_types::{
    BaselineState, GpResult, ImpactSeverity, StressError, StressImpact, StressScenario,
    StressTestResult, VppId,
};

use crate::scenarios::ScenarioLibrary;

/// Applies severity-parameterized shocks to baseline snapshots.
pub struct StressTestEngine {
    source: Arc<dyn BaselineSource>,
    library: ScenarioLibrary,
}

impl StressTestEngine {
    pub fn new(source: Arc<dyn BaselineSource>, library: ScenarioLibrary) -> Self {
        Self { source, library }
    }

    pub fn library(&self) -> &ScenarioLibrary {
        &self.library
    }

    /// Run one scenario against a freshly fetched baseline snapshot.
    pub async fn run_scenario(
        &self,
        vpp_id: &VppId,
        scenario: &StressScenario,
    ) -> GpResult<StressTestResult> {
        let baseline =
            self.source
                .baseline_state(vpp_id)
                .await
                .map_err(|_| StressError::BaselineUnavailable {
                    vpp_id: vpp_id.to_string(),
                })?;

        let result = self.apply(vpp_id, scenario, &baseline);
        info!(
            vpp = %vpp_id,
            scenario = %scenario.kind,
            severity = scenario.severity,
            assessment = ?result.severity_assessment,
            recovery_days = result.recovery_time_days,
            "stress scenario evaluated"
        );
        Ok(result)
    }

    /// Pure shock application against a caller-held baseline. Derives a new
    /// stressed state; the input snapshot is left untouched.
    pub fn apply(
        &self,
        vpp_id: &VppId,
        scenario: &StressScenario,
        baseline: &BaselineState,
    ) -> StressTestResult {
        let spec = self.library.spec(scenario.kind);
        let severity = scenario.severity;

        let stressed = BaselineState {
            revenue: shock(baseline.revenue, spec.shocks.revenue * severity),
            profit: shock(baseline.profit, spec.shocks.profit * severity),
            risk_score: (baseline.risk_score + spec.shocks.risk * severity).clamp(0.0, 1.0),
            liquidity: shock(baseline.liquidity, spec.shocks.liquidity * severity),
        };

        let impact = StressImpact {
            revenue_pct: relative_delta(baseline.revenue, stressed.revenue),
            profit_pct: relative_delta(baseline.profit, stressed.profit),
            liquidity_pct: relative_delta(baseline.liquidity, stressed.liquidity),
            risk_delta: stressed.risk_score - baseline.risk_score,
        };

        let severity_assessment = assess_impact(impact.worst_pct());
        let recovery_time_days = (spec.base_recovery_days as f64 * severity).ceil() as u32;

        StressTestResult {
            vpp_id: vpp_id.clone(),
            scenario: scenario.clone(),
            baseline: baseline.clone(),
            stressed,
            impact,
            severity_assessment,
            recovery_time_days,
            recovery_within_horizon: recovery_time_days <= scenario.time_horizon_days,
            tested_at: Utc::now(),
        }
    }
}

/// Apply a fractional shock to a monetary value.
fn shock(value: Decimal, pct: f64) -> Decimal {
    value * Decimal::from_f64_retain(1.0 + pct).unwrap_or(Decimal::ONE)
}

/// Relative delta `(stressed − baseline) / baseline`; a zero baseline yields
/// zero impact rather than dividing by zero.
fn relative_delta(baseline: Decimal, stressed: Decimal) -> Decimal {
    if baseline == Decimal::ZERO {
        Decimal::ZERO
    } else {
        (stressed - baseline) / baseline
    }
}

/// Fixed cut points on the worst relative impact magnitude.
fn assess_impact(worst_pct: Decimal) -> ImpactSeverity {
    if worst_pct < Decimal::new(5, 2) {
        ImpactSeverity::Low
    } else if worst_pct < Decimal::new(15, 2) {
        ImpactSeverity::Medium
    } else if worst_pct < Decimal::new(30, 2) {
        ImpactSeverity::High
    } else {
        ImpactSeverity::Severe
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gp_data::InMemoryBaselineSource;
    use gp_types::{GpError, ScenarioKind};
    use rust_decimal_macros::dec;

    fn baseline() -> BaselineState {
        BaselineState {
            revenue: dec!(1_000_000),
            profit: dec!(200_000),
            risk_score: 0.30,
            liquidity: dec!(500_000),
        }
    }

    fn engine_with_baseline(vpp: &VppId) -> StressTestEngine {
        let source = Arc::new(InMemoryBaselineSource::new());
        source.set_baseline(vpp.clone(), baseline());
        StressTestEngine::new(source, ScenarioLibrary::default())
    }

    #[tokio::test]
    async fn market_crash_hits_every_dimension() {
        let vpp = VppId::from("vpp-1");
        let engine = engine_with_baseline(&vpp);
        let scenario = StressScenario::new(ScenarioKind::MarketCrash, 0.8, 120);

        let result = engine.run_scenario(&vpp, &scenario).await.unwrap();
        assert!(result.stressed.revenue < result.baseline.revenue);
        assert!(result.stressed.profit < result.baseline.profit);
        assert!(result.stressed.liquidity < result.baseline.liquidity);
        assert!(result.stressed.risk_score > result.baseline.risk_score);

        // Full-severity revenue shock is -40%, at 0.8 severity: -32%.
        assert!((result.impact.revenue_pct - dec!(-0.32)).abs() < dec!(0.0000001));
        assert!((result.impact.risk_delta - 0.28).abs() < 1e-9);
        assert_eq!(result.severity_assessment, ImpactSeverity::Severe);
        assert_eq!(result.recovery_time_days, 72);
        assert!(result.recovery_within_horizon);
    }

    #[tokio::test]
    async fn zero_severity_is_a_no_op() {
        let vpp = VppId::from("vpp-1");
        let engine = engine_with_baseline(&vpp);
        let scenario = StressScenario::new(ScenarioKind::CyberAttack, 0.0, 30);

        let result = engine.run_scenario(&vpp, &scenario).await.unwrap();
        assert_eq!(result.stressed, result.baseline);
        assert_eq!(result.impact.revenue_pct, Decimal::ZERO);
        assert_eq!(result.impact.profit_pct, Decimal::ZERO);
        assert_eq!(result.impact.liquidity_pct, Decimal::ZERO);
        assert_eq!(result.impact.risk_delta, 0.0);
        assert_eq!(result.severity_assessment, ImpactSeverity::Low);
        assert_eq!(result.recovery_time_days, 0);
    }

    #[tokio::test]
    async fn scenarios_are_independent_of_each_other() {
        let vpp = VppId::from("vpp-1");
        let engine = engine_with_baseline(&vpp);

        let crash = engine
            .run_scenario(&vpp, &StressScenario::new(ScenarioKind::MarketCrash, 0.8, 90))
            .await
            .unwrap();
        let weather = engine
            .run_scenario(
                &vpp,
                &StressScenario::new(ScenarioKind::ExtremeWeather, 0.7, 90),
            )
            .await
            .unwrap();

        // Both runs started from the same unmutated baseline.
        assert_eq!(crash.baseline, baseline());
        assert_eq!(weather.baseline, baseline());
        assert_ne!(crash.stressed, weather.stressed);
    }

    #[test]
    fn apply_never_mutates_the_given_baseline() {
        let vpp = VppId::from("vpp-1");
        let engine = engine_with_baseline(&vpp);
        let snapshot = baseline();
        let scenario = StressScenario::new(ScenarioKind::LiquidityCrisis, 1.0, 60);

        let result = engine.apply(&vpp, &scenario, &snapshot);
        assert_eq!(snapshot, baseline());
        assert!(result.stressed.liquidity < snapshot.liquidity);
    }

    #[test]
    fn impact_buckets_follow_fixed_cut_points() {
        assert_eq!(assess_impact(dec!(0.01)), ImpactSeverity::Low);
        assert_eq!(assess_impact(dec!(0.05)), ImpactSeverity::Medium);
        assert_eq!(assess_impact(dec!(0.14)), ImpactSeverity::Medium);
        assert_eq!(assess_impact(dec!(0.15)), ImpactSeverity::High);
        assert_eq!(assess_impact(dec!(0.29)), ImpactSeverity::High);
        assert_eq!(assess_impact(dec!(0.30)), ImpactSeverity::Severe);
    }

    #[test]
    fn long_recoveries_exceed_short_horizons() {
        let vpp = VppId::from("vpp-1");
        let engine = engine_with_baseline(&vpp);
        let scenario = StressScenario::new(ScenarioKind::RegulatoryChange, 1.0, 30);

        let result = engine.apply(&vpp, &scenario, &baseline());
        assert_eq!(result.recovery_time_days, 180);
        assert!(!result.recovery_within_horizon);
    }

    #[tokio::test]
    async fn missing_baseline_is_a_stress_error() {
        let engine = StressTestEngine::new(
            Arc::new(InMemoryBaselineSource::new()),
            ScenarioLibrary::default(),
        );
        let err = engine
            .run_scenario(
                &VppId::from("ghost"),
                &StressScenario::new(ScenarioKind::MarketCrash, 0.5, 30),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GpError::Stress(StressError::BaselineUnavailable { .. })
        ));
    }

    #[test]
    fn zero_baseline_fields_produce_zero_impact() {
        let vpp = VppId::from("vpp-1");
        let engine = engine_with_baseline(&vpp);
        let zero = BaselineState {
            revenue: Decimal::ZERO,
            profit: Decimal::ZERO,
            risk_score: 0.2,
            liquidity: Decimal::ZERO,
        };
        let scenario = StressScenario::new(ScenarioKind::MarketCrash, 1.0, 90);

        let result = engine.apply(&vpp, &scenario, &zero);
        assert_eq!(result.impact.revenue_pct, Decimal::ZERO);
        assert_eq!(result.impact.profit_pct, Decimal::ZERO);
        assert_eq!(result.impact.liquidity_pct, Decimal::ZERO);
        assert!(result.impact.risk_delta > 0.0);
    }
}
