//! Stress-testing vocabulary: named scenarios, baseline snapshots, impact
//! deltas and the test result shape.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::risk::VppId;

/// Named adverse scenarios. Each has a library entry with a default severity
/// and recovery estimate; both are overridable per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScenarioKind {
    MarketCrash,
    ExtremeWeather,
    RegulatoryChange,
    TechnicalFailure,
    LiquidityCrisis,
    CyberAttack,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 6] = [
        ScenarioKind::MarketCrash,
        ScenarioKind::ExtremeWeather,
        ScenarioKind::RegulatoryChange,
        ScenarioKind::TechnicalFailure,
        ScenarioKind::LiquidityCrisis,
        ScenarioKind::CyberAttack,
    ];
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScenarioKind::MarketCrash => "market-crash",
            ScenarioKind::ExtremeWeather => "extreme-weather",
            ScenarioKind::RegulatoryChange => "regulatory-change",
            ScenarioKind::TechnicalFailure => "technical-failure",
            ScenarioKind::LiquidityCrisis => "liquidity-crisis",
            ScenarioKind::CyberAttack => "cyber-attack",
        };
        write!(f, "{name}")
    }
}

/// A severity-parameterized stress scenario. Severity is clamped to [0, 1]
/// at construction; shocks scale linearly with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressScenario {
    pub kind: ScenarioKind,
    pub severity: f64,
    pub time_horizon_days: u32,
}

impl StressScenario {
    pub fn new(kind: ScenarioKind, severity: f64, time_horizon_days: u32) -> Self {
        Self {
            kind,
            severity: severity.clamp(0.0, 1.0),
            time_horizon_days,
        }
    }
}

/// Snapshot of a VPP's financial/operational state. Monetary fields are
/// Decimal; `risk_score` lives on the assessor's [0, 1] scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineState {
    pub revenue: Decimal,
    pub profit: Decimal,
    pub risk_score: f64,
    pub liquidity: Decimal,
}

/// Relative deltas between stressed and baseline states. Monetary impacts
/// are fractions of the baseline value; `risk_delta` is an absolute change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressImpact {
    pub revenue_pct: Decimal,
    pub profit_pct: Decimal,
    pub liquidity_pct: Decimal,
    pub risk_delta: f64,
}

impl StressImpact {
    /// Largest relative impact magnitude across the monetary fields.
    pub fn worst_pct(&self) -> Decimal {
        self.revenue_pct
            .abs()
            .max(self.profit_pct.abs())
            .max(self.liquidity_pct.abs())
    }
}

/// Categorical bucketing of impact magnitude, fixed cut points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactSeverity {
    Low,
    Medium,
    High,
    Severe,
}

/// Outcome of one scenario run. `baseline` and `stressed` are snapshots, so
/// impact computation is deterministic given the same baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressTestResult {
    pub vpp_id: VppId,
    pub scenario: StressScenario,
    pub baseline: BaselineState,
    pub stressed: BaselineState,
    pub impact: StressImpact,
    pub severity_assessment: ImpactSeverity,
    pub recovery_time_days: u32,
    pub recovery_within_horizon: bool,
    pub tested_at: DateTime<Utc>,
}
