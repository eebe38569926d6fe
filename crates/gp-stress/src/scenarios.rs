//! The scenario library: per-scenario default severity, recovery estimate
//! and full-severity shock profile. The table is configuration — callers may
//! override entries — and shocks scale linearly with severity, so a severity
//! of zero is always a no-op.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use gp_types::{ScenarioKind, StressScenario};

/// Fractional shocks applied at full severity. Monetary fields are relative
/// (−0.40 = a 40% decline); `risk` is an absolute addition to the risk
/// score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShockProfile {
    pub revenue: f64,
    pub profit: f64,
    pub liquidity: f64,
    pub risk: f64,
}

/// Library entry for one named scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub default_severity: f64,
    pub base_recovery_days: u32,
    pub shocks: ShockProfile,
}

/// Configuration table of all named scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioLibrary {
    specs: HashMap<ScenarioKind, ScenarioSpec>,
}

impl ScenarioLibrary {
    pub fn spec(&self, kind: ScenarioKind) -> ScenarioSpec {
        self.specs
            .get(&kind)
            .copied()
            .unwrap_or_else(|| default_spec(kind))
    }

    /// Replace one scenario's entry.
    pub fn with_spec(mut self, kind: ScenarioKind, spec: ScenarioSpec) -> Self {
        self.specs.insert(kind, spec);
        self
    }

    /// A scenario at the library's default severity.
    pub fn default_scenario(&self, kind: ScenarioKind, time_horizon_days: u32) -> StressScenario {
        StressScenario::new(kind, self.spec(kind).default_severity, time_horizon_days)
    }
}

impl Default for ScenarioLibrary {
    fn default() -> Self {
        Self {
            specs: ScenarioKind::ALL
                .iter()
                .map(|&kind| (kind, default_spec(kind)))
                .collect(),
        }
    }
}

fn default_spec(kind: ScenarioKind) -> ScenarioSpec {
    match kind {
        ScenarioKind::MarketCrash => ScenarioSpec {
            default_severity: 0.8,
            base_recovery_days: 90,
            shocks: ShockProfile {
                revenue: -0.40,
                profit: -0.55,
                liquidity: -0.30,
                risk: 0.35,
            },
        },
        ScenarioKind::ExtremeWeather => ScenarioSpec {
            default_severity: 0.7,
            base_recovery_days: 21,
            shocks: ShockProfile {
                revenue: -0.30,
                profit: -0.35,
                liquidity: -0.15,
                risk: 0.25,
            },
        },
        ScenarioKind::RegulatoryChange => ScenarioSpec {
            default_severity: 0.5,
            base_recovery_days: 180,
            shocks: ShockProfile {
                revenue: -0.15,
                profit: -0.20,
                liquidity: -0.10,
                risk: 0.15,
            },
        },
        ScenarioKind::TechnicalFailure => ScenarioSpec {
            default_severity: 0.6,
            base_recovery_days: 14,
            shocks: ShockProfile {
                revenue: -0.25,
                profit: -0.30,
                liquidity: -0.10,
                risk: 0.20,
            },
        },
        ScenarioKind::LiquidityCrisis => ScenarioSpec {
            default_severity: 0.7,
            base_recovery_days: 60,
            shocks: ShockProfile {
                revenue: -0.10,
                profit: -0.15,
                liquidity: -0.50,
                risk: 0.30,
            },
        },
        ScenarioKind::CyberAttack => ScenarioSpec {
            default_severity: 0.9,
            base_recovery_days: 30,
            shocks: ShockProfile {
                revenue: -0.35,
                profit: -0.45,
                liquidity: -0.25,
                risk: 0.40,
            },
        },
    }
}
