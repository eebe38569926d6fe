//! Risk vocabulary shared across the GridPulse workspace: VPP identity,
//! risk categories, metrics, assessments and threshold configuration.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a Virtual Power Plant within the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VppId(String);

impl VppId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VppId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for VppId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Risk category. The set is fixed; adding a category is a breaking change
/// for threshold configuration and downstream alert consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskType {
    Market,
    Credit,
    Operational,
    Liquidity,
    Regulatory,
    Weather,
    Technical,
}

impl RiskType {
    /// All risk categories, in evaluation order.
    pub const ALL: [RiskType; 7] = [
        RiskType::Market,
        RiskType::Credit,
        RiskType::Operational,
        RiskType::Liquidity,
        RiskType::Regulatory,
        RiskType::Weather,
        RiskType::Technical,
    ];
}

impl fmt::Display for RiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskType::Market => "market",
            RiskType::Credit => "credit",
            RiskType::Operational => "operational",
            RiskType::Liquidity => "liquidity",
            RiskType::Regulatory => "regulatory",
            RiskType::Weather => "weather",
            RiskType::Technical => "technical",
        };
        write!(f, "{name}")
    }
}

/// Whether a metric was computed from a complete input snapshot or from
/// degraded/missing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Full,
    Degraded,
}

/// Metric payload. Market risk carries the historical-simulation triple;
/// every other category collapses to a single score in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RiskMetricValues {
    Market { var: f64, cvar: f64, volatility: f64 },
    Score { score: f64 },
}

/// A computed risk metric for one (VPP, risk type) at one point in time.
/// Created fresh every evaluation cycle; superseded, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskMetric {
    pub risk_type: RiskType,
    pub values: RiskMetricValues,
    pub data_quality: DataQuality,
    pub computed_at: DateTime<Utc>,
}

impl RiskMetric {
    /// A zero-valued metric flagged as degraded. Used when the input series
    /// is too short or a data collaborator is unavailable, so the monitoring
    /// loop keeps running on missing data.
    pub fn degraded(risk_type: RiskType) -> Self {
        let values = match risk_type {
            RiskType::Market => RiskMetricValues::Market {
                var: 0.0,
                cvar: 0.0,
                volatility: 0.0,
            },
            _ => RiskMetricValues::Score { score: 0.0 },
        };
        Self {
            risk_type,
            values,
            data_quality: DataQuality::Degraded,
            computed_at: Utc::now(),
        }
    }

    /// Scalar score used by the assessor: market risk averages its triple,
    /// every other category reports its score directly.
    pub fn composite_score(&self) -> f64 {
        match self.values {
            RiskMetricValues::Market {
                var,
                cvar,
                volatility,
            } => (var + cvar + volatility) / 3.0,
            RiskMetricValues::Score { score } => score,
        }
    }
}

/// Four-level risk scale. `Ord` follows escalation order so monotonicity
/// properties can be asserted directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        };
        write!(f, "{name}")
    }
}

/// Level boundaries as multiples of the configured per-type threshold.
/// The contract values (1.2 / 1.0 / 0.7) are asserted by the upstream
/// system; they are kept configurable but defaulted, not derived.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelRatios {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
}

impl Default for LevelRatios {
    fn default() -> Self {
        Self {
            critical: 1.2,
            high: 1.0,
            medium: 0.7,
        }
    }
}

/// Per-risk-type score thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    thresholds: HashMap<RiskType, f64>,
}

impl RiskThresholds {
    pub fn new(thresholds: HashMap<RiskType, f64>) -> Self {
        Self { thresholds }
    }

    pub fn get(&self, risk_type: RiskType) -> f64 {
        self.thresholds
            .get(&risk_type)
            .copied()
            .unwrap_or_else(|| Self::default_for(risk_type))
    }

    pub fn set(&mut self, risk_type: RiskType, threshold: f64) {
        self.thresholds.insert(risk_type, threshold);
    }

    /// Market thresholds live on the return scale; score-based categories on
    /// the [0, 1] scale.
    fn default_for(risk_type: RiskType) -> f64 {
        match risk_type {
            RiskType::Market => 0.05,
            RiskType::Credit => 0.70,
            RiskType::Operational => 0.70,
            RiskType::Liquidity => 0.60,
            RiskType::Regulatory => 0.80,
            RiskType::Weather => 0.60,
            RiskType::Technical => 0.65,
        }
    }
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            thresholds: RiskType::ALL
                .iter()
                .map(|&rt| (rt, Self::default_for(rt)))
                .collect(),
        }
    }
}

/// Assessment of one risk category against its threshold — derived
/// deterministically from a metric, one per (VPP, risk type, cycle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_type: RiskType,
    pub level: RiskLevel,
    pub score: f64,
    pub threshold: f64,
    pub metric: RiskMetric,
    pub assessed_at: DateTime<Utc>,
}

/// Direction of a risk score between consecutive evaluation cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Rising,
    Stable,
    Falling,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrendDirection::Rising => "rising",
            TrendDirection::Stable => "stable",
            TrendDirection::Falling => "falling",
        };
        write!(f, "{name}")
    }
}

/// One observation in a historical price series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// One observation in a category signal series (credit exposure,
/// incident rate, coverage ratio, ...), already normalized by the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalPoint {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Per-VPP risk snapshot produced by one monitoring cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub vpp_id: VppId,
    pub assessments: HashMap<RiskType, RiskAssessment>,
    pub generated_at: DateTime<Utc>,
}

impl RiskReport {
    /// Highest level across all assessed categories.
    pub fn worst_level(&self) -> Option<RiskLevel> {
        self.assessments.values().map(|a| a.level).max()
    }
}
