//! Portfolio and optimization vocabulary: assets, methods, constraints and
//! optimizer output.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::OptimizationError;

/// An energy asset participating in capital allocation.
///
/// `weight` is only ever assigned from optimizer output; sources supply
/// assets with a zero weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioAsset {
    pub id: String,
    pub expected_return: f64,
    pub weight: f64,
}

impl PortfolioAsset {
    pub fn new(id: impl Into<String>, expected_return: f64) -> Self {
        Self {
            id: id.into(),
            expected_return,
            weight: 0.0,
        }
    }
}

/// Selectable weight-generation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizationMethod {
    MeanVariance,
    RiskParity,
    BlackLitterman,
    HierarchicalRiskParity,
    ConditionalVar,
}

impl fmt::Display for OptimizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OptimizationMethod::MeanVariance => "mean-variance",
            OptimizationMethod::RiskParity => "risk-parity",
            OptimizationMethod::BlackLitterman => "black-litterman",
            OptimizationMethod::HierarchicalRiskParity => "hierarchical-risk-parity",
            OptimizationMethod::ConditionalVar => "conditional-var",
        };
        write!(f, "{name}")
    }
}

impl FromStr for OptimizationMethod {
    type Err = OptimizationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mean-variance" => Ok(OptimizationMethod::MeanVariance),
            "risk-parity" => Ok(OptimizationMethod::RiskParity),
            "black-litterman" => Ok(OptimizationMethod::BlackLitterman),
            "hierarchical-risk-parity" => Ok(OptimizationMethod::HierarchicalRiskParity),
            "conditional-var" => Ok(OptimizationMethod::ConditionalVar),
            other => Err(OptimizationError::UnsupportedMethod {
                method: other.to_string(),
            }),
        }
    }
}

/// Per-asset weight bounds. The default simplex bounds can be relaxed by
/// callers that allow leverage or shorting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConstraints {
    pub min_weight: f64,
    pub max_weight: f64,
}

impl Default for OptimizationConstraints {
    fn default() -> Self {
        Self {
            min_weight: 0.0,
            max_weight: 1.0,
        }
    }
}

/// Optimizer output. `weights` is aligned with the request's asset order and
/// sums to 1 within 1e-6. `sharpe_ratio` is `None` when portfolio risk is
/// zero (undefined, never silently infinite).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub method: OptimizationMethod,
    pub weights: Vec<f64>,
    pub expected_return: f64,
    pub risk: f64,
    pub sharpe_ratio: Option<f64>,
    pub converged: bool,
    pub timed_out: bool,
    pub iterations: usize,
}
