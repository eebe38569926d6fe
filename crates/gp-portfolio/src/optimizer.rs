//! The optimizer facade: validation, strategy dispatch and portfolio
//! statistics.

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use gp_types::{
    validation_error, GpResult, OptimizationConstraints, OptimizationError, OptimizationMethod,
    OptimizationResult, PortfolioAsset,
};

use crate::methods::{
    BlackLitterman, ConditionalVar, HierarchicalRiskParity, MeanVariance, RiskParity, SolverInput,
    WeightStrategy,
};
use crate::stats::{
    portfolio_return, portfolio_risk, sharpe_ratio, to_covariance, weights_are_valid,
};

/// Seed used for scenario sampling when the caller does not pin one, so
/// repeated optimizations of the same request agree.
const DEFAULT_SEED: u64 = 7;

/// One optimization call. Serializable so the engine can fingerprint it for
/// caching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub method: OptimizationMethod,
    pub assets: Vec<PortfolioAsset>,
    pub expected_returns: Vec<f64>,
    pub risk_matrix: Vec<Vec<f64>>,
    pub target_return: Option<f64>,
    pub risk_tolerance: f64,
    pub constraints: OptimizationConstraints,
    /// Wall-clock budget; exceeded budgets return the best-found solution
    /// flagged `timed_out` instead of hanging the caller.
    pub budget: Option<Duration>,
    pub seed: Option<u64>,
}

impl OptimizationRequest {
    pub fn new(
        method: OptimizationMethod,
        assets: Vec<PortfolioAsset>,
        expected_returns: Vec<f64>,
        risk_matrix: Vec<Vec<f64>>,
    ) -> Self {
        Self {
            method,
            assets,
            expected_returns,
            risk_matrix,
            target_return: None,
            risk_tolerance: 0.5,
            constraints: OptimizationConstraints::default(),
            budget: None,
            seed: None,
        }
    }

    pub fn with_target_return(mut self, target: f64) -> Self {
        self.target_return = Some(target);
        self
    }

    pub fn with_risk_tolerance(mut self, tolerance: f64) -> Self {
        self.risk_tolerance = tolerance;
        self
    }

    pub fn with_constraints(mut self, constraints: OptimizationConstraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Numerical knobs shared by every strategy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub max_iterations: usize,
    pub tolerance: f64,
    pub risk_free_rate: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            tolerance: 1e-9,
            risk_free_rate: 0.02,
        }
    }
}

/// Computes asset weights under the selected method and derives the
/// portfolio-level return/risk/Sharpe triple.
pub struct PortfolioOptimizer {
    config: OptimizerConfig,
}

impl PortfolioOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    pub fn optimize(&self, request: &OptimizationRequest) -> GpResult<OptimizationResult> {
        let n = request.assets.len();
        if n == 0 {
            return Err(validation_error!("asset list is empty"));
        }
        if request.expected_returns.len() != n {
            return Err(OptimizationError::DimensionMismatch {
                expected: n,
                actual: request.expected_returns.len(),
            }
            .into());
        }
        if !request.risk_tolerance.is_finite() || request.risk_tolerance <= 0.0 {
            return Err(validation_error!(
                "risk tolerance must be positive, got {}",
                request.risk_tolerance
            ));
        }
        validate_constraints(&request.constraints, n)?;

        let covariance = to_covariance(&request.risk_matrix, n)?;
        let input = SolverInput {
            expected_returns: nalgebra::DVector::from_column_slice(&request.expected_returns),
            covariance: covariance.clone(),
            target_return: request.target_return,
            risk_tolerance: request.risk_tolerance,
            constraints: request.constraints,
            max_iterations: self.config.max_iterations,
            tolerance: self.config.tolerance,
            deadline: request.budget.map(|b| Instant::now() + b),
            seed: request.seed.unwrap_or(DEFAULT_SEED),
        };

        let strategy = strategy_for(request.method);
        debug!(method = %request.method, assets = n, "running portfolio optimization");
        let solution = strategy.solve(&input)?;
        weights_are_valid(&solution.weights, &request.constraints)?;

        if !solution.converged && !solution.timed_out {
            warn!(
                method = %request.method,
                iterations = solution.iterations,
                "optimizer exhausted its iteration budget, returning best-found solution"
            );
        }

        let expected_return = portfolio_return(&solution.weights, &request.expected_returns);
        let risk = portfolio_risk(&solution.weights, &covariance);
        let sharpe = sharpe_ratio(expected_return, risk, self.config.risk_free_rate);

        Ok(OptimizationResult {
            method: request.method,
            weights: solution.weights,
            expected_return,
            risk,
            sharpe_ratio: sharpe,
            converged: solution.converged,
            timed_out: solution.timed_out,
            iterations: solution.iterations,
        })
    }

    /// Write optimized weights back onto the asset records — the only place
    /// asset weights are ever assigned.
    pub fn apply_weights(
        result: &OptimizationResult,
        assets: &[PortfolioAsset],
    ) -> Vec<PortfolioAsset> {
        assets
            .iter()
            .zip(&result.weights)
            .map(|(asset, &weight)| PortfolioAsset {
                id: asset.id.clone(),
                expected_return: asset.expected_return,
                weight,
            })
            .collect()
    }
}

impl Default for PortfolioOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

fn strategy_for(method: OptimizationMethod) -> Box<dyn WeightStrategy> {
    match method {
        OptimizationMethod::MeanVariance => Box::new(MeanVariance),
        OptimizationMethod::RiskParity => Box::new(RiskParity),
        OptimizationMethod::BlackLitterman => Box::new(BlackLitterman),
        OptimizationMethod::HierarchicalRiskParity => Box::new(HierarchicalRiskParity),
        OptimizationMethod::ConditionalVar => Box::new(ConditionalVar),
    }
}

fn validate_constraints(constraints: &OptimizationConstraints, n: usize) -> GpResult<()> {
    if constraints.min_weight > constraints.max_weight {
        return Err(validation_error!(
            "min weight {} exceeds max weight {}",
            constraints.min_weight,
            constraints.max_weight
        ));
    }
    let n = n as f64;
    if n * constraints.max_weight < 1.0 - 1e-9 || n * constraints.min_weight > 1.0 + 1e-9 {
        return Err(validation_error!(
            "constraints [{}, {}] cannot reach a unit weight sum over {} assets",
            constraints.min_weight,
            constraints.max_weight,
            n
        ));
    }
    Ok(())
}
