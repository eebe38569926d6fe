//! # gp-portfolio
//!
//! Capital-allocation optimization for GridPulse.
//!
//! Provides the [`PortfolioOptimizer`] facade over five weight-generation
//! strategies (mean-variance, risk parity, Black-Litterman, hierarchical
//! risk parity, conditional-VaR) sharing one input/output contract, plus the
//! covariance statistics used to grade the resulting portfolio.

mod methods;
mod optimizer;
mod stats;

pub use methods::{
    BlackLitterman, ConditionalVar, HierarchicalRiskParity, MeanVariance, RiskParity, SolverInput,
    WeightSolution, WeightStrategy,
};
pub use optimizer::{OptimizationRequest, OptimizerConfig, PortfolioOptimizer};
pub use stats::{portfolio_return, portfolio_risk, sharpe_ratio};
