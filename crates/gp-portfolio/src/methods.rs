//! Weight-generation strategies.
//!
//! Every supported optimization method implements [`WeightStrategy`] over the
//! same [`SolverInput`], and every solve ends in the shared simplex
//! projection, so the weight-sum and bounds invariants hold regardless of
//! method. Iterative solvers honor the iteration budget, the objective
//! tolerance and the optional deadline; exhausting either budget yields the
//! best-found feasible solution with the corresponding flag instead of an
//! error.

use nalgebra::{DMatrix, DVector};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use statrs::distribution::Normal;
use std::time::Instant;

use gp_types::{GpResult, OptimizationConstraints, OptimizationError};

use crate::stats::project_to_simplex;

/// Penalty weight applied to the squared shortfall against a target return.
const TARGET_PENALTY: f64 = 10.0;

/// Black-Litterman prior parameters: market risk aversion and the
/// uncertainty scaling of the equilibrium prior.
const BL_DELTA: f64 = 2.5;
const BL_TAU: f64 = 0.05;

/// Scenario count and confidence for the conditional-VaR solver.
const CVAR_SCENARIOS: usize = 512;
const CVAR_CONFIDENCE: f64 = 0.95;

/// Inputs shared by every strategy.
#[derive(Debug, Clone)]
pub struct SolverInput {
    pub expected_returns: DVector<f64>,
    pub covariance: DMatrix<f64>,
    pub target_return: Option<f64>,
    pub risk_tolerance: f64,
    pub constraints: OptimizationConstraints,
    pub max_iterations: usize,
    pub tolerance: f64,
    pub deadline: Option<Instant>,
    pub seed: u64,
}

impl SolverInput {
    fn n(&self) -> usize {
        self.expected_returns.len()
    }

    fn equal_weights(&self) -> Vec<f64> {
        let n = self.n();
        let mut weights = vec![1.0 / n as f64; n];
        project_to_simplex(&mut weights, &self.constraints);
        weights
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }
}

/// Raw output of a strategy, before portfolio statistics are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightSolution {
    pub weights: Vec<f64>,
    pub converged: bool,
    pub timed_out: bool,
    pub iterations: usize,
}

/// Common trait for all weight-generation strategies.
pub trait WeightStrategy: Send + Sync {
    fn solve(&self, input: &SolverInput) -> GpResult<WeightSolution>;

    /// Human-readable strategy name.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Mean-variance
// ---------------------------------------------------------------------------

/// Projected gradient ascent on the mean-variance objective
/// `wᵀμ − λ·wᵀΣw` (or squared-shortfall-penalized variance when a target
/// return is set). `λ` shrinks as risk tolerance grows.
pub struct MeanVariance;

impl WeightStrategy for MeanVariance {
    fn solve(&self, input: &SolverInput) -> GpResult<WeightSolution> {
        Ok(solve_mean_variance(input, &input.expected_returns))
    }

    fn name(&self) -> &str {
        "mean-variance"
    }
}

/// Shared by the mean-variance and Black-Litterman paths (the latter feeds a
/// posterior return vector through the same solver).
fn solve_mean_variance(input: &SolverInput, mu: &DVector<f64>) -> WeightSolution {
    let n = mu.len();
    let mut weights = input.equal_weights();

    let aversion = 1.0 / input.risk_tolerance.max(0.05);
    let max_var = (0..n)
        .map(|i| input.covariance[(i, i)].abs())
        .fold(0.0_f64, f64::max)
        .max(1e-12);
    let step = 0.05 / (1.0 + aversion * max_var);

    let mut prev_obj = f64::NEG_INFINITY;
    let mut converged = false;
    let mut timed_out = false;
    let mut iterations = 0;

    for iter in 0..input.max_iterations {
        iterations = iter + 1;
        if input.deadline_passed() {
            timed_out = true;
            break;
        }

        let w = DVector::from_column_slice(&weights);
        let sigma_w = &input.covariance * &w;
        let ret = mu.dot(&w);
        let variance = w.dot(&sigma_w);

        let (obj, grad) = match input.target_return {
            Some(target) => {
                let shortfall = ret - target;
                let obj = -variance - TARGET_PENALTY * shortfall * shortfall;
                let grad = &sigma_w * (-2.0) + mu * (-2.0 * TARGET_PENALTY * shortfall);
                (obj, grad)
            }
            None => {
                let obj = ret - aversion * variance;
                let grad = mu - &sigma_w * (2.0 * aversion);
                (obj, grad)
            }
        };

        for i in 0..n {
            weights[i] += step * grad[i];
        }
        project_to_simplex(&mut weights, &input.constraints);

        if (obj - prev_obj).abs() < input.tolerance {
            converged = true;
            break;
        }
        prev_obj = obj;
    }

    WeightSolution {
        weights,
        converged,
        timed_out,
        iterations,
    }
}

// ---------------------------------------------------------------------------
// Risk parity
// ---------------------------------------------------------------------------

/// Multiplicative-update iteration toward equal risk contributions:
/// `wᵢ ← wᵢ·(RC_target / RCᵢ)^½`, renormalized each round.
pub struct RiskParity;

impl WeightStrategy for RiskParity {
    fn solve(&self, input: &SolverInput) -> GpResult<WeightSolution> {
        let n = input.n();
        let mut weights = input.equal_weights();

        let mut converged = false;
        let mut timed_out = false;
        let mut iterations = 0;

        for iter in 0..input.max_iterations {
            iterations = iter + 1;
            if input.deadline_passed() {
                timed_out = true;
                break;
            }

            let w = DVector::from_column_slice(&weights);
            let sigma_w = &input.covariance * &w;
            let port_var = w.dot(&sigma_w);
            if port_var <= 1e-16 {
                // Risk-free inputs: equal weights already are risk parity.
                converged = true;
                break;
            }

            let target = port_var / n as f64;
            let max_dev = (0..n)
                .map(|i| (weights[i] * sigma_w[i] - target).abs())
                .fold(0.0_f64, f64::max);
            if max_dev / port_var < 1e-6 {
                converged = true;
                break;
            }

            for i in 0..n {
                let rc = (weights[i] * sigma_w[i]).max(1e-16);
                let factor = (target / rc).sqrt().clamp(0.5, 2.0);
                weights[i] *= factor;
            }
            project_to_simplex(&mut weights, &input.constraints);
        }

        Ok(WeightSolution {
            weights,
            converged,
            timed_out,
            iterations,
        })
    }

    fn name(&self) -> &str {
        "risk-parity"
    }
}

// ---------------------------------------------------------------------------
// Black-Litterman
// ---------------------------------------------------------------------------

/// Blends equilibrium returns implied by an equal-weight prior with the
/// caller's expected returns treated as absolute views (`P = I`,
/// `Ω = τ·diag(Σ)`), then solves mean-variance on the posterior mean.
pub struct BlackLitterman;

impl WeightStrategy for BlackLitterman {
    fn solve(&self, input: &SolverInput) -> GpResult<WeightSolution> {
        let n = input.n();
        let w_eq = DVector::from_element(n, 1.0 / n as f64);
        let pi = (&input.covariance * w_eq) * BL_DELTA;

        let tau_sigma_inv = (input.covariance.clone() * BL_TAU)
            .try_inverse()
            .ok_or_else(|| OptimizationError::BadRiskMatrix {
                message: "singular prior covariance".to_string(),
            })?;

        for i in 0..n {
            if input.covariance[(i, i)] <= 0.0 {
                return Err(OptimizationError::BadRiskMatrix {
                    message: format!("non-positive variance for asset {i}"),
                }
                .into());
            }
        }
        let omega_inv = DMatrix::from_diagonal(&DVector::from_fn(n, |i, _| {
            1.0 / (BL_TAU * input.covariance[(i, i)])
        }));

        let m_inv = (&tau_sigma_inv + &omega_inv).try_inverse().ok_or_else(|| {
            OptimizationError::Numerical {
                message: "posterior precision matrix is singular".to_string(),
            }
        })?;
        let mu_bl = m_inv * (&tau_sigma_inv * pi + &omega_inv * &input.expected_returns);

        Ok(solve_mean_variance(input, &mu_bl))
    }

    fn name(&self) -> &str {
        "black-litterman"
    }
}

// ---------------------------------------------------------------------------
// Hierarchical risk parity
// ---------------------------------------------------------------------------

/// Correlation-distance clustering, quasi-diagonal seriation and recursive
/// bisection with inverse-variance cluster allocation.
pub struct HierarchicalRiskParity;

impl WeightStrategy for HierarchicalRiskParity {
    fn solve(&self, input: &SolverInput) -> GpResult<WeightSolution> {
        let n = input.n();
        if n == 1 {
            return Ok(WeightSolution {
                weights: vec![1.0],
                converged: true,
                timed_out: false,
                iterations: 0,
            });
        }

        let distance = correlation_distance(&input.covariance);
        let order = single_linkage_order(&distance);

        let mut weights = vec![0.0; n];
        bisect(&order, 1.0, &input.covariance, &mut weights);
        project_to_simplex(&mut weights, &input.constraints);

        Ok(WeightSolution {
            weights,
            converged: true,
            timed_out: false,
            iterations: n - 1,
        })
    }

    fn name(&self) -> &str {
        "hierarchical-risk-parity"
    }
}

/// `d_ij = sqrt(0.5·(1 − ρ_ij))`, with zero-variance assets treated as
/// uncorrelated.
fn correlation_distance(cov: &DMatrix<f64>) -> Vec<Vec<f64>> {
    let n = cov.nrows();
    let vols: Vec<f64> = (0..n).map(|i| cov[(i, i)].max(0.0).sqrt()).collect();
    (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    let denom = vols[i] * vols[j];
                    let corr = if denom > 0.0 {
                        (cov[(i, j)] / denom).clamp(-1.0, 1.0)
                    } else {
                        0.0
                    };
                    (0.5 * (1.0 - corr)).max(0.0).sqrt()
                })
                .collect()
        })
        .collect()
}

/// Agglomerative single-linkage merge; the final cluster's concatenated leaf
/// list serves as the quasi-diagonal ordering. Ties break on the lowest
/// cluster index, keeping the ordering deterministic.
fn single_linkage_order(distance: &[Vec<f64>]) -> Vec<usize> {
    let n = distance.len();
    let mut clusters: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();

    while clusters.len() > 1 {
        let mut best = (0, 1, f64::INFINITY);
        for a in 0..clusters.len() {
            for b in (a + 1)..clusters.len() {
                let link = clusters[a]
                    .iter()
                    .flat_map(|&i| clusters[b].iter().map(move |&j| distance[i][j]))
                    .fold(f64::INFINITY, f64::min);
                if link < best.2 {
                    best = (a, b, link);
                }
            }
        }
        let merged = clusters.remove(best.1);
        clusters[best.0].extend(merged);
    }

    clusters.pop().unwrap_or_default()
}

/// Inverse-variance portfolio variance of a cluster.
fn cluster_variance(items: &[usize], cov: &DMatrix<f64>) -> f64 {
    let inv_var: Vec<f64> = items.iter().map(|&i| 1.0 / cov[(i, i)].max(1e-12)).collect();
    let total: f64 = inv_var.iter().sum();
    let w: Vec<f64> = inv_var.iter().map(|v| v / total).collect();

    let mut var = 0.0;
    for (a, &i) in items.iter().enumerate() {
        for (b, &j) in items.iter().enumerate() {
            var += w[a] * w[b] * cov[(i, j)];
        }
    }
    var.max(0.0)
}

fn bisect(items: &[usize], allocation: f64, cov: &DMatrix<f64>, weights: &mut [f64]) {
    if items.len() == 1 {
        weights[items[0]] += allocation;
        return;
    }
    let (left, right) = items.split_at(items.len() / 2);
    let var_left = cluster_variance(left, cov);
    let var_right = cluster_variance(right, cov);
    let total = var_left + var_right;
    let alpha = if total > 0.0 {
        1.0 - var_left / total
    } else {
        0.5
    };
    bisect(left, allocation * alpha, cov, weights);
    bisect(right, allocation * (1.0 - alpha), cov, weights);
}

// ---------------------------------------------------------------------------
// Conditional VaR
// ---------------------------------------------------------------------------

/// Projected subgradient descent on `CVaR₉₅ − γ·mean return` over scenarios
/// sampled from `N(μ, Σ)` via the Cholesky factor. Scenario P&L evaluation
/// is parallelized with rayon; sampling is ChaCha-seeded so results are
/// reproducible for a given seed.
pub struct ConditionalVar;

impl WeightStrategy for ConditionalVar {
    fn solve(&self, input: &SolverInput) -> GpResult<WeightSolution> {
        let n = input.n();
        let lower = cholesky_lower(&input.covariance)?;

        let normal = Normal::new(0.0, 1.0).map_err(|e| OptimizationError::Numerical {
            message: format!("standard normal construction failed: {e}"),
        })?;
        let mut rng = ChaCha8Rng::seed_from_u64(input.seed);
        let scenarios: Vec<DVector<f64>> = (0..CVAR_SCENARIOS)
            .map(|_| {
                let z = DVector::from_fn(n, |_, _| {
                    use rand::distributions::Distribution;
                    normal.sample(&mut rng)
                });
                &input.expected_returns + &lower * z
            })
            .collect();

        let mean_scenario = scenarios
            .iter()
            .fold(DVector::zeros(n), |acc, s| acc + s)
            / CVAR_SCENARIOS as f64;

        let tail_len = (((1.0 - CVAR_CONFIDENCE) * CVAR_SCENARIOS as f64).ceil() as usize).max(1);
        let gamma = input.risk_tolerance;
        let step = 0.05;

        let mut weights = input.equal_weights();
        let mut prev_obj = f64::NEG_INFINITY;
        let mut converged = false;
        let mut timed_out = false;
        let mut iterations = 0;

        for iter in 0..input.max_iterations {
            iterations = iter + 1;
            if input.deadline_passed() {
                timed_out = true;
                break;
            }

            let w = DVector::from_column_slice(&weights);
            let mut port: Vec<(usize, f64)> = scenarios
                .par_iter()
                .enumerate()
                .map(|(s, r)| (s, r.dot(&w)))
                .collect();
            let mean_return = port.iter().map(|(_, v)| v).sum::<f64>() / CVAR_SCENARIOS as f64;

            port.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            let tail = &port[..tail_len];
            let cvar = -(tail.iter().map(|(_, v)| v).sum::<f64>() / tail_len as f64);

            let obj = gamma * mean_return - cvar;

            // Subgradient of −CVaR is the mean tail scenario.
            let mut grad = DVector::zeros(n);
            for (s, _) in tail {
                grad += &scenarios[*s];
            }
            grad /= tail_len as f64;
            grad += &mean_scenario * gamma;

            for i in 0..n {
                weights[i] += step * grad[i];
            }
            project_to_simplex(&mut weights, &input.constraints);

            if (obj - prev_obj).abs() < input.tolerance {
                converged = true;
                break;
            }
            prev_obj = obj;
        }

        Ok(WeightSolution {
            weights,
            converged,
            timed_out,
            iterations,
        })
    }

    fn name(&self) -> &str {
        "conditional-var"
    }
}

/// Cholesky factor with a single jitter retry so positive-semidefinite
/// matrices (including all-zero risk) still factor.
fn cholesky_lower(cov: &DMatrix<f64>) -> GpResult<DMatrix<f64>> {
    if let Some(chol) = cov.clone().cholesky() {
        return Ok(chol.l());
    }

    let n = cov.nrows();
    let mean_diag = (0..n).map(|i| cov[(i, i)].abs()).sum::<f64>() / n as f64;
    let jitter = mean_diag.max(1e-10) * 1e-6;
    (cov + DMatrix::identity(n, n) * jitter)
        .cholesky()
        .map(|chol| chol.l())
        .ok_or_else(|| {
            OptimizationError::BadRiskMatrix {
                message: "covariance is not positive semidefinite".to_string(),
            }
            .into()
        })
}
