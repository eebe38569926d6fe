//! Portfolio-level statistics and the shared simplex projection.

use nalgebra::{DMatrix, DVector};

use gp_types::{GpError, GpResult, OptimizationConstraints, OptimizationError};

/// Portfolio expected return: `Σ wᵢ · μᵢ`.
pub fn portfolio_return(weights: &[f64], expected_returns: &[f64]) -> f64 {
    weights
        .iter()
        .zip(expected_returns)
        .map(|(w, r)| w * r)
        .sum()
}

/// Portfolio risk: `sqrt(wᵀ Σ w)` over the supplied covariance matrix.
/// Tiny negative quadratic forms from rounding clamp to zero.
pub fn portfolio_risk(weights: &[f64], covariance: &DMatrix<f64>) -> f64 {
    let w = DVector::from_column_slice(weights);
    let quad = (w.transpose() * covariance * &w)[(0, 0)];
    quad.max(0.0).sqrt()
}

/// Sharpe ratio `(return − risk-free) / risk`; undefined (None) when risk is
/// zero rather than silently infinite.
pub fn sharpe_ratio(portfolio_return: f64, portfolio_risk: f64, risk_free_rate: f64) -> Option<f64> {
    if portfolio_risk > 0.0 {
        Some((portfolio_return - risk_free_rate) / portfolio_risk)
    } else {
        None
    }
}

/// Parse and validate the caller's risk matrix into nalgebra form.
pub fn to_covariance(risk_matrix: &[Vec<f64>], n: usize) -> GpResult<DMatrix<f64>> {
    if risk_matrix.len() != n {
        return Err(OptimizationError::DimensionMismatch {
            expected: n,
            actual: risk_matrix.len(),
        }
        .into());
    }
    for row in risk_matrix {
        if row.len() != n {
            return Err(OptimizationError::DimensionMismatch {
                expected: n,
                actual: row.len(),
            }
            .into());
        }
        if row.iter().any(|v| !v.is_finite()) {
            return Err(OptimizationError::BadRiskMatrix {
                message: "non-finite entry".to_string(),
            }
            .into());
        }
    }
    Ok(DMatrix::from_fn(n, n, |i, j| risk_matrix[i][j]))
}

/// Project weights onto the constrained simplex: every weight inside
/// `[min, max]` and the total equal to 1 within 1e-9. Deficit or excess is
/// spread across the entries that still have slack; the bounds are assumed
/// feasible (validated by the optimizer up front).
pub fn project_to_simplex(weights: &mut [f64], constraints: &OptimizationConstraints) {
    let n = weights.len();
    if n == 0 {
        return;
    }
    let min_w = constraints.min_weight;
    let max_w = constraints.max_weight;

    for w in weights.iter_mut() {
        if !w.is_finite() {
            *w = min_w.max(0.0);
        }
        *w = w.clamp(min_w, max_w);
    }

    for _ in 0..64 {
        let sum: f64 = weights.iter().sum();
        let gap = 1.0 - sum;
        if gap.abs() < 1e-12 {
            return;
        }

        let slack: Vec<usize> = (0..n)
            .filter(|&i| {
                if gap > 0.0 {
                    weights[i] < max_w - 1e-15
                } else {
                    weights[i] > min_w + 1e-15
                }
            })
            .collect();
        if slack.is_empty() {
            break;
        }

        let step = gap / slack.len() as f64;
        for &i in &slack {
            weights[i] = (weights[i] + step).clamp(min_w, max_w);
        }
    }
}

/// Invariant check used after every solve.
pub fn weights_are_valid(weights: &[f64], constraints: &OptimizationConstraints) -> GpResult<()> {
    let sum: f64 = weights.iter().sum();
    if (sum - 1.0).abs() >= 1e-6 {
        return Err(GpError::Internal(format!(
            "weight sum invariant violated: {sum}"
        )));
    }
    for &w in weights {
        if w < constraints.min_weight - 1e-9 || w > constraints.max_weight + 1e-9 {
            return Err(GpError::Internal(format!("weight out of bounds: {w}")));
        }
    }
    Ok(())
}
