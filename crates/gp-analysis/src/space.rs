//! Parameter space definitions.

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};

use gp_types::{validation_error, GpResult};

/// A single parameter dimension in the space under analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    /// Human-readable parameter name (e.g. "price_volatility").
    pub name: String,
    pub distribution: ParameterDistribution,
}

/// Describes how a parameter is distributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ParameterDistribution {
    /// Continuous uniform on [low, high].
    Uniform { low: f64, high: f64 },
    /// Normal with the given mean and standard deviation, truncated at ±3σ
    /// for sampling purposes.
    Normal { mean: f64, std_dev: f64 },
}

impl ParameterDistribution {
    /// Sampling bounds for this parameter.
    pub fn bounds(&self) -> (f64, f64) {
        match *self {
            ParameterDistribution::Uniform { low, high } => (low, high),
            ParameterDistribution::Normal { mean, std_dev } => {
                (mean - 3.0 * std_dev, mean + 3.0 * std_dev)
            }
        }
    }

    /// Map a unit-interval coordinate into the parameter's own range via the
    /// inverse CDF (identity scaling for uniform).
    pub fn from_unit(&self, u: f64) -> f64 {
        let u = u.clamp(0.0, 1.0);
        match *self {
            ParameterDistribution::Uniform { low, high } => low + u * (high - low),
            ParameterDistribution::Normal { mean, std_dev } => {
                // Guard the tails so u=0/1 stay finite, then honor the ±3σ
                // truncation declared by bounds().
                let u = u.clamp(1e-6, 1.0 - 1e-6);
                let normal = match Normal::new(mean, std_dev) {
                    Ok(normal) => normal,
                    Err(_) => return mean,
                };
                let (low, high) = self.bounds();
                normal.inverse_cdf(u).clamp(low, high)
            }
        }
    }
}

/// The full parameter space: an ordered list of parameter definitions.
/// Samples are vectors aligned with this order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParameterSpace {
    pub parameters: Vec<ParameterSpec>,
}

impl ParameterSpace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_uniform(mut self, name: impl Into<String>, low: f64, high: f64) -> Self {
        self.parameters.push(ParameterSpec {
            name: name.into(),
            distribution: ParameterDistribution::Uniform { low, high },
        });
        self
    }

    pub fn add_normal(mut self, name: impl Into<String>, mean: f64, std_dev: f64) -> Self {
        self.parameters.push(ParameterSpec {
            name: name.into(),
            distribution: ParameterDistribution::Normal { mean, std_dev },
        });
        self
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.name.clone()).collect()
    }

    /// Materialize a unit-cube point into parameter units, dimension by
    /// dimension.
    pub fn from_unit_point(&self, unit: &[f64]) -> Vec<f64> {
        self.parameters
            .iter()
            .zip(unit)
            .map(|(spec, &u)| spec.distribution.from_unit(u))
            .collect()
    }

    /// Reject inverted ranges and non-positive spreads before sampling.
    pub fn validate(&self) -> GpResult<()> {
        for spec in &self.parameters {
            match spec.distribution {
                ParameterDistribution::Uniform { low, high } => {
                    if !(low < high) {
                        return Err(validation_error!(
                            "parameter {}: uniform range [{low}, {high}] is empty",
                            spec.name
                        ));
                    }
                }
                ParameterDistribution::Normal { std_dev, .. } => {
                    if !(std_dev > 0.0) {
                        return Err(validation_error!(
                            "parameter {}: standard deviation must be positive, got {std_dev}",
                            spec.name
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chain_preserves_order() {
        let space = ParameterSpace::new()
            .add_uniform("price_volatility", 0.1, 0.6)
            .add_normal("demand_growth", 0.02, 0.01);
        assert_eq!(space.len(), 2);
        assert_eq!(space.names(), vec!["price_volatility", "demand_growth"]);
    }

    #[test]
    fn uniform_from_unit_is_linear() {
        let dist = ParameterDistribution::Uniform { low: 2.0, high: 4.0 };
        assert_eq!(dist.from_unit(0.0), 2.0);
        assert_eq!(dist.from_unit(0.5), 3.0);
        assert_eq!(dist.from_unit(1.0), 4.0);
    }

    #[test]
    fn normal_from_unit_respects_truncation() {
        let dist = ParameterDistribution::Normal {
            mean: 0.0,
            std_dev: 1.0,
        };
        assert!(dist.from_unit(0.5).abs() < 1e-9);
        assert!(dist.from_unit(0.0) >= -3.0);
        assert!(dist.from_unit(1.0) <= 3.0);
        // Median splits the mass.
        assert!(dist.from_unit(0.84) > 0.9 && dist.from_unit(0.84) < 1.1);
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        let space = ParameterSpace::new().add_uniform("bad", 1.0, 1.0);
        assert!(space.validate().is_err());

        let space = ParameterSpace::new().add_normal("bad", 0.0, 0.0);
        assert!(space.validate().is_err());

        let space = ParameterSpace::new().add_uniform("good", 0.0, 1.0);
        assert!(space.validate().is_ok());
    }
}
