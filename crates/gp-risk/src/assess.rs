//! Threshold-based risk assessment.
//!
//! [`RiskAssessor::assess`] is a pure function from metrics and thresholds
//! to assessments; given identical inputs it always produces identical
//! levels, which the monitoring loop relies on for reproducibility.

use chrono::Utc;
use std::collections::HashMap;

use gp_types::{LevelRatios, RiskAssessment, RiskLevel, RiskMetric, RiskThresholds, RiskType};

/// Maps metrics onto the four-level risk scale using per-type thresholds.
pub struct RiskAssessor {
    ratios: LevelRatios,
}

impl RiskAssessor {
    pub fn new(ratios: LevelRatios) -> Self {
        Self { ratios }
    }

    /// Assess every supplied metric against its configured threshold.
    pub fn assess(
        &self,
        metrics: &HashMap<RiskType, RiskMetric>,
        thresholds: &RiskThresholds,
    ) -> HashMap<RiskType, RiskAssessment> {
        metrics
            .iter()
            .map(|(&risk_type, metric)| {
                let score = metric.composite_score();
                let threshold = thresholds.get(risk_type);
                let level = self.level_for(score, threshold);
                (
                    risk_type,
                    RiskAssessment {
                        risk_type,
                        level,
                        score,
                        threshold,
                        metric: metric.clone(),
                        assessed_at: Utc::now(),
                    },
                )
            })
            .collect()
    }

    /// Level boundaries relative to the threshold `T`:
    /// `score ≥ critical·T` → Critical, `≥ high·T` → High,
    /// `≥ medium·T` → Medium, else Low.
    pub fn level_for(&self, score: f64, threshold: f64) -> RiskLevel {
        if score >= self.ratios.critical * threshold {
            RiskLevel::Critical
        } else if score >= self.ratios.high * threshold {
            RiskLevel::High
        } else if score >= self.ratios.medium * threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl Default for RiskAssessor {
    fn default() -> Self {
        Self::new(LevelRatios::default())
    }
}
