//! Sensitivity-analysis vocabulary: analysis kinds, samples and reports.
//!
//! Parameter-space definitions and the sampling strategies themselves live in
//! `gp-analysis`; this module only carries the shared shapes that data
//! collaborators and the engine facade need.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::risk::VppId;

/// One point in parameter space, aligned with the declared parameter order.
/// Ephemeral: generated per analysis run, never persisted.
pub type ParameterSample = Vec<f64>;

/// Which sensitivity design to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisKind {
    /// Saltelli-style first-order variance decomposition over Latin
    /// hypercube base samples.
    VarianceBased,
    /// Morris elementary-effects screening.
    Morris,
    /// One-at-a-time normalized derivative estimates around the midpoint.
    LocalDerivative,
}

impl Default for AnalysisKind {
    fn default() -> Self {
        Self::VarianceBased
    }
}

/// A single parameter's share of output variance (variance-based designs)
/// or its normalized effect magnitude (Morris / local designs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityIndex {
    pub parameter: String,
    pub index: f64,
}

/// Outcome of a sensitivity run. Indices are keyed by output metric name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityReport {
    pub vpp_id: VppId,
    pub kind: AnalysisKind,
    pub indices: HashMap<String, Vec<SensitivityIndex>>,
    pub confidence_level: f64,
    /// Requested number of base samples.
    pub sample_size: usize,
    /// Model evaluations actually performed (design-dependent multiple of
    /// `sample_size`; lower when the run timed out).
    pub model_runs: usize,
    /// Model evaluations that failed and were skipped; nonzero values mark a
    /// degraded report.
    pub failed_runs: usize,
    pub seed: Option<u64>,
    pub timed_out: bool,
    pub elapsed_ms: u64,
}

impl SensitivityReport {
    /// Indices for a single output metric, if it was analyzed.
    pub fn for_metric(&self, metric: &str) -> Option<&[SensitivityIndex]> {
        self.indices.get(metric).map(Vec::as_slice)
    }
}
