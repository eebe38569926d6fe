//! # gp-analysis
//!
//! Sensitivity analysis for GridPulse: which input parameters drive the
//! uncertainty of a VPP's valuation outputs.
//!
//! Provides parameter space definitions, stratified/trajectory sampling
//! (Latin hypercube, Morris) and the [`SensitivityAnalyzer`] that runs the
//! valuation model per sample and attributes output variance to inputs.

pub mod analyzer;
pub mod sampling;
pub mod space;

pub use analyzer::{SensitivityAnalyzer, SensitivityRequest};
pub use sampling::{latin_hypercube, morris_trajectories};
pub use space::{ParameterDistribution, ParameterSpace, ParameterSpec};
