//! # gp-stress
//!
//! Stress testing for GridPulse: applies named, severity-parameterized
//! adverse scenarios to a snapshot of a VPP's baseline state and quantifies
//! the impact and expected recovery.

pub mod engine;
pub mod scenarios;

pub use engine::StressTestEngine;
pub use scenarios::{ScenarioLibrary, ScenarioSpec, ShockProfile};
