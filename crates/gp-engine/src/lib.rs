//! # gp-engine
//!
//! The GridPulse analytics engine: ties the risk pipeline, the portfolio
//! optimizer, the sensitivity analyzer and the stress-test engine together
//! behind one facade, runs the periodic risk monitoring loop and fans
//! lifecycle/alert events out to subscribers.

pub mod config;
pub mod events;
pub mod scheduler;
pub mod service;

pub use config::EngineConfig;
pub use events::{EngineEvent, EventBus};
pub use scheduler::{EvaluationPipeline, MonitorState, RiskMonitoringScheduler};
pub use service::{AnalyticsEngine, EngineCollaborators};
