//! Collaborator interfaces and caching for GridPulse.
//!
//! The analytics core reads every external system through the traits in
//! [`sources`] — historical series, portfolio assets, baseline state, the
//! valuation model, alert persistence, config persistence and the VPP
//! registry. [`memory`] provides in-process implementations used by tests and
//! the demo service; [`cache`] holds the TTL-aware analysis cache the engine
//! owns exclusively.

pub mod cache;
pub mod memory;
pub mod sources;

pub use cache::{fingerprint, CacheKey, CacheStats, TtlCache};
pub use memory::{
    InMemoryAlertSink, InMemoryAssetSource, InMemoryBaselineSource, InMemoryConfigStore,
    InMemoryDataSource, InMemoryValuationModel, InMemoryVppRegistry,
};
pub use sources::{
    AlertSink, AssetSource, BaselineSource, ConfigStore, HistoricalDataSource, ValuationModel,
    VppRegistry,
};
