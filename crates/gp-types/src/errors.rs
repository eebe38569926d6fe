use thiserror::Error;

/// Main error type for the GridPulse system
#[derive(Error, Debug)]
pub enum GpError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Optimization error: {0}")]
    Optimization(#[from] OptimizationError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Stress test error: {0}")]
    Stress(#[from] StressError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors from data collaborators. Inside the monitoring loop these are
/// isolated per VPP and degrade the affected metrics; they never abort the
/// batch.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Data source unavailable: {source_name}")]
    SourceUnavailable { source_name: String },

    #[error("VPP not found: {vpp_id}")]
    VppNotFound { vpp_id: String },

    #[error("No {series} series available for VPP {vpp_id}")]
    SeriesUnavailable { vpp_id: String, series: String },

    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    #[error("Storage failure: {message}")]
    Storage { message: String },
}

/// Optimizer-related errors. Convergence shortfall is deliberately absent:
/// it is reported as a flag on the result, not raised.
#[derive(Error, Debug)]
pub enum OptimizationError {
    #[error("Unsupported optimization method: {method}")]
    UnsupportedMethod { method: String },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Risk matrix is not usable: {message}")]
    BadRiskMatrix { message: String },

    #[error("Numerical failure: {message}")]
    Numerical { message: String },
}

/// Sensitivity-analysis errors.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Parameter space is empty")]
    EmptySpace,

    #[error("Sample size {requested} below minimum {minimum}")]
    SampleSizeTooSmall { requested: usize, minimum: usize },

    #[error("Valuation model failed: {message}")]
    ModelRunFailed { message: String },
}

/// Stress-test errors.
#[derive(Error, Debug)]
pub enum StressError {
    #[error("Unknown scenario: {name}")]
    UnknownScenario { name: String },

    #[error("Baseline state unavailable for VPP {vpp_id}")]
    BaselineUnavailable { vpp_id: String },
}

/// Result type alias for GridPulse operations
pub type GpResult<T> = Result<T, GpError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::GpError::Validation(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::GpError::Internal(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::GpError::Config(format!($($arg)*))
    };
}
