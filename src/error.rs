//! Error types for the shortage engine.
//!
//! Only configuration problems, shape bugs and I/O failures at the ingestion
//! or artifact boundary are errors. Expected data-quality issues (misaligned
//! columns, over-long periods, spiking days) are absorbed by the stage guards
//! and surfaced as [`GuardWarning`](crate::models::GuardWarning)s instead.

use rust_decimal::Decimal;
use thiserror::Error;

/// The main error type for the shortage engine.
///
/// # Example
///
/// ```
/// use shortage_engine::error::EngineError;
///
/// let error = EngineError::ConfigNotFound {
///     path: "/missing/engine.yaml".to_string(),
/// };
/// assert_eq!(error.to_string(), "Configuration file not found: /missing/engine.yaml");
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// A configuration value is out of range or unrecognised.
    #[error("Invalid configuration '{field}': {message}")]
    InvalidConfig {
        /// The offending configuration field.
        field: String,
        /// A description of what is wrong with it.
        message: String,
    },

    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// The presence record file handed over by ingestion does not exist.
    #[error("Presence records not found: {path}")]
    RecordsNotFound {
        /// The path that was not found.
        path: String,
    },

    /// The presence record file could not be parsed.
    #[error("Failed to parse presence records '{path}': {message}")]
    RecordsParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// Two matrices that must share a row index do not.
    #[error("Matrix shape mismatch: {message}")]
    MatrixShapeMismatch {
        /// A description of the mismatch.
        message: String,
    },

    /// A reconciliation check failed while running in strict mode.
    #[error(
        "Consistency check failed for '{dimension}': difference {difference} exceeds tolerance {tolerance}"
    )]
    ConsistencyCheckFailed {
        /// The dimension whose allocation did not reconcile.
        dimension: String,
        /// The absolute difference between allocated and overall totals.
        difference: Decimal,
        /// The tolerance that was exceeded.
        tolerance: Decimal,
    },

    /// A scenario was cancelled by its caller before completing.
    #[error("Scenario '{scenario}' was cancelled")]
    ScenarioCancelled {
        /// The cancelled scenario.
        scenario: String,
    },

    /// A snapshot artifact could not be written.
    #[error("Failed to write artifact '{path}': {message}")]
    ArtifactWrite {
        /// The artifact path.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// A general calculation error occurred.
    #[error("Calculation error: {message}")]
    CalculationError {
        /// A description of the calculation error.
        message: String,
    },
}

impl EngineError {
    /// Shorthand for an [`EngineError::InvalidConfig`].
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;
