//! Unified error types for the power-system-simulation workspace
//!
//! This module provides a common error type [`PssError`] that can represent
//! errors from any part of the system. Domain-specific error types (topology
//! validation, profile pairing, solver failures) convert into `PssError` for
//! uniform handling at API boundaries.

use thiserror::Error;

/// Unified error type for all simulation operations.
///
/// Allows errors from I/O, parsing, validation, topology analysis, and
/// solving to be handled uniformly by callers that do not care which
/// subsystem failed.
#[derive(Error, Debug)]
pub enum PssError {
    /// I/O errors (file access etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Input data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Graph topology errors
    #[error("Topology error: {0}")]
    Topology(String),

    /// Power flow solver errors
    #[error("Solver error: {0}")]
    Solver(String),

    /// Load profile errors (pairing, shape, timestamps)
    #[error("Profile error: {0}")]
    Profile(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using PssError.
pub type PssResult<T> = Result<T, PssError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for PssError {
    fn from(err: anyhow::Error) -> Self {
        PssError::Other(err.to_string())
    }
}

impl From<String> for PssError {
    fn from(s: String) -> Self {
        PssError::Other(s)
    }
}

impl From<&str> for PssError {
    fn from(s: &str) -> Self {
        PssError::Other(s.to_string())
    }
}
