//! Error types for flow compilation

use callflow_core::{BuildFailure, UsageError};
use thiserror::Error;

/// Result type for codegen operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while compiling a flow definition
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to parse YAML flow definition
    #[error("failed to parse flow definition: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Step definition that has no valid meaning
    #[error("invalid step in flow '{flow}': {message}")]
    InvalidStep {
        /// Flow name
        flow: String,
        /// Error description
        message: String,
    },

    /// Builder rejected a step while lowering
    #[error("flow '{flow}' could not be built: {source}")]
    Usage {
        /// Flow name
        flow: String,
        /// Builder error
        source: UsageError,
    },

    /// Flow failed validation
    #[error("flow '{flow}' is invalid: {source}")]
    Build {
        /// Flow name
        flow: String,
        /// Validation report
        source: BuildFailure,
    },

    /// Error from the core library
    #[error(transparent)]
    Core(#[from] callflow_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Validation report of a failed build
    pub fn report(&self) -> Option<&callflow_core::ValidationReport> {
        match self {
            Error::Build { source, .. } => Some(&source.report),
            _ => None,
        }
    }
}
