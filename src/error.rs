//! Error types for the rating engine
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific rating scenarios
#[derive(Debug, thiserror::Error)]
pub enum RatingError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Inconsistent state: {reason}")]
    InconsistentState { reason: String },

    #[error("WHR did not converge after {iterations} iterations (max change {max_change:.6})")]
    ConvergenceFailure { iterations: usize, max_change: f64 },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Storage error: {message}")]
    StorageError { message: String },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl RatingError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn inconsistent_state(reason: impl Into<String>) -> Self {
        Self::InconsistentState {
            reason: reason.into(),
        }
    }
}

/// Look through an `anyhow::Error` for the domain error that caused it
pub fn rating_error(err: &anyhow::Error) -> Option<&RatingError> {
    err.downcast_ref::<RatingError>()
}
