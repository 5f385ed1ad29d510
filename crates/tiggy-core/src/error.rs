//! # Error Types
//!
//! The failure taxonomy shared by every layer of the client.

use thiserror::Error;

/// Client-level error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TiggyError {
    /// No resolvable identity; the caller is routed to login
    #[error("Not authenticated")]
    Unauthenticated,

    /// Non-success HTTP response from the backend
    #[error("Backend error ({status}): {message}")]
    Backend { status: u16, message: String },

    /// Rejected user input (blank text, send already in flight)
    #[error("Validation error: {0}")]
    Validation(String),

    /// A command referenced a thread that is no longer in the session
    #[error("Thread not found: {id}")]
    ThreadNotFound { id: String },
}

impl TiggyError {
    /// Create a backend error
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether retrying the same operation could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Backend { status, .. } => *status == 0 || *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type TiggyResult<T> = Result<T, TiggyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        let err = TiggyError::backend(500, "Failed to create a new chat");
        assert_eq!(
            err.to_string(),
            "Backend error (500): Failed to create a new chat"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(TiggyError::backend(503, "unavailable").is_retryable());
        assert!(TiggyError::backend(0, "connection refused").is_retryable());
        assert!(!TiggyError::backend(404, "not found").is_retryable());
        assert!(!TiggyError::Unauthenticated.is_retryable());
        assert!(!TiggyError::validation("empty").is_retryable());
    }
}
