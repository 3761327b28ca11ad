//! Error types for SID allocation.

use thiserror::Error;

/// Result type alias for SID store operations.
pub type SidStoreResult<T> = Result<T, SidStoreError>;

/// Errors that can occur while allocating or looking up a SID.
#[derive(Debug, Error)]
pub enum SidStoreError {
    /// The caller passed an argument the store cannot act on.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The store was closed and can no longer allocate.
    #[error("SID store is closed")]
    Closed,

    /// The backing counter/map service failed.
    #[error("Backend operation failed: {operation}: {message}")]
    Backend {
        /// The operation that failed (e.g., "increment", "map_get").
        operation: String,
        /// Error message.
        message: String,
    },

    /// The shared counter moved past the 32-bit SID space.
    #[error("SID counter overflow: {0} does not fit in 32 bits")]
    Overflow(i64),

    /// A stored mapping could not be decoded.
    #[error("Corrupt SID entry for switch {switch_id}: {value:?}")]
    Corrupt {
        /// The switch whose entry is unreadable.
        switch_id: String,
        /// The raw stored value.
        value: String,
    },
}

impl SidStoreError {
    /// Creates a backend error.
    pub fn backend(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Backend {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Returns true if retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SidStoreError::Backend { .. })
    }
}

impl From<redis::RedisError> for SidStoreError {
    fn from(err: redis::RedisError) -> Self {
        let operation = err.code().unwrap_or("redis").to_string();
        Self::backend(operation, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SidStoreError::InvalidArgument("ID cannot be empty".to_string());
        assert_eq!(err.to_string(), "Invalid argument: ID cannot be empty");

        let err = SidStoreError::backend("increment", "connection refused");
        assert_eq!(
            err.to_string(),
            "Backend operation failed: increment: connection refused"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(SidStoreError::backend("map_get", "timeout").is_retryable());
        assert!(!SidStoreError::Closed.is_retryable());
        assert!(!SidStoreError::InvalidArgument(String::new()).is_retryable());
    }
}
