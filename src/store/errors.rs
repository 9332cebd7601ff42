use deadpool_redis::redis::{ErrorKind, RedisError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store connection error: {0}")]
    Connection(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Store command error: {0}")]
    Command(#[from] RedisError),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Store command timed out after {millis}ms")]
    Timeout { millis: u64 },

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl From<deadpool_redis::PoolError> for StoreError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        StoreError::Pool(err.to_string())
    }
}

impl StoreError {
    /// Check if this error is transient and the operation may succeed on retry
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Pool(_) | Self::Timeout { .. } => true,
            Self::Command(e) => {
                e.is_io_error()
                    || e.is_connection_dropped()
                    || e.is_connection_refusal()
                    || e.is_timeout()
                    || matches!(e.kind(), ErrorKind::TryAgain | ErrorKind::BusyLoadingError)
            }
            Self::KeyNotFound(_) | Self::InvalidData(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_retryable() {
        assert!(StoreError::Connection("refused".to_string()).is_retryable());
        assert!(StoreError::Pool("timed out waiting".to_string()).is_retryable());
        assert!(StoreError::Timeout { millis: 2000 }.is_retryable());
    }

    #[test]
    fn test_semantic_errors_are_not_retryable() {
        assert!(!StoreError::KeyNotFound("ranking:leaderboard".to_string()).is_retryable());
        assert!(!StoreError::InvalidData("score".to_string()).is_retryable());

        let wrong_type = RedisError::from((ErrorKind::TypeError, "WRONGTYPE"));
        assert!(!StoreError::Command(wrong_type).is_retryable());
    }

    #[test]
    fn test_busy_loading_is_retryable() {
        let loading = RedisError::from((ErrorKind::BusyLoadingError, "LOADING"));
        assert!(StoreError::Command(loading).is_retryable());
    }
}
