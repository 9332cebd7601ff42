use deadpool_redis::{Config, Pool, PoolConfig, Runtime, Timeouts};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::RedisConfig;
use crate::store::errors::{Result, StoreError};

/// Create the Redis connection pool and verify it with a `PING`.
pub async fn create_pool(config: &RedisConfig) -> Result<Pool> {
    info!(
        host = %config.host,
        database = config.database,
        max_pool_size = config.max_pool_size,
        "Initializing store connection pool"
    );

    let mut pool_config = PoolConfig::new(config.max_pool_size);
    let mut timeouts = Timeouts::default();
    timeouts.wait = Some(config.pool_timeout);
    timeouts.create = Some(config.pool_timeout);
    timeouts.recycle = Some(config.pool_timeout);
    pool_config.timeouts = timeouts;

    let mut cfg = Config::from_url(config.connection_url());
    cfg.pool = Some(pool_config);

    let pool = cfg
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| StoreError::Connection(format!("Failed to create pool: {}", e)))?;

    health_check(&pool)
        .await
        .map_err(|e| StoreError::Connection(format!("Failed to test connection: {}", e)))?;

    info!("Store connection pool initialized successfully");
    Ok(pool)
}

/// Health check for the store connection
pub async fn health_check(pool: &Pool) -> Result<()> {
    let mut conn = pool.get().await?;

    let reply: String = deadpool_redis::redis::cmd("PING")
        .query_async(&mut conn)
        .await?;

    if reply != "PONG" {
        return Err(StoreError::InvalidData(format!(
            "Unexpected PING reply: {}",
            reply
        )));
    }

    Ok(())
}

/// Execute a function with retry logic for handling transient errors.
///
/// Non-retryable errors and the error of the final attempt are returned as-is.
pub async fn with_retry<F, Fut, T>(max_retries: u8, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut attempt: u8 = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                warn!(
                    attempt = attempt,
                    max_retries = max_retries,
                    error = %e,
                    "Retryable store error occurred, retrying..."
                );

                // Exponential backoff with jitter
                let delay_ms = (50 * 2_u64.pow(attempt as u32 - 1))
                    .min(1000) // Cap at 1 second
                    + rand::random::<u64>() % 50; // Add 0-50ms jitter

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retry_logic() {
        let calls = AtomicU32::new(0);

        let result = with_retry(3, || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call < 3 {
                    Err(StoreError::Connection("connection refused".to_string()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_limit_returns_last_error() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(2, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::Timeout { millis: 10 }) }
        })
        .await;

        assert!(matches!(result, Err(StoreError::Timeout { millis: 10 })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result: Result<()> = with_retry(5, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StoreError::KeyNotFound("ranking:leaderboard".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(StoreError::KeyNotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
