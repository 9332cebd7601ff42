//! Periodic leaderboard reset.
//!
//! Each firing runs `Idle → Attempting(1) → … → Success | Failed → Idle`.
//! Failed attempts are retried with a growing, jittered delay; when every
//! attempt fails the error is logged and the scheduler waits for the next
//! firing. Nothing here is fatal to the process.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::domain::{DomainError, LeaderboardService};

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Reset failed after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        #[source]
        last_error: DomainError,
    },
}

/// Run `operation` up to `attempts` times.
///
/// Before each retry the delay grows by a random jitter in
/// `[0, previous_delay / 2)`, starting from `base_delay`. Returns the number
/// of attempts used on success, or the last error once attempts run out.
pub async fn retry_with_jitter<F, Fut, T, E>(
    attempts: u32,
    base_delay: Duration,
    mut operation: F,
) -> Result<(T, u32), (E, u32)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let attempts = attempts.max(1);
    let mut delay = base_delay;
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(e) if attempt < attempts => {
                delay = next_delay(delay);
                warn!(
                    attempt,
                    max_attempts = attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err((e, attempt)),
        }
    }
}

/// `previous + U[0, previous / 2)`
fn next_delay(previous: Duration) -> Duration {
    let half_ms = previous.as_millis() as u64 / 2;
    if half_ms == 0 {
        return previous;
    }
    let jitter = rand::random::<u64>() % half_ms;
    previous + Duration::from_millis(jitter)
}

/// Time from `now_unix_ms` until the next wall-clock multiple of `interval`.
fn until_next_boundary(now_unix_ms: i64, interval: Duration) -> Duration {
    let interval_ms = interval.as_millis().max(1) as i64;
    let elapsed = now_unix_ms.rem_euclid(interval_ms);
    Duration::from_millis((interval_ms - elapsed) as u64)
}

/// Resets the leaderboard on a fixed cadence aligned to the wall clock.
pub struct ResetScheduler {
    service: Arc<LeaderboardService>,
    config: SchedulerConfig,
}

impl ResetScheduler {
    pub fn new(service: Arc<LeaderboardService>, config: SchedulerConfig) -> Self {
        Self { service, config }
    }

    /// One firing: reset with bounded retries.
    #[tracing::instrument(skip(self))]
    pub async fn fire(&self) -> Result<u64, SchedulerError> {
        info!("Starting scheduled leaderboard reset");

        let result = retry_with_jitter(self.config.max_attempts, self.config.base_delay, |_| {
            self.service.reset_leaderboard()
        })
        .await;

        match result {
            Ok((removed, attempts)) => {
                info!(removed, attempts, "Scheduled reset succeeded");
                Ok(removed)
            }
            Err((last_error, attempts)) => {
                let err = SchedulerError::Exhausted {
                    attempts,
                    last_error,
                };
                error!(error = %err, "Scheduled reset failed, waiting for next firing");
                Err(err)
            }
        }
    }

    /// Fire forever. Failures are absorbed; the loop never exits on its own.
    pub async fn run(self) {
        let first = until_next_boundary(Utc::now().timestamp_millis(), self.config.interval);
        info!(
            interval_secs = self.config.interval.as_secs(),
            first_in_secs = first.as_secs(),
            "Reset scheduler started"
        );

        self.run_after(first).await
    }

    /// Fire after `first`, then once per interval.
    async fn run_after(self, first: Duration) {
        let mut ticker = interval_at(Instant::now() + first, self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let _ = self.fire().await;
        }
    }

    /// Spawn `run` on the runtime; abort the handle to stop the scheduler.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
