// Domain layer - leaderboard policy with no HTTP concerns
// Used by the API handlers and by the reset scheduler

pub mod leaderboard;

use crate::store::StoreError;

// Domain error type - no HTTP concerns
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub use leaderboard::LeaderboardService;
