pub mod api;
pub mod config;
pub mod domain;
pub mod models;
pub mod scheduler;
pub mod store;

// Re-export commonly used types
pub use config::{AppConfig, LeaderboardConfig, Mode, RedisConfig, SchedulerConfig};

pub use models::{AddScore, ScoreEntry, SyntheticIdentity};

pub use store::{InMemoryRankingStore, KeyPresence, RankingStore, RedisRankingStore, StoreError};

pub use domain::{DomainError, LeaderboardService};

pub use scheduler::{retry_with_jitter, ResetScheduler, SchedulerError};
