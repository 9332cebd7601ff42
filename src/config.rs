use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?} ({reason})")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("{var} must be greater than zero")]
    MustBePositive { var: &'static str },
}

/// Server mode. `Dev` logs human-readable lines, `Pro` logs JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dev,
    Pro,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Mode::Dev),
            "pro" | "prod" | "production" => Ok(Mode::Pro),
            other => Err(format!("unknown mode \"{}\", expected dev or pro", other)),
        }
    }
}

/// Connection settings for the backing ordered-set store.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: Option<String>,
    pub host: String,
    pub password: String,
    pub database: i64,
    pub max_pool_size: usize,
    /// Attempts at acquiring a pooled connection before giving up.
    pub max_retries: u8,
    pub pool_timeout: Duration,
    pub command_timeout: Duration,
}

impl RedisConfig {
    /// Connection URL, either given verbatim through `REDIS_URL` or assembled
    /// from host, password and database index.
    pub fn connection_url(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }

        if self.password.is_empty() {
            format!("redis://{}/{}", self.host, self.database)
        } else {
            format!("redis://:{}@{}/{}", self.password, self.host, self.database)
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: "redis:6379".to_string(),
            password: String::new(),
            database: 0,
            max_pool_size: 16,
            max_retries: 3,
            pool_timeout: Duration::from_millis(3000),
            command_timeout: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LeaderboardConfig {
    /// Prefix isolating every key this service owns in the shared store.
    pub namespace: String,
    /// Logical name of the ranking collection inside the namespace.
    pub key: String,
    pub ttl: Duration,
    /// Number of ranks returned by the leaderboard read.
    pub size: usize,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            namespace: "ranking".to_string(),
            key: "leaderboard".to_string(),
            ttl: Duration::from_secs(600),
            size: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub version: String,
    pub port: u16,
    pub mode: Mode,
    pub redis: RedisConfig,
    pub leaderboard: LeaderboardConfig,
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Build the configuration from the process environment.
    ///
    /// Every variable is optional; unset variables fall back to the defaults
    /// of the corresponding section. Malformed values are reported rather than
    /// silently replaced.
    pub fn from_env() -> Result<Self, ConfigError> {
        let redis_defaults = RedisConfig::default();
        let board_defaults = LeaderboardConfig::default();
        let scheduler_defaults = SchedulerConfig::default();

        let redis = RedisConfig {
            url: env::var("REDIS_URL").ok().filter(|u| !u.is_empty()),
            host: env::var("REDIS_HOST").unwrap_or(redis_defaults.host),
            password: env::var("REDIS_PASSWORD").unwrap_or(redis_defaults.password),
            database: parse_var("REDIS_DATABASE", redis_defaults.database)?,
            max_pool_size: positive(
                "REDIS_MAX_POOL_SIZE",
                parse_var("REDIS_MAX_POOL_SIZE", redis_defaults.max_pool_size)?,
            )?,
            max_retries: positive(
                "REDIS_MAX_RETRIES",
                parse_var("REDIS_MAX_RETRIES", redis_defaults.max_retries)?,
            )?,
            pool_timeout: parse_millis("REDIS_POOL_TIMEOUT_MS", redis_defaults.pool_timeout)?,
            command_timeout: parse_millis(
                "REDIS_COMMAND_TIMEOUT_MS",
                redis_defaults.command_timeout,
            )?,
        };

        let leaderboard = LeaderboardConfig {
            namespace: env::var("LEADERBOARD_NAMESPACE").unwrap_or(board_defaults.namespace),
            key: env::var("LEADERBOARD_KEY")
                .ok()
                .filter(|k| !k.is_empty())
                .unwrap_or(board_defaults.key),
            ttl: parse_secs("LEADERBOARD_TTL_SECS", board_defaults.ttl)?,
            size: positive(
                "LEADERBOARD_SIZE",
                parse_var("LEADERBOARD_SIZE", board_defaults.size)?,
            )?,
        };

        let scheduler = SchedulerConfig {
            interval: parse_secs("RESET_INTERVAL_SECS", scheduler_defaults.interval)?,
            max_attempts: positive(
                "RESET_MAX_ATTEMPTS",
                parse_var("RESET_MAX_ATTEMPTS", scheduler_defaults.max_attempts)?,
            )?,
            base_delay: parse_millis("RESET_BASE_DELAY_MS", scheduler_defaults.base_delay)?,
        };

        if leaderboard.ttl.is_zero() {
            return Err(ConfigError::MustBePositive { var: "LEADERBOARD_TTL_SECS" });
        }
        if scheduler.interval.is_zero() {
            return Err(ConfigError::MustBePositive { var: "RESET_INTERVAL_SECS" });
        }

        let mode = match env::var("MODE") {
            Ok(value) => value.parse::<Mode>().map_err(|reason| ConfigError::InvalidValue {
                var: "MODE",
                value,
                reason,
            })?,
            Err(_) => Mode::Dev,
        };

        Ok(Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            port: parse_var("PORT", 8080)?,
            mode,
            redis,
            leaderboard,
            scheduler,
        })
    }
}

fn parse_var<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue {
                var,
                reason: e.to_string(),
                value,
            }),
        Err(_) => Ok(default),
    }
}

fn parse_secs(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    parse_var(var, default.as_secs()).map(Duration::from_secs)
}

fn parse_millis(var: &'static str, default: Duration) -> Result<Duration, ConfigError> {
    parse_var(var, default.as_millis() as u64).map(Duration::from_millis)
}

fn positive<T>(var: &'static str, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + Default,
{
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::MustBePositive { var })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_url_from_parts() {
        let config = RedisConfig {
            host: "localhost:6379".to_string(),
            database: 2,
            ..RedisConfig::default()
        };
        assert_eq!(config.connection_url(), "redis://localhost:6379/2");

        let config = RedisConfig {
            password: "secret".to_string(),
            ..config
        };
        assert_eq!(config.connection_url(), "redis://:secret@localhost:6379/2");
    }

    #[test]
    fn test_connection_url_override() {
        let config = RedisConfig {
            url: Some("redis://cache.internal:6380/5".to_string()),
            ..RedisConfig::default()
        };
        assert_eq!(config.connection_url(), "redis://cache.internal:6380/5");
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("dev".parse::<Mode>(), Ok(Mode::Dev));
        assert_eq!("PRO".parse::<Mode>(), Ok(Mode::Pro));
        assert!("staging".parse::<Mode>().is_err());
    }

    #[test]
    fn test_positive_rejects_zero() {
        assert!(positive("LEADERBOARD_SIZE", 0usize).is_err());
        assert_eq!(positive("LEADERBOARD_SIZE", 10usize).unwrap(), 10);
    }

    #[test]
    fn test_defaults_match_reference_cadence() {
        let board = LeaderboardConfig::default();
        let scheduler = SchedulerConfig::default();

        assert_eq!(board.ttl, Duration::from_secs(600));
        assert_eq!(board.size, 10);
        assert_eq!(scheduler.interval, Duration::from_secs(600));
        assert_eq!(scheduler.max_attempts, 3);
        assert_eq!(scheduler.base_delay, Duration::from_secs(1));
    }
}
