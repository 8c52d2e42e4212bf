//! Application configuration structs
//!
//! Loads configuration from environment variables (and `.env` when present).

use board_core::{GroupId, TieBreak, UserId};
use serde::Deserialize;
use std::env;
use std::ops::RangeInclusive;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub agent: ServerConfig,
    /// `None` runs presence over the in-process transport
    pub redis: Option<RedisConfig>,
    pub presence: PresenceSettings,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" => Ok(Self::Development),
            _ => Err(ConfigError::InvalidValue("APP_ENV", s.to_string())),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_agent_port")]
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Redis configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

/// Presence tuning and the agent's initial identity
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceSettings {
    /// Quiet period before the local user is reported idle
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default)]
    pub tie_break: TieBreak,
    /// Expiry of the per-group snapshot hash in Redis
    #[serde(default = "default_state_ttl_secs")]
    pub state_ttl_secs: u64,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub group_id: Option<GroupId>,
}

impl PresenceSettings {
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    #[must_use]
    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }
}

impl Default for PresenceSettings {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            tie_break: TieBreak::default(),
            state_ttl_secs: default_state_ttl_secs(),
            user_id: None,
            group_id: None,
        }
    }
}

// Default value functions
fn default_app_name() -> String {
    "team-board".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_agent_port() -> u16 {
    8710
}

fn default_redis_max_connections() -> u32 {
    10
}

fn default_idle_timeout_secs() -> u64 {
    300 // 5 minutes
}

/// Accepted quiet periods, one second to one day
const IDLE_TIMEOUT_RANGE_SECS: RangeInclusive<u64> = 1..=86_400;

fn default_state_ttl_secs() -> u64 {
    3600
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if a variable is set to a value that does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source
    ///
    /// # Errors
    /// Returns an error if a variable is set to a value that does not parse
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());

        let redis = match var("REDIS_URL") {
            Some(url) => Some(RedisConfig {
                url,
                max_connections: parse_or(
                    var("REDIS_MAX_CONNECTIONS"),
                    "REDIS_MAX_CONNECTIONS",
                    default_redis_max_connections,
                )?,
            }),
            None => None,
        };

        Ok(Self {
            app: AppSettings {
                name: var("APP_NAME").unwrap_or_else(default_app_name),
                env: parse_or(var("APP_ENV"), "APP_ENV", Environment::default)?,
            },
            agent: ServerConfig {
                host: var("AGENT_HOST").unwrap_or_else(default_host),
                port: parse_or(var("AGENT_PORT"), "AGENT_PORT", default_agent_port)?,
            },
            redis,
            presence: PresenceSettings {
                idle_timeout_secs: within(
                    parse_or(
                        var("PRESENCE_IDLE_TIMEOUT_SECS"),
                        "PRESENCE_IDLE_TIMEOUT_SECS",
                        default_idle_timeout_secs,
                    )?,
                    IDLE_TIMEOUT_RANGE_SECS,
                    "PRESENCE_IDLE_TIMEOUT_SECS",
                )?,
                tie_break: parse_or(var("PRESENCE_TIE_BREAK"), "PRESENCE_TIE_BREAK", TieBreak::default)?,
                state_ttl_secs: parse_or(
                    var("PRESENCE_STATE_TTL_SECS"),
                    "PRESENCE_STATE_TTL_SECS",
                    default_state_ttl_secs,
                )?,
                user_id: var("PRESENCE_USER_ID")
                    .map(|s| parse_value(&s, "PRESENCE_USER_ID"))
                    .transpose()?,
                group_id: var("PRESENCE_GROUP_ID")
                    .map(|s| parse_value(&s, "PRESENCE_GROUP_ID"))
                    .transpose()?,
            },
        })
    }
}

fn parse_value<T: FromStr>(raw: &str, key: &'static str) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key, raw.to_string()))
}

fn parse_or<T: FromStr>(
    raw: Option<String>,
    key: &'static str,
    default: impl FnOnce() -> T,
) -> Result<T, ConfigError> {
    raw.map_or_else(|| Ok(default()), |s| parse_value(&s, key))
}

fn within(value: u64, range: RangeInclusive<u64>, key: &'static str) -> Result<u64, ConfigError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue(key, value.to_string()))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
