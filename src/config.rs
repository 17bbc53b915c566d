//! Process configuration from environment variables.

use std::time::Duration;

/// Everything the process needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string (`POSTGRES_URL`).
    pub database_url: String,
    /// Bearer token for the X API (`X_BEARER_TOKEN`).
    pub bearer_token: String,
    /// Conversation (root tweet) id to watch (`X_TWEET_ID`).
    pub conversation_id: String,
    /// The bot's own account id (`X_USER_ID`).
    pub bot_user_id: String,
    /// Base URL referral links point at (`REFERRAL_BASE_URL`).
    pub referral_base_url: String,
    /// Idle wait between polls (`POLL_INTERVAL_SECS`, default 60).
    pub poll_interval: Duration,
    /// Code-generation retry bound (`MAX_REGISTRATION_RETRIES`, default 3).
    pub max_registration_retries: u32,
    /// Search page size (`PAGE_SIZE`, default 100).
    pub page_size: u32,
    /// Supervisor wait after a fatal feed error (`RESTART_DELAY_SECS`,
    /// default 30).
    pub restart_delay: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingVar(&'static str),
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so tests never touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| lookup(key).ok_or(ConfigError::MissingVar(key));

        Ok(Self {
            database_url: required("POSTGRES_URL")?,
            bearer_token: required("X_BEARER_TOKEN")?,
            conversation_id: required("X_TWEET_ID")?,
            bot_user_id: required("X_USER_ID")?,
            referral_base_url: required("REFERRAL_BASE_URL")?,
            poll_interval: Duration::from_secs(parse_or(&lookup, "POLL_INTERVAL_SECS", 60)?),
            max_registration_retries: parse_or(&lookup, "MAX_REGISTRATION_RETRIES", 3)?,
            page_size: parse_or(&lookup, "PAGE_SIZE", 100)?,
            restart_delay: Duration::from_secs(parse_or(&lookup, "RESTART_DELAY_SECS", 30)?),
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { var: key, value }),
    }
}
