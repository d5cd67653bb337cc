//! Process configuration parsed from environment variables.
//!
//! `main` loads `.env` through `dotenvy` first, so every key below may live
//! in either place. Parsing goes through a lookup function so tests never
//! touch the real process environment.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path::PathBuf;

use canvas::battle::BattleRules;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_LLM_MODEL: &str = "claude-sonnet-4-5-20250929";
pub const DEFAULT_LLM_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LLM_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_SYNC_QUEUE_DEPTH: usize = 1024;
pub const DEFAULT_SUBSCRIBER_QUEUE_DEPTH: usize = 512;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

impl crate::frame::ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        "E_CONFIG"
    }
}

/// Tutoring oracle credentials and HTTP timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleConfig {
    pub api_key: String,
    pub model: String,
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    /// Directory served at `/` (the browser bundle). `None` serves API only.
    pub static_dir: Option<PathBuf>,
    /// `None` when `LLM_API_KEY` is unset; verification then reports the
    /// oracle as unavailable.
    pub oracle: Option<OracleConfig>,
    /// Enemies grow over time during battles.
    pub enemy_growth: bool,
    pub sync_queue_depth: usize,
    pub subscriber_queue_depth: usize,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// - `PORT`: listen port (default 3000, must parse)
    /// - `STATIC_DIR`: optional bundle directory
    /// - `LLM_API_KEY`, `LLM_MODEL`, `LLM_REQUEST_TIMEOUT_SECS`, `LLM_CONNECT_TIMEOUT_SECS`
    /// - `ENEMY_GROWTH`: `true`/`1` enables growth
    /// - `SYNC_QUEUE_DEPTH`, `SUBSCRIBER_QUEUE_DEPTH`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when `PORT` or `ENEMY_GROWTH` is set
    /// but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] over an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid { key: "PORT", value: raw })?,
            None => DEFAULT_PORT,
        };
        let enemy_growth = match lookup("ENEMY_GROWTH") {
            Some(raw) => parse_flag(&raw).ok_or(ConfigError::Invalid { key: "ENEMY_GROWTH", value: raw })?,
            None => false,
        };
        let oracle = lookup("LLM_API_KEY").filter(|key| !key.trim().is_empty()).map(|api_key| OracleConfig {
            api_key,
            model: lookup("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            request_timeout_secs: env_parse(&lookup, "LLM_REQUEST_TIMEOUT_SECS", DEFAULT_LLM_REQUEST_TIMEOUT_SECS),
            connect_timeout_secs: env_parse(&lookup, "LLM_CONNECT_TIMEOUT_SECS", DEFAULT_LLM_CONNECT_TIMEOUT_SECS),
        });

        Ok(Self {
            port,
            static_dir: lookup("STATIC_DIR").filter(|dir| !dir.is_empty()).map(PathBuf::from),
            oracle,
            enemy_growth,
            sync_queue_depth: env_parse(&lookup, "SYNC_QUEUE_DEPTH", DEFAULT_SYNC_QUEUE_DEPTH).max(1),
            subscriber_queue_depth: env_parse(&lookup, "SUBSCRIBER_QUEUE_DEPTH", DEFAULT_SUBSCRIBER_QUEUE_DEPTH).max(1),
        })
    }
}

impl Config {
    /// Battle tuning for rooms served by this process.
    #[must_use]
    pub fn battle_rules(&self) -> BattleRules {
        BattleRules { growth_enabled: self.enemy_growth, ..BattleRules::default() }
    }
}

/// Parse `key` or fall back to `default` when unset or malformed.
fn env_parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    lookup(key).and_then(|v| v.trim().parse::<T>().ok()).unwrap_or(default)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
