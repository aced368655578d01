// src/config.rs

use std::{env, path::PathBuf, str::FromStr, time::Duration};

use dotenvy::dotenv;
use url::Url;

pub const DEFAULT_CHECKPOINT_DEBOUNCE_MS: u64 = 2_000;
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_FINAL_SYNC_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:3000/";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub rust_log: String,
    pub bind_addr: String,
    pub session: SessionSettings,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        Self {
            database_url,
            rust_log,
            bind_addr,
            session: SessionSettings::from_env(),
        }
    }
}

/// Knobs of the client-side exam session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Quiet period after the last answer before the checkpoint is written.
    pub checkpoint_debounce: Duration,
    /// Period of the background sync while an exam is running.
    pub sync_interval: Duration,
    /// Budget for the send that accompanies a terminal transition.
    pub final_sync_timeout: Duration,
    /// Per-request limit for every call to the exam server.
    pub request_timeout: Duration,
    /// Directory holding one checkpoint file per exam.
    pub checkpoint_dir: PathBuf,
    /// Base URL of the exam server.
    pub api_base_url: Url,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            checkpoint_debounce: Duration::from_millis(DEFAULT_CHECKPOINT_DEBOUNCE_MS),
            sync_interval: Duration::from_secs(DEFAULT_SYNC_INTERVAL_SECS),
            final_sync_timeout: Duration::from_secs(DEFAULT_FINAL_SYNC_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            checkpoint_dir: PathBuf::from(".exam-checkpoints"),
            api_base_url: Url::parse(DEFAULT_API_URL).expect("default API url is valid"),
        }
    }
}

impl SessionSettings {
    pub fn from_env() -> Self {
        dotenv().ok();
        let defaults = Self::default();

        Self {
            checkpoint_debounce: env_parse("CHECKPOINT_DEBOUNCE_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.checkpoint_debounce),
            sync_interval: env_parse("SYNC_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sync_interval),
            final_sync_timeout: env_parse("FINAL_SYNC_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.final_sync_timeout),
            request_timeout: env_parse("REQUEST_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            checkpoint_dir: env::var("CHECKPOINT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.checkpoint_dir),
            api_base_url: env_parse("EXAM_API_URL").unwrap_or(defaults.api_base_url),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("Ignoring unparseable {}={:?}, using default", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_defaults() {
        let settings = SessionSettings::default();
        assert_eq!(settings.checkpoint_debounce, Duration::from_secs(2));
        assert_eq!(settings.sync_interval, Duration::from_secs(10));
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
        assert_eq!(settings.api_base_url.as_str(), DEFAULT_API_URL);
    }
}
