// src/config.rs

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use dotenvy::dotenv;
use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the comment server. `None` runs against the in-memory store.
    pub comment_api_url: Option<Url>,
    pub comment_api_token: Option<String>,
    pub jwt_secret: String,
    pub bind_addr: SocketAddr,
    /// Replies at or beyond this depth are not offered a reply action.
    pub max_reply_depth: usize,
    pub max_body_length: u64,
    /// Most lessons held in memory at once.
    pub thread_cache_capacity: u64,
    /// How long a loaded lesson is kept before it is seeded again.
    pub thread_cache_ttl: Duration,
    pub rust_log: String,
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        dotenv().ok();

        let comment_api_url = match env::var("COMMENT_API_URL") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                Url::parse(raw.trim())
                    .map_err(|e| config_error("COMMENT_API_URL", e))?,
            ),
            _ => None,
        };

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| AppError::InternalServerError("JWT_SECRET must be set".to_string()))?;

        let bind_addr = env_or("BIND_ADDR", "0.0.0.0:3000")
            .parse()
            .map_err(|e| config_error("BIND_ADDR", e))?;

        let max_reply_depth = env_or("MAX_REPLY_DEPTH", "3")
            .parse()
            .map_err(|e| config_error("MAX_REPLY_DEPTH", e))?;

        let max_body_length = env_or("MAX_BODY_LENGTH", "1000")
            .parse()
            .map_err(|e| config_error("MAX_BODY_LENGTH", e))?;

        let thread_cache_capacity = env_or("THREAD_CACHE_CAPACITY", "1000")
            .parse()
            .map_err(|e| config_error("THREAD_CACHE_CAPACITY", e))?;

        let thread_cache_ttl = env_or("THREAD_CACHE_TTL_SECS", "300")
            .parse()
            .map(Duration::from_secs)
            .map_err(|e| config_error("THREAD_CACHE_TTL_SECS", e))?;

        Ok(Self {
            comment_api_url,
            comment_api_token: env::var("COMMENT_API_TOKEN").ok(),
            jwt_secret,
            bind_addr,
            max_reply_depth,
            max_body_length,
            thread_cache_capacity,
            thread_cache_ttl,
            rust_log: env_or("RUST_LOG", "info"),
            log_dir: env_or("LOG_DIR", "logs"),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            comment_api_url: None,
            comment_api_token: None,
            jwt_secret: String::new(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            max_reply_depth: 3,
            max_body_length: 1000,
            thread_cache_capacity: 1000,
            thread_cache_ttl: Duration::from_secs(300),
            rust_log: "info".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn config_error(key: &str, err: impl std::fmt::Display) -> AppError {
    AppError::InternalServerError(format!("invalid {}: {}", key, err))
}
