//! Service configuration, loaded from `BRIDGE_*` environment variables at
//! startup. Missing or malformed required values abort startup; nothing here
//! is validated lazily.

use crate::credentials::validate_key;
use anyhow::{bail, Context, Result};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_OAUTH_BASE_URL: &str = "https://oauth.bitrix.info";
const DEFAULT_CLIENT_BASE_URL: &str = "http://localhost:5173";
const DEFAULT_WEBHOOK_DB_PATH: &str = "webhook_logs.db";
const DEFAULT_MIN_CALL_INTERVAL_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds on
    pub port: u16,
    /// Frontend base URL the OAuth callback redirects back to
    pub client_base_url: String,
    /// Redis connection URL
    pub redis_url: String,
    /// 64-hex-char master key for token encryption
    pub encryption_key: String,
    /// Shared secret expected on inbound webhooks; unset rejects all
    pub webhook_secret: Option<String>,
    /// OAuth application credentials issued by the provider
    pub bitrix_client_id: String,
    pub bitrix_client_secret: String,
    /// Provider OAuth endpoint base
    pub bitrix_oauth_url: String,
    /// SQLite path for the webhook audit log
    pub webhook_db_path: String,
    /// Minimum spacing between outbound CRM calls
    pub min_call_interval_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = match std::env::var("BRIDGE_PORT") {
            Ok(v) => v
                .parse::<u16>()
                .with_context(|| format!("BRIDGE_PORT is not a valid port: '{}'", v))?,
            Err(_) => DEFAULT_PORT,
        };

        let encryption_key =
            required("BRIDGE_ENCRYPTION_KEY").context("Token encryption key is required")?;
        validate_key(&encryption_key)
            .context("BRIDGE_ENCRYPTION_KEY must be 64 hex characters")?;

        let config = Self {
            port,
            client_base_url: optional("BRIDGE_CLIENT_BASE_URL")
                .unwrap_or_else(|| DEFAULT_CLIENT_BASE_URL.to_string()),
            redis_url: redis_url_from_env()?,
            encryption_key,
            webhook_secret: optional("BRIDGE_WEBHOOK_SECRET"),
            bitrix_client_id: required("BRIDGE_BITRIX_CLIENT_ID")?,
            bitrix_client_secret: required("BRIDGE_BITRIX_CLIENT_SECRET")?,
            bitrix_oauth_url: optional("BRIDGE_BITRIX_OAUTH_URL")
                .unwrap_or_else(|| DEFAULT_OAUTH_BASE_URL.to_string()),
            webhook_db_path: optional("BRIDGE_WEBHOOK_DB_PATH")
                .unwrap_or_else(|| DEFAULT_WEBHOOK_DB_PATH.to_string()),
            min_call_interval_ms: match optional("BRIDGE_MIN_CALL_INTERVAL_MS") {
                Some(v) => v
                    .parse::<u64>()
                    .with_context(|| format!("BRIDGE_MIN_CALL_INTERVAL_MS is not a number: '{}'", v))?,
                None => DEFAULT_MIN_CALL_INTERVAL_MS,
            },
        };
        Ok(config)
    }
}

fn required(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("Required environment variable {} is not set", name),
    }
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// `BRIDGE_REDIS_URL` wins; otherwise the URL is assembled from
/// host/port/password parts.
fn redis_url_from_env() -> Result<String> {
    if let Some(url) = optional("BRIDGE_REDIS_URL") {
        return Ok(url);
    }

    let host = optional("BRIDGE_REDIS_HOST").unwrap_or_else(|| "127.0.0.1".to_string());
    let port = match optional("BRIDGE_REDIS_PORT") {
        Some(v) => v
            .parse::<u16>()
            .with_context(|| format!("BRIDGE_REDIS_PORT is not a valid port: '{}'", v))?,
        None => 6379,
    };

    Ok(match optional("BRIDGE_REDIS_PASSWORD") {
        Some(password) => format!("redis://:{}@{}:{}", password, host, port),
        None => format!("redis://{}:{}", host, port),
    })
}
