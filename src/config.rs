use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::application::services::{ReconcilerSettings, RetryPolicy};
use crate::infrastructure::database::PoolSettings;
use crate::infrastructure::external_services::{EmbeddingsClientConfig, QdrantConfig};

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub db_pool_max_size: u32,
    pub qdrant_url: Url,
    pub qdrant_collection: String,
    pub qdrant_api_key: Option<String>,
    pub embeddings_service_url: Url,
    pub embedding_model_name: String,
    pub embedding_model_version: Option<String>,
    pub reconcile_max_attempts: u32,
    pub reconcile_initial_backoff_ms: u64,
    pub reconcile_backoff_factor: f64,
    pub reconcile_attempt_timeout_secs: u64,
    pub reconcile_workers: usize,
    /// Zero disables the periodic sweep.
    pub sweep_interval_secs: u64,
    pub chunk_max_chars: usize,
    pub port: u16,
}

const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
const DEFAULT_QDRANT_COLLECTION: &str = "resume_embeddings";
const DEFAULT_EMBEDDINGS_SERVICE_URL: &str = "http://localhost:8787";

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        parse_url("DATABASE_URL", &database_url, &["postgres", "postgresql"])?;

        let qdrant_url = parse_url(
            "QDRANT_URL",
            &get("QDRANT_URL").unwrap_or_else(|| DEFAULT_QDRANT_URL.to_string()),
            &["http", "https"],
        )?;
        let embeddings_service_url = parse_url(
            "EMBEDDINGS_SERVICE_URL",
            &get("EMBEDDINGS_SERVICE_URL")
                .unwrap_or_else(|| DEFAULT_EMBEDDINGS_SERVICE_URL.to_string()),
            &["http", "https"],
        )?;

        let config = Self {
            database_url,
            db_pool_max_size: parse_or(&get, "DB_POOL_MAX_SIZE", 10)?,
            qdrant_url,
            qdrant_collection: get("QDRANT_COLLECTION")
                .unwrap_or_else(|| DEFAULT_QDRANT_COLLECTION.to_string()),
            qdrant_api_key: get("QDRANT_API_KEY"),
            embeddings_service_url,
            embedding_model_name: get("EMBEDDING_MODEL_NAME")
                .unwrap_or_else(|| "default".to_string()),
            embedding_model_version: get("EMBEDDING_MODEL_VERSION"),
            reconcile_max_attempts: parse_or(&get, "RECONCILE_MAX_ATTEMPTS", 4)?,
            reconcile_initial_backoff_ms: parse_or(&get, "RECONCILE_INITIAL_BACKOFF_MS", 500)?,
            reconcile_backoff_factor: parse_or(&get, "RECONCILE_BACKOFF_FACTOR", 2.0)?,
            reconcile_attempt_timeout_secs: parse_or(&get, "RECONCILE_ATTEMPT_TIMEOUT_SECS", 30)?,
            reconcile_workers: parse_or(&get, "RECONCILE_WORKERS", 3)?,
            sweep_interval_secs: parse_or(&get, "SWEEP_INTERVAL_SECS", 300)?,
            chunk_max_chars: parse_or(&get, "CHUNK_MAX_CHARS", 2000)?,
            port: parse_or(&get, "PORT", 3000)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &'static str, value: String, reason: &str| ConfigError::Invalid {
            key,
            value,
            reason: reason.to_string(),
        };

        if self.db_pool_max_size == 0 {
            return Err(invalid("DB_POOL_MAX_SIZE", "0".into(), "must be positive"));
        }
        if self.reconcile_max_attempts == 0 {
            return Err(invalid("RECONCILE_MAX_ATTEMPTS", "0".into(), "must be positive"));
        }
        if !self.reconcile_backoff_factor.is_finite() || self.reconcile_backoff_factor < 1.0 {
            return Err(invalid(
                "RECONCILE_BACKOFF_FACTOR",
                self.reconcile_backoff_factor.to_string(),
                "must be at least 1.0",
            ));
        }
        if self.reconcile_attempt_timeout_secs == 0 {
            return Err(invalid(
                "RECONCILE_ATTEMPT_TIMEOUT_SECS",
                "0".into(),
                "must be positive",
            ));
        }
        if self.reconcile_workers == 0 {
            return Err(invalid("RECONCILE_WORKERS", "0".into(), "must be positive"));
        }
        if self.chunk_max_chars == 0 {
            return Err(invalid("CHUNK_MAX_CHARS", "0".into(), "must be positive"));
        }
        Ok(())
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_size: self.db_pool_max_size,
            ..PoolSettings::default()
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.reconcile_max_attempts,
            initial_backoff: Duration::from_millis(self.reconcile_initial_backoff_ms),
            backoff_factor: self.reconcile_backoff_factor,
            attempt_timeout: Duration::from_secs(self.reconcile_attempt_timeout_secs),
            ..RetryPolicy::default()
        }
    }

    pub fn reconciler_settings(&self) -> ReconcilerSettings {
        ReconcilerSettings {
            retry: self.retry_policy(),
            chunk_max_chars: self.chunk_max_chars,
            ..ReconcilerSettings::default()
        }
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }

    pub fn qdrant_config(&self) -> QdrantConfig {
        QdrantConfig {
            base_url: self.qdrant_url.clone(),
            collection: self.qdrant_collection.clone(),
            api_key: self.qdrant_api_key.clone(),
            timeout_secs: self.reconcile_attempt_timeout_secs,
        }
    }

    pub fn embeddings_client_config(&self) -> EmbeddingsClientConfig {
        EmbeddingsClientConfig {
            service_url: self.embeddings_service_url.as_str().trim_end_matches('/').to_string(),
            model_name: self.embedding_model_name.clone(),
            model_version: self.embedding_model_version.clone(),
            timeout_secs: self.reconcile_attempt_timeout_secs,
            ..EmbeddingsClientConfig::default()
        }
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

fn parse_url(key: &'static str, value: &str, schemes: &[&str]) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })?;

    if !schemes.contains(&url.scheme()) {
        return Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
            reason: format!("unsupported scheme {}", url.scheme()),
        });
    }
    Ok(url)
}
