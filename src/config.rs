use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::FailurePolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub schema: SchemaConfig,
    pub engine: EngineConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Size of the worker thread pool serving requests
    pub workers: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    pub dir: PathBuf,
    pub file_prefix: String,
    pub file_extension: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub url: String,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Try to load from .env file first so its values take part in the overrides
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8082)?
            .set_default("server.workers", num_cpus::get() as i64)?
            .set_default("schema.dir", "schema")?
            .set_default("schema.file_prefix", "mongo_")?
            .set_default("schema.file_extension", "xml")?
            .set_default("engine.url", "http://localhost:8083")?
            .set_default("cache.failure_policy", "retry")?
            .set_default("logging.level", "info")?;

        if let Ok(host) = env::var("HOST") {
            builder = builder.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            builder = builder.set_override("server.port", port)?;
        }

        if let Ok(workers) = env::var("SERVER_WORKERS") {
            builder = builder.set_override("server.workers", workers)?;
        }

        if let Ok(dir) = env::var("SCHEMA_DIR") {
            builder = builder.set_override("schema.dir", dir)?;
        }

        if let Ok(url) = env::var("ENGINE_URL") {
            builder = builder.set_override("engine.url", url)?;
        }

        if let Ok(timeout) = env::var("ENGINE_TIMEOUT_SECS") {
            builder = builder.set_override("engine.request_timeout_secs", timeout)?;
        }

        if let Ok(policy) = env::var("CACHE_FAILURE_POLICY") {
            builder = builder.set_override("cache.failure_policy", policy)?;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            builder = builder.set_override("logging.level", log_level)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        if config.server.workers == 0 {
            return Err(config::ConfigError::Message(
                "server.workers must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn engine_timeout(&self) -> Option<Duration> {
        self.engine.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        // Clear environment variables for this test
        env::remove_var("HOST");
        env::remove_var("PORT");
        env::remove_var("SCHEMA_DIR");
        env::remove_var("CACHE_FAILURE_POLICY");
        env::remove_var("ENGINE_TIMEOUT_SECS");

        let config = Config::from_env();
        assert!(config.is_ok());

        let config = config.unwrap();
        assert_eq!(config.server.port, 8082);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(config.server.workers >= 1);
        assert_eq!(config.schema.dir, PathBuf::from("schema"));
        assert_eq!(config.schema.file_prefix, "mongo_");
        assert_eq!(config.cache.failure_policy, FailurePolicy::Retry);
        assert!(config.engine_timeout().is_none());
        assert_eq!(config.server_address(), "0.0.0.0:8082");
    }
}
