use crate::infrastructure::cache::DEFAULT_TTL_SECS;
use crate::infrastructure::resilience::{BreakerSettings, RetryPolicy};
use clap::Args;
use std::path::PathBuf;
use std::time::Duration;

/// Process configuration. Every flag falls back to an environment variable.
#[derive(Args, Debug, Clone)]
pub struct AppConfig {
    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "PIXFLOW_DB_PATH", global = true)]
    pub db_path: Option<PathBuf>,

    /// JSON seed file applied to the store at startup.
    #[arg(long, env = "PIXFLOW_SEED", global = true)]
    pub seed: Option<PathBuf>,

    #[arg(long, env = "LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, env = "LOG_JSON", global = true)]
    pub log_json: bool,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = DEFAULT_TTL_SECS)]
    pub cache_ttl_secs: u64,

    #[arg(long, env = "MAX_RETRIES", default_value_t = 3)]
    pub max_retries: u32,

    #[arg(long, env = "INITIAL_BACKOFF_MS", default_value_t = 100)]
    pub initial_backoff_ms: u64,

    #[arg(long, env = "BREAKER_OPEN_SECS", default_value_t = 10)]
    pub breaker_open_secs: u64,

    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 10)]
    pub http_timeout_secs: u64,

    /// Concurrent calls allowed per upstream service.
    #[arg(long, env = "MAX_CONCURRENCY", default_value_t = 50)]
    pub max_concurrency: usize,

    #[arg(long, env = "PROFILE_API_URL", default_value = "http://localhost:8081")]
    pub profile_api_url: String,

    #[arg(long, env = "TRANSACTIONS_API_URL", default_value = "http://localhost:8082")]
    pub transactions_api_url: String,

    #[arg(long, env = "AGENT_API_URL", default_value = "http://localhost:8090")]
    pub agent_api_url: String,
}

impl AppConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
        }
    }

    pub fn breaker_settings(&self) -> BreakerSettings {
        BreakerSettings {
            open_timeout: Duration::from_secs(self.breaker_open_secs),
            ..Default::default()
        }
    }

    /// Half the cache TTL, at least one second.
    pub fn cache_sweep_interval(&self) -> Duration {
        Duration::from_secs((self.cache_ttl_secs / 2).max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: AppConfig,
    }

    #[test]
    fn test_defaults() {
        let cli = TestCli::try_parse_from(["pixflow"]).unwrap();
        let config = cli.config;
        assert!(config.listen_addr().ends_with(":8080"));
        assert_eq!(config.cache_ttl_secs, 300);
        assert_eq!(config.retry_policy().max_retries, 3);
        assert_eq!(
            config.retry_policy().initial_backoff,
            Duration::from_millis(100)
        );
        assert_eq!(config.breaker_settings().open_timeout, Duration::from_secs(10));
        assert_eq!(config.breaker_settings().min_requests, 5);
        assert_eq!(config.cache_sweep_interval(), Duration::from_secs(150));
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = TestCli::try_parse_from([
            "pixflow",
            "--port",
            "9000",
            "--max-retries",
            "1",
            "--cache-ttl-secs",
            "1",
        ])
        .unwrap();
        assert_eq!(cli.config.port, 9000);
        assert_eq!(cli.config.retry_policy().max_retries, 1);
        assert_eq!(cli.config.cache_sweep_interval(), Duration::from_secs(1));
    }
}
