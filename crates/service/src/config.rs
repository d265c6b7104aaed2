use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use refcache_store::CacheError;
use refcache_store_redis::RedisConfig;

/// Probe timeout used when `ping_timeout_secs` is not set.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(30);

/// Top-level configuration for a cache service, loaded from TOML.
///
/// # Example
///
/// ```toml
/// trace_name = "orders"
/// backend = "redis"
/// address = "127.0.0.1:6379"
/// password = "secret"
/// database = 1
/// ping_timeout_secs = 10
///
/// [logging]
/// filter = "info,refcache=debug"
/// ```
#[derive(Deserialize)]
pub struct CacheConfig {
    /// Name attached to every log line of the service.
    #[serde(default = "default_trace_name")]
    pub trace_name: String,

    /// Which backend to use: `"memory"` or `"redis"`.
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Store address as `host:port`.
    #[serde(default = "default_address")]
    pub address: String,

    /// ACL username for the store.
    pub username: Option<String>,

    /// Password for the store.
    pub password: Option<String>,

    /// Logical database index.
    #[serde(default)]
    pub database: i64,

    /// Timeout for the connectivity probe run at start-up. Defaults to 30s.
    pub ping_timeout_secs: Option<u64>,

    /// Number of pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Timeout for acquiring or creating a pooled connection.
    #[serde(default = "default_connection_timeout_secs")]
    pub connection_timeout_secs: u64,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            trace_name: default_trace_name(),
            backend: default_backend(),
            address: default_address(),
            username: None,
            password: None,
            database: 0,
            ping_timeout_secs: None,
            pool_size: default_pool_size(),
            connection_timeout_secs: default_connection_timeout_secs(),
            logging: LoggingConfig::default(),
        }
    }
}

impl fmt::Debug for CacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheConfig")
            .field("trace_name", &self.trace_name)
            .field("backend", &self.backend)
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("ping_timeout_secs", &self.ping_timeout_secs)
            .field("pool_size", &self.pool_size)
            .field("connection_timeout_secs", &self.connection_timeout_secs)
            .field("logging", &self.logging)
            .finish()
    }
}

impl CacheConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, CacheError> {
        toml::from_str(contents).map_err(|e| CacheError::Config(e.to_string()))
    }

    /// Load a configuration file, or use defaults if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| CacheError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    /// Timeout for the start-up connectivity probe.
    pub fn ping_timeout(&self) -> Duration {
        self.ping_timeout_secs
            .map_or(DEFAULT_PING_TIMEOUT, Duration::from_secs)
    }

    /// Build the Redis backend configuration from this file.
    pub fn redis_config(&self) -> RedisConfig {
        RedisConfig {
            address: self.address.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            database: self.database,
            pool_size: self.pool_size,
            connection_timeout: Duration::from_secs(self.connection_timeout_secs),
        }
    }
}

fn default_trace_name() -> String {
    "refcache".to_owned()
}

fn default_backend() -> String {
    "memory".to_owned()
}

fn default_address() -> String {
    "127.0.0.1:6379".to_owned()
}

fn default_pool_size() -> usize {
    10
}

fn default_connection_timeout_secs() -> u64 {
    5
}

fn default_filter() -> String {
    "info".to_owned()
}
