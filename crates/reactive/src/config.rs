//! Configuration options for a live select session.

use livesel_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Connection parameters passed to the query executor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Default database for triggers that do not name one.
    pub database: Option<String>,
    /// Use a connection pool instead of a single connection.
    pub pool: bool,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            database: None,
            pool: false,
        }
    }
}

/// Configuration of a `LiveSelect`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    pub connection: ConnectionSettings,
    /// Replication client identity; must be unique among the server's
    /// replicas.
    pub server_id: u32,
    /// Minimum time between two executions of the same query.
    pub min_interval_ms: Option<u64>,
    /// Keep checking incoming events against a cache whose throttle timer is
    /// already armed.
    pub check_condition_when_queued: bool,
    /// How often stream readiness is polled.
    pub ready_poll_interval_ms: u64,
    /// How long to wait for the stream to become ready.
    pub ready_timeout_ms: u64,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionSettings::default(),
            server_id: 1,
            min_interval_ms: None,
            check_condition_when_queued: false,
            ready_poll_interval_ms: 40,
            ready_timeout_ms: 6000,
        }
    }
}

impl LiveConfig {
    /// Parses a TOML document and validates it.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: LiveConfig = toml::from_str(content)
            .map_err(|e| Error::serialization(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::invalid_config(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Validates configuration settings.
    pub fn validate(&self) -> Result<()> {
        if self.server_id == 0 {
            return Err(Error::invalid_config("server_id must be non-zero"));
        }
        if self.ready_poll_interval_ms == 0 {
            return Err(Error::invalid_config("ready_poll_interval_ms must be non-zero"));
        }
        if self.ready_timeout_ms == 0 {
            return Err(Error::invalid_config("ready_timeout_ms must be non-zero"));
        }
        if matches!(self.connection.database.as_deref(), Some("")) {
            return Err(Error::invalid_config("connection.database must not be empty"));
        }
        Ok(())
    }

    /// Minimum interval between executions of one query, if throttled.
    pub fn min_interval(&self) -> Option<Duration> {
        self.min_interval_ms.map(Duration::from_millis)
    }

    pub fn ready_poll_interval(&self) -> Duration {
        Duration::from_millis(self.ready_poll_interval_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    /// Default database for triggers.
    pub fn default_database(&self) -> Option<&str> {
        self.connection.database.as_deref()
    }

    /// Set the connection parameters
    pub fn with_connection(mut self, connection: ConnectionSettings) -> Self {
        self.connection = connection;
        self
    }

    /// Set the default database
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.connection.database = Some(database.into());
        self
    }

    /// Enable or disable connection pooling
    pub fn with_pool(mut self, pool: bool) -> Self {
        self.connection.pool = pool;
        self
    }

    /// Set the replication identity
    pub fn with_server_id(mut self, server_id: u32) -> Self {
        self.server_id = server_id;
        self
    }

    /// Throttle re-execution of each query
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn with_check_condition_when_queued(mut self, check: bool) -> Self {
        self.check_condition_when_queued = check;
        self
    }

    /// Set readiness polling interval and timeout
    pub fn with_ready_timing(mut self, poll_interval: Duration, timeout: Duration) -> Self {
        self.ready_poll_interval_ms = poll_interval.as_millis() as u64;
        self.ready_timeout_ms = timeout.as_millis() as u64;
        self
    }
}
