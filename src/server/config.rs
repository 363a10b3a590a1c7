//! Server configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::server::error::Error;

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// The host name or address to bind to.
    pub host: String,
    /// The port to bind to.
    pub port: u16,
    /// The number of connections serviced concurrently.
    pub workers: usize,
    /// Upper bound of the single receive made per connection.
    pub read_buffer_size: usize,
    /// Directory used by the file routes, if any.
    pub resource_directory: Option<PathBuf>,
    /// How long shutdown waits for in-flight connections.
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 4221,
            workers: 10,
            read_buffer_size: 5_000_000,
            resource_directory: None,
            shutdown_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    /// Create a configuration for the given host and port, other fields defaulted.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Load a configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read(path)?;
        let config: Self = serde_json::from_slice(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would leave the server unable to answer.
    pub fn validate(&self) -> Result<(), Error> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig("workers must be at least 1".to_string()));
        }
        if self.read_buffer_size == 0 {
            return Err(Error::InvalidConfig("read_buffer_size must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_read_buffer_size(mut self, read_buffer_size: usize) -> Self {
        self.read_buffer_size = read_buffer_size;
        self
    }

    pub fn with_resource_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.resource_directory = Some(directory.into());
        self
    }

    /// The `host:port` string the listener binds to.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}
