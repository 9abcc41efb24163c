//! Server options.
//!
//! Options can be built in code or loaded from TOML:
//!
//! ```toml
//! address = "0.0.0.0:8080"
//! workers = 16
//! queue_bound = 1024
//! read_timeout_secs = 5
//! ```

use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::{error::ConfigError, tasks::DEFAULT_WORKERS};

pub const DEFAULT_ADDRESS: &str = "127.0.0.1:3500";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Socket address to listen on. An `http://` prefix and trailing `/` are accepted.
    pub address: String,

    /// Number of worker threads
    pub workers: usize,

    /// Maximum number of queued requests. Unbounded when absent.
    pub queue_bound: Option<usize>,

    /// Read and write timeout of client connections. `0` disables it; reads still end when the
    /// server shuts down.
    pub read_timeout_secs: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            workers: DEFAULT_WORKERS,
            queue_bound: None,
            read_timeout_secs: 5,
        }
    }
}

impl Options {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let options: Options = toml::from_str(input)?;

        options.validate()?;

        Ok(options)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn queue_bound(mut self, bound: usize) -> Self {
        self.queue_bound = Some(bound);
        self
    }

    pub fn read_timeout_secs(mut self, secs: u64) -> Self {
        self.read_timeout_secs = secs;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::InvalidOption(
                "`workers` must be at least 1".to_string(),
            ));
        }

        if self.queue_bound == Some(0) {
            return Err(ConfigError::InvalidOption(
                "`queue_bound` must be at least 1".to_string(),
            ));
        }

        if self.socket_address().is_empty() {
            return Err(ConfigError::InvalidOption(
                "`address` must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// The address with any `http://` prefix and trailing `/` removed
    pub fn socket_address(&self) -> &str {
        let address = self.address.trim();
        let address = address.strip_prefix("http://").unwrap_or(address);

        address.trim_end_matches('/')
    }

    pub(crate) fn timeout(&self) -> Option<Duration> {
        (self.read_timeout_secs > 0).then(|| Duration::from_secs(self.read_timeout_secs))
    }
}
