//! Configuration module for thread_store.
//!
//! This module provides centralized configuration loading from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use thread_store::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("DSN: {}", config.store.dsn);
//! println!("Max workers: {}", config.store.worker_count_max());
//! ```

mod error;
mod logging;
mod parse;
mod store;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use parse::parse_duration;
pub use store::StoreConfig;

/// Complete application configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Engine configuration.
    pub store: StoreConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            store: StoreConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  DSN: {}", self.store.dsn);
        info!("  Max workers: {}", self.store.worker_count_max());

        match self.store.ready_timeout {
            Some(timeout) => info!("  Ready timeout: {}ms", timeout.as_millis()),
            None => info!("  Ready timeout: disabled"),
        }

        if self.store.capture_trace {
            info!("  Submission traces: enabled");
        }

        info!("  Log format: {:?}", self.logging.format);
    }
}
