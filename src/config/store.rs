//! Store engine configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

use super::parse::{env_bool, env_duration, env_or, env_parse};
use super::ConfigError;

/// Default DSN: the in-process store.
pub const DEFAULT_DSN: &str = "memory://";

/// Default maximum number of worker threads.
pub const DEFAULT_WORKER_COUNT_MAX: usize = 2;

/// Default wait for the first worker to report its connection.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Engine configuration: connection settings and pool bound.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Opaque connection configuration handed to the backend.
    pub dsn: String,
    /// Resolved worker bound (never zero).
    worker_count_max: NonZeroUsize,
    /// Capture a backtrace at every submission.
    pub capture_trace: bool,
    /// How long `Manager::connect` waits for readiness (None = forever).
    pub ready_timeout: Option<Duration>,
}

impl StoreConfig {
    /// Configuration with defaults for everything but the DSN.
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            worker_count_max: NonZeroUsize::new(DEFAULT_WORKER_COUNT_MAX).unwrap_or(NonZeroUsize::MIN),
            capture_trace: false,
            ready_timeout: Some(DEFAULT_READY_TIMEOUT),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            dsn: env_or("STORE_DSN", DEFAULT_DSN),
            worker_count_max: Self::parse_worker_count_max()?,
            capture_trace: env_bool("STORE_CAPTURE_TRACE", false),
            ready_timeout: env_duration("STORE_READY_TIMEOUT", "30s")?,
        })
    }

    /// Set the worker bound. Zero is raised to one.
    pub fn with_worker_count_max(mut self, max: usize) -> Self {
        self.worker_count_max = NonZeroUsize::new(max).unwrap_or(NonZeroUsize::MIN);
        self
    }

    pub fn with_capture_trace(mut self, enabled: bool) -> Self {
        self.capture_trace = enabled;
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// Get the worker bound (pre-computed, zero-cost).
    #[inline]
    pub fn worker_count_max(&self) -> usize {
        self.worker_count_max.get()
    }

    fn parse_worker_count_max() -> Result<NonZeroUsize, ConfigError> {
        let raw: usize = env_parse("STORE_WORKERS_MAX", DEFAULT_WORKER_COUNT_MAX)?;

        // Resolve 0 to CPU count
        let count = if raw == 0 { num_cpus::get() } else { raw };

        NonZeroUsize::new(count).ok_or_else(|| ConfigError::Invalid {
            key: "STORE_WORKERS_MAX".into(),
            message: "worker count cannot be zero".into(),
        })
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DSN)
    }
}
