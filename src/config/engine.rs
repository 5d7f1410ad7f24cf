//! Engine tuning from the `[engine]` section of config.toml.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Engine settings; every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of the bounded inbound event channel
    pub queue_capacity: usize,
    /// Upper bound on a single store or sink call, in milliseconds
    pub call_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            call_timeout_ms: 5_000,
        }
    }
}

impl EngineConfig {
    /// Per-call timeout as a [`Duration`].
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// # Errors
    /// Returns [`Error::Config`] when either value is zero.
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(Error::Config {
                message: "engine.queue_capacity must be at least 1".to_string(),
            });
        }
        if self.call_timeout_ms == 0 {
            return Err(Error::Config {
                message: "engine.call_timeout_ms must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
