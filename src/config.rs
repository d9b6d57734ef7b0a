//! # Command Sync Configuration
//!
//! Layered configuration for queue consumers and logging. Values come from an
//! optional TOML file, overridden by `COMMAND_SYNC__*` environment variables
//! (for example `COMMAND_SYNC__QUEUE__MAX_IN_FLIGHT=2`).
//!
//! ```rust,no_run
//! use command_sync::config::CommandSyncConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CommandSyncConfig::load(None)?;
//! println!("max in flight: {:?}", config.queue.max_in_flight);
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CommandSyncError, CommandSyncResult};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "COMMAND_SYNC";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandSyncConfig {
    /// Dispatch and retry settings applied to every consumer
    pub queue: QueueConfig,

    /// Structured logging settings
    pub logging: LoggingConfig,
}

/// Queue consumer settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Upper bound on commands in `Processing` at once; `None` means unbounded
    pub max_in_flight: Option<usize>,

    /// Attempt-count retry limit; `None` disables retries
    pub max_retries: Option<u32>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_in_flight: Some(4),
            max_retries: Some(3),
        }
    }
}

/// Logging settings consumed by [`crate::logging::init_structured_logging_with`]
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit filter directive; falls back to the environment default
    pub level: Option<String>,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl CommandSyncConfig {
    /// Load configuration from an optional file plus environment overrides
    pub fn load(path: Option<&Path>) -> CommandSyncResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), "Loading command sync configuration file");
            builder = builder.add_source(config::File::from(path.to_path_buf()).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let loaded: CommandSyncConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// Reject settings that would stall every consumer
    pub fn validate(&self) -> CommandSyncResult<()> {
        if self.queue.max_in_flight == Some(0) {
            return Err(CommandSyncError::Configuration(
                "queue.max_in_flight must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
