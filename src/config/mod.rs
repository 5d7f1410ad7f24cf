//! Configuration management for the budget tracker.
//!
//! Settings come from `config.toml` (path overridable with `BUDGET_TRACKER_CONFIG`) and
//! environment variables, optionally loaded from a `.env` file by the binary.

/// Budget seed definitions from config.toml
pub mod budgets;
/// Database connection and table creation
pub mod database;
/// Engine tuning (queue size, collaborator timeouts)
pub mod engine;

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, warn};

pub use budgets::BudgetConfig;
pub use engine::EngineConfig;

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "BUDGET_TRACKER_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Structure of the whole config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Engine settings, all optional
    #[serde(default)]
    pub engine: EngineConfig,
    /// Budgets to seed into the store on startup
    #[serde(default)]
    pub budgets: Vec<BudgetConfig>,
}

impl AppConfig {
    /// Rejects settings the engine cannot run with.
    ///
    /// # Errors
    /// Returns [`Error::Config`] for an invalid engine section or budget seed.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        for budget in &self.budgets {
            budget.to_budget()?;
        }
        Ok(())
    }
}

/// Parses configuration from a TOML string.
///
/// # Errors
/// Returns [`Error::Config`] if the TOML is malformed or fails validation.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read, the TOML syntax is invalid, or a value
/// fails validation.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {path_ref:?}: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads the application configuration from `$BUDGET_TRACKER_CONFIG` or `./config.toml`.
///
/// A missing file is not an error: defaults are used and no budgets are seeded.
///
/// # Errors
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if !Path::new(&path).exists() {
        warn!("No configuration file at {path}, using defaults");
        return Ok(AppConfig::default());
    }
    load_config(&path)
}
