//! Configuration loading
//!
//! Layers, lowest precedence first:
//! 1. built-in defaults
//! 2. `keel.toml` in the working directory, or the file named by
//!    `KEEL_CONFIG_PATH` / the builder's `config_path`
//! 3. `KEEL_*` environment variables, nested keys split on `__`
//!    (`KEEL_SCHEDULER__ENABLED=false`)
//! 4. builder overrides (CLI flags)
//!
//! A `.env` file is loaded into the environment first when present.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const ENV_PREFIX: &str = "KEEL";
const CONFIG_PATH_VAR: &str = "KEEL_CONFIG_PATH";
const DEFAULT_CONFIG_NAME: &str = "keel";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Program JSON to load
    #[serde(default)]
    pub program: Option<PathBuf>,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Arm job timers and listeners on `Application::start`
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter used when `RUST_LOG` is unset
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

fn default_true() -> bool {
    true
}

fn default_filter() -> String {
    "info".to_string()
}

impl Config {
    /// Load from file and environment with no overrides
    pub fn load() -> Result<Self> {
        Self::builder().build()
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    program: Option<PathBuf>,
    scheduler_enabled: Option<bool>,
    log_filter: Option<String>,
}

impl ConfigBuilder {
    /// Config file to read instead of `./keel.toml`; it must exist
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn program(mut self, path: Option<PathBuf>) -> Self {
        self.program = path;
        self
    }

    pub fn scheduler_enabled(mut self, enabled: Option<bool>) -> Self {
        self.scheduler_enabled = enabled;
        self
    }

    pub fn log_filter(mut self, filter: Option<String>) -> Self {
        self.log_filter = filter;
        self
    }

    pub fn build(self) -> Result<Config> {
        // Missing .env is fine
        let _ = dotenvy::dotenv();

        let defaults = Config::default();
        let mut builder = config::Config::builder()
            .set_default("scheduler.enabled", defaults.scheduler.enabled)?
            .set_default("logging.filter", defaults.logging.filter)?;

        let config_path = self
            .config_path
            .or_else(|| std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from));
        builder = match &config_path {
            Some(path) => builder.add_source(config::File::from(path.as_path()).required(true)),
            None => builder.add_source(config::File::with_name(DEFAULT_CONFIG_NAME).required(false)),
        };

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(program) = self.program {
            builder = builder.set_override("program", program.to_string_lossy().to_string())?;
        }
        if let Some(enabled) = self.scheduler_enabled {
            builder = builder.set_override("scheduler.enabled", enabled)?;
        }
        if let Some(filter) = self.log_filter {
            builder = builder.set_override("logging.filter", filter)?;
        }

        let config: Config = builder
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        tracing::debug!(path = ?config_path, "configuration loaded");
        Ok(config)
    }
}
