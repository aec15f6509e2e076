//! Initialization for Parley hosts
//!
//! Loads configuration and installs the tracing subscriber. Hosts embedding
//! the interpreter call this once before building a
//! [`DialogueContext`](crate::runtime::DialogueContext); the CLI calls it
//! before dispatching a command.
//!
//! # Example
//!
//! ```rust,ignore
//! use parley_core::init::InitBuilder;
//!
//! // Defaults: ./parley.toml if present, RUST_LOG or the configured filter
//! InitBuilder::new().init()?;
//!
//! // Explicit config file and log filter
//! InitBuilder::new()
//!     .config_path("game/parley.toml")
//!     .log_filter("parley_core=debug")
//!     .init()?;
//! ```

use std::sync::OnceLock;

use anyhow::{anyhow, Context, Result};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, LoggingConfig};

/// Global initialization state
static INIT_STATE: OnceLock<InitState> = OnceLock::new();

#[derive(Debug)]
struct InitState {
    config: Config,
}

/// Options for initializing Parley
#[derive(Debug, Clone, Default)]
pub struct InitOptions {
    /// Config file path (overrides `PARLEY_CONFIG_PATH` and `./parley.toml`)
    pub config_path: Option<String>,

    /// Tracing filter directive (overrides `RUST_LOG` and the config file)
    pub log_filter: Option<String>,

    /// Skip installing the tracing subscriber (the host has its own)
    pub skip_logging: bool,
}

/// Builder for constructing InitOptions
pub struct InitBuilder {
    options: InitOptions,
}

impl InitBuilder {
    pub fn new() -> Self {
        Self {
            options: InitOptions::default(),
        }
    }

    pub fn config_path(mut self, path: impl Into<String>) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.options.log_filter = Some(filter.into());
        self
    }

    pub fn skip_logging(mut self, skip: bool) -> Self {
        self.options.skip_logging = skip;
        self
    }

    /// Initialize Parley with the configured options
    pub fn init(self) -> Result<&'static Config> {
        initialize(self.options)
    }
}

impl Default for InitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Initialize Parley with the given options
///
/// - Loads and validates configuration
/// - Installs a `tracing` fmt subscriber
/// - Stores the configuration for [`get_config`]
///
/// Calling this more than once is safe; later calls return the
/// configuration stored by the first.
pub fn initialize(options: InitOptions) -> Result<&'static Config> {
    if let Some(state) = INIT_STATE.get() {
        return Ok(&state.config);
    }

    let config = Config::load_from(options.config_path.as_deref())
        .context("Failed to load configuration")?;

    if !options.skip_logging {
        install_logging(&config.logging, options.log_filter.as_deref())?;
    }

    let _ = INIT_STATE.set(InitState { config });
    let state = INIT_STATE
        .get()
        .ok_or_else(|| anyhow!("Initialization state was not stored"))?;
    debug!(
        continue_on_error = state.config.runtime.continue_on_error,
        cache_capacity = state.config.analyzer.cache_capacity,
        "Parley initialized"
    );
    Ok(&state.config)
}

/// Filter precedence: explicit override, then `RUST_LOG`, then the config
fn env_filter(logging: &LoggingConfig, override_filter: Option<&str>) -> Result<EnvFilter> {
    if let Some(filter) = override_filter {
        return EnvFilter::try_new(filter).with_context(|| format!("Invalid log filter '{}'", filter));
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&logging.filter)
        .with_context(|| format!("Invalid log filter '{}' in configuration", logging.filter))
}

fn install_logging(logging: &LoggingConfig, override_filter: Option<&str>) -> Result<()> {
    let filter = env_filter(logging, override_filter)?;
    // A subscriber installed by the host (or an earlier call) wins
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(logging.with_target)
        .with_writer(std::io::stderr)
        .try_init();
    Ok(())
}

/// Check if Parley has been initialized
pub fn is_initialized() -> bool {
    INIT_STATE.get().is_some()
}

/// The configuration stored by [`initialize`], or defaults before it ran
pub fn get_config() -> Config {
    INIT_STATE
        .get()
        .map(|state| state.config.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_filter_wins() {
        let logging = LoggingConfig::default();
        assert!(env_filter(&logging, Some("parley_core=trace")).is_ok());
        assert!(env_filter(&logging, Some("parley_core=notalevel")).is_err());
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let first = InitBuilder::new().skip_logging(true).init().unwrap();
        let second = InitBuilder::new()
            .config_path("does/not/matter.toml")
            .init()
            .unwrap();

        assert!(is_initialized());
        assert!(std::ptr::eq(first, second));
        assert_eq!(get_config(), *first);
    }
}
