//! Configuration loading
//!
//! Layers, lowest priority first:
//! 1. Built-in defaults
//! 2. A TOML file: `--config`, else `PARLEY_CONFIG_PATH`, else `./parley.toml` when present
//! 3. Environment variables: `PARLEY_<SECTION>__<KEY>`, e.g. `PARLEY_RUNTIME__CONTINUE_ON_ERROR=true`
//!
//! A `.env` file in the working directory is read first, so its entries
//! behave like real environment variables.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::diagnostics::Severity;

pub const CONFIG_PATH_VAR: &str = "PARLEY_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "parley.toml";
const ENV_PREFIX: &str = "PARLEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analyzer: AnalyzerConfig,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

/// Severities and limits used by the semantic analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// A condition that infers to Number (0 / non-zero truthiness)
    pub numeric_condition: Severity,
    /// A check deferred to runtime because a type is unknown
    pub unverified: Severity,
    /// `<<jump start>>` when the node is called `Start`
    pub jump_case_mismatch: Severity,
    /// Jumping to the node currently running
    pub self_jump: Severity,
    /// Cached reports kept before the oldest is evicted; 0 disables caching
    pub cache_capacity: usize,
    /// Maximum edit distance for "did you mean" suggestions
    pub suggestion_distance: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            numeric_condition: Severity::Warning,
            unverified: Severity::Info,
            jump_case_mismatch: Severity::Warning,
            self_jump: Severity::Warning,
            cache_capacity: 64,
            suggestion_distance: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Log and skip content that fails at runtime instead of stopping
    pub continue_on_error: bool,
    /// Upper bound accepted by `<<wait>>`
    pub max_wait_seconds: f64,
    pub start_node: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            continue_on_error: false,
            max_wait_seconds: 3600.0,
            start_node: "Start".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset
    pub filter: String,
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
            with_target: false,
        }
    }
}

impl Config {
    /// Load using the default file search
    pub fn load() -> Result<Config, ConfigError> {
        Self::load_from(None)
    }

    /// Load with an explicit file path taking precedence over the search
    pub fn load_from(path: Option<&str>) -> Result<Config, ConfigError> {
        dotenvy::dotenv().ok();

        let explicit = path
            .map(str::to_string)
            .or_else(|| std::env::var(CONFIG_PATH_VAR).ok());

        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        builder = match explicit {
            Some(path) => builder.add_source(config::File::with_name(&path).required(true)),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                builder.add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false))
            }
            None => builder,
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Defaults overlaid with a TOML document; no file or environment lookup
    pub fn from_toml(source: &str) -> Result<Config, ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.analyzer.numeric_condition, Severity::Warning);
        assert_eq!(config.analyzer.unverified, Severity::Info);
        assert_eq!(config.analyzer.cache_capacity, 64);
        assert!(!config.runtime.continue_on_error);
        assert_eq!(config.runtime.start_node, "Start");
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = Config::from_toml(
            r#"
[analyzer]
numeric_condition = "error"
cache_capacity = 4

[runtime]
continue_on_error = true
"#,
        )
        .unwrap();

        assert_eq!(config.analyzer.numeric_condition, Severity::Error);
        assert_eq!(config.analyzer.cache_capacity, 4);
        assert_eq!(config.analyzer.self_jump, Severity::Warning);
        assert!(config.runtime.continue_on_error);
        assert_eq!(config.runtime.max_wait_seconds, 3600.0);
    }

    #[test]
    fn test_to_toml_round_trips() {
        let mut config = Config::default();
        config.runtime.start_node = "Intro".to_string();
        let text = config.to_toml().unwrap();
        assert!(text.contains("start_node = \"Intro\""));
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_unknown_severity_is_rejected() {
        let result = Config::from_toml("[analyzer]\nself_jump = \"fatal\"\n");
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }
}
