//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::ql::Duration;
use crate::rules::OutputFormat;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Manifest output configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Write manifests here instead of stdout
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Evaluation interval for bundles that do not set one
    #[serde(default)]
    pub default_interval: Option<Duration>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("rulesmith").join("config.toml")),
            Some(PathBuf::from("./rulesmith.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        // Fall back to environment-only config
        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`, keyed by environment variable name.
    ///
    /// Values that do not parse are logged and skipped.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Output overrides
        if let Some(format) = lookup("RULESMITH_OUTPUT_FORMAT") {
            match format.parse() {
                Ok(format) => self.output.format = format,
                Err(e) => tracing::warn!("Ignoring RULESMITH_OUTPUT_FORMAT: {}", e),
            }
        }
        if let Some(path) = lookup("RULESMITH_OUTPUT_PATH") {
            self.output.path = Some(PathBuf::from(path));
        }
        if let Some(interval) = lookup("RULESMITH_DEFAULT_INTERVAL") {
            match interval.parse() {
                Ok(interval) => self.output.default_interval = Some(interval),
                Err(e) => tracing::warn!("Ignoring RULESMITH_DEFAULT_INTERVAL: {}", e),
            }
        }

        // Logging overrides
        if let Some(level) = lookup("RULESMITH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("RULESMITH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Rulesmith Configuration
#
# Environment variables override these settings:
# - RULESMITH_OUTPUT_FORMAT
# - RULESMITH_OUTPUT_PATH
# - RULESMITH_DEFAULT_INTERVAL
# - RULESMITH_LOG_LEVEL
# - RULESMITH_LOG_FORMAT

[output]
# Manifest format: yaml or json
format = "yaml"

# Write manifests to a file instead of stdout
# path = "./rules.yml"

# Evaluation interval for rule groups that do not set their own
# default_interval = "1m"

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ql::{MINUTE, SECOND};
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.output, OutputConfig::default());
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[output]
format = "json"
path = "/tmp/rules.json"
default_interval = "1m30s"

[logging]
level = "debug"
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.path, Some(PathBuf::from("/tmp/rules.json")));
        assert_eq!(config.output.default_interval, Some(MINUTE + 30 * SECOND));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_errors() {
        let err = Config::load(Path::new("/nonexistent/rulesmith.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[output]\ndefault_interval = \"soon\"").unwrap();
        let err = Config::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("RULESMITH_OUTPUT_FORMAT", "json"),
            ("RULESMITH_DEFAULT_INTERVAL", "30s"),
            ("RULESMITH_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.output.default_interval, Some(30 * SECOND));
        assert_eq!(config.output.path, None);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_overrides_are_skipped() {
        let mut config = Config::default();
        config.apply_overrides_from(|key| match key {
            "RULESMITH_OUTPUT_FORMAT" => Some("xml".to_string()),
            "RULESMITH_DEFAULT_INTERVAL" => Some("five minutes".to_string()),
            _ => None,
        });

        assert_eq!(config.output.format, OutputFormat::Yaml);
        assert_eq!(config.output.default_interval, None);
    }
}
