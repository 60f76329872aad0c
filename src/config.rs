//! Bridge configuration
//!
//! Loaded from a TOML file, or built from defaults:
//!
//! ```toml
//! [logging]
//! level = "debug"
//! json = false
//!
//! [libraries]
//! Demo = "libdemo.so.1"
//!
//! [marshal]
//! zero_terminated_limit = 4096
//! ```

use crate::logging::{LogConfig, LogFormat, LogOutput};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::Level;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown log level `{0}'")]
    LogLevel(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Namespace -> shared library used to resolve its symbols
    #[serde(default)]
    pub libraries: HashMap<String, String>,

    #[serde(default)]
    pub marshal: MarshalConfig,
}

impl BridgeConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_str(&text)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.logging.level()?;
        Ok(config)
    }

    pub fn library_for(&self, namespace: &str) -> Option<&str> {
        self.libraries.get(namespace).map(String::as_str)
    }

    /// Install the global subscriber from the `[logging]` section
    pub fn init_logging(&self) -> Result<(), ConfigError> {
        crate::logging::init_with_config(self.logging.to_log_config()?);
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,

    #[serde(default)]
    pub spans: bool,

    #[serde(default)]
    pub file: Option<String>,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
            spans: false,
            file: None,
        }
    }
}

impl LoggingConfig {
    pub fn level(&self) -> Result<Level, ConfigError> {
        self.level
            .parse()
            .map_err(|_| ConfigError::LogLevel(self.level.clone()))
    }

    pub fn to_log_config(&self) -> Result<LogConfig, ConfigError> {
        Ok(LogConfig {
            level: self.level()?,
            output: self
                .file
                .as_ref()
                .map_or(LogOutput::Stderr, |path| LogOutput::File(path.into())),
            format: if self.json { LogFormat::Json } else { LogFormat::Text },
            spans: self.spans,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarshalConfig {
    /// Upper bound on elements scanned for a zero terminator
    #[serde(default = "default_scan_limit")]
    pub zero_terminated_limit: usize,
}

fn default_scan_limit() -> usize {
    1 << 20
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self {
            zero_terminated_limit: default_scan_limit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.marshal.zero_terminated_limit, 1_048_576);
        assert_eq!(config.logging.level().unwrap(), Level::INFO);
        assert!(config.libraries.is_empty());
    }

    #[test]
    fn test_parse_sections() {
        let config = BridgeConfig::from_str(
            r#"
            [logging]
            level = "trace"
            json = true

            [libraries]
            Demo = "libdemo.so"

            [marshal]
            zero_terminated_limit = 16
            "#,
        )
        .unwrap();

        assert_eq!(config.library_for("Demo"), Some("libdemo.so"));
        assert_eq!(config.library_for("Other"), None);
        assert_eq!(config.marshal.zero_terminated_limit, 16);

        let log = config.logging.to_log_config().unwrap();
        assert_eq!(log.level, Level::TRACE);
        assert_eq!(log.format, LogFormat::Json);
        assert_eq!(log.output, LogOutput::Stderr);
    }

    #[test]
    fn test_bad_level() {
        let err = BridgeConfig::from_str("[logging]\nlevel = \"loud\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::LogLevel(level) if level == "loud"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[marshal]\nzero_terminated_limit = 8").unwrap();

        let config = BridgeConfig::from_file(file.path()).unwrap();
        assert_eq!(config.marshal.zero_terminated_limit, 8);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_init_logging() {
        let config = BridgeConfig::from_str("[logging]\nlevel = \"warn\"\n").unwrap();
        config.init_logging().unwrap();
        assert!(crate::logging::is_initialized());
    }

    #[test]
    fn test_missing_file() {
        let err = BridgeConfig::from_file("/nonexistent/dynbridge.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
