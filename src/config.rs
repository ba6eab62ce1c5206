//! Configuration for the replay tool and stream tuning.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

use crate::protocols::Protocol;
use crate::stream_buffer::DEFAULT_CAPACITY;

/// Command-line arguments for the replay tool
#[derive(Parser, Debug)]
#[command(name = "restitch-replay")]
#[command(version = "0.1.0")]
#[command(about = "Replay a capture dump through the reassembly pipeline", long_about = None)]
pub struct CliArgs {
    /// Capture dump to replay (JSON lines, one event per line)
    pub input: PathBuf,

    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Per-stream reassembly buffer capacity in bytes
    #[arg(short = 'b', long)]
    pub buffer_capacity: Option<usize>,

    /// Protocol assumed for connections with no open event (e.g. resp)
    #[arg(short = 'p', long)]
    pub protocol: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Capture/reassembly tuning
#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    /// Per-stream buffer capacity in bytes
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Default protocol for untagged connections
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            protocol: default_protocol(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_buffer_capacity() -> usize {
    DEFAULT_CAPACITY
}

fn default_protocol() -> String {
    "resp".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub input: PathBuf,
    pub buffer_capacity: usize,
    pub protocol: Protocol,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(CliArgs::parse())
    }

    /// Resolve parsed CLI arguments against the optional TOML file.
    pub fn resolve(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        let protocol_name = cli.protocol.unwrap_or(toml_config.capture.protocol);
        let protocol = parse_protocol(&protocol_name)?;

        Ok(Config {
            input: cli.input,
            buffer_capacity: cli
                .buffer_capacity
                .unwrap_or(toml_config.capture.buffer_capacity),
            protocol,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Map a protocol name from configuration onto a [`Protocol`].
pub fn parse_protocol(name: &str) -> Result<Protocol, ConfigError> {
    match name.to_ascii_lowercase().as_str() {
        "resp" | "redis" => Ok(Protocol::Resp),
        _ => Err(ConfigError::UnknownProtocol(name.to_string())),
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    UnknownProtocol(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::UnknownProtocol(name) => {
                write!(f, "Unknown protocol '{name}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TomlConfig::default();
        assert_eq!(config.capture.buffer_capacity, DEFAULT_CAPACITY);
        assert_eq!(config.capture.protocol, "resp");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_parsing() {
        let toml_str = r#"
            [capture]
            buffer_capacity = 65536
            protocol = "resp"

            [logging]
            level = "debug"
        "#;

        let config: TomlConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.capture.buffer_capacity, 65536);
        assert_eq!(config.capture.protocol, "resp");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_protocol_names() {
        assert_eq!(parse_protocol("resp").unwrap(), Protocol::Resp);
        assert_eq!(parse_protocol("Redis").unwrap(), Protocol::Resp);
        assert!(parse_protocol("http").is_err());
    }
}
