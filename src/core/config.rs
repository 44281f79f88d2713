use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Error while loading or parsing a config file.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "config io error: {err}"),
            ConfigError::Parse(err) => write!(f, "config parse error: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err)
    }
}

/// Top-level configuration for the `awslog` binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where log objects are read from.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Where parsed records are written.
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Loads a config file from TOML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }
}

/// Local mirror of the log bucket(s).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory that object identifiers are resolved against.
    pub root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
        }
    }
}

/// Output sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory. Records go to stdout as JSON lines when unset.
    pub dir: Option<String>,
    /// Target file size before a new file is started.
    #[serde(default = "default_target_size_mb")]
    pub target_size_mb: u64,
    /// Output format selection.
    #[serde(default)]
    pub format: FormatConfig,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            target_size_mb: default_target_size_mb(),
            format: FormatConfig::default(),
        }
    }
}

fn default_target_size_mb() -> u64 {
    128
}

/// Output format selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormatConfig {
    Jsonl(FormatOptions),
    Parquet(FormatOptions),
}

impl Default for FormatConfig {
    fn default() -> Self {
        FormatConfig::Jsonl(FormatOptions::default())
    }
}

/// Per-format options (compression, etc.).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormatOptions {
    pub compression: Option<String>,
}
