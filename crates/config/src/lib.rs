// Configuration Management
//
// This crate handles all configuration loading for modaletta.
// It provides:
// - Configuration structs resolved from the environment
// - YAML file loading for the agent backend and the digest
// - Default configuration values
//
// Every section reads its variables through a lookup closure so the same
// code path serves both the real process environment and tests.

use serde::de::DeserializeOwned;
use std::path::Path;
use thiserror::Error;

pub mod types;

// Re-export all configuration types
pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found. Tried paths: {paths}")]
    FileNotFound { paths: String },

    #[error("Failed to read configuration file: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {source}")]
    ParseError {
        #[from]
        source: serde_yaml::Error,
    },

    #[error("{key} environment variable is required")]
    MissingVar { key: &'static str },

    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Read and deserialize a YAML document.
pub fn load_yaml<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            paths: path.display().to_string(),
        });
    }
    let content = std::fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

impl AgentBackendConfig {
    /// Load backend settings from a YAML file; absent keys take their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_yaml(path)
    }
}

impl DigestConfig {
    /// Load the digest source list from YAML.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        load_yaml(path)
    }

    /// Load from `path` when given, otherwise from the default locations,
    /// falling back to the built-in source list.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load_from_file(path);
        }

        let config_paths = ["config/digest_config.yaml", "digest_config.yaml"];
        for path in &config_paths {
            if Path::new(path).exists() {
                return Self::load_from_file(path);
            }
        }

        tracing::debug!("No digest config file found, using built-in sources");
        Ok(Self::default())
    }
}
