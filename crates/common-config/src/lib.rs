//! Shared configuration helpers for gateway services.
//!
//! A service describes its configuration as a `serde` struct with sensible
//! defaults. [`load`] starts from those defaults, merges an optional YAML file
//! named by `<PREFIX>CONFIG`, then lets the service apply environment overrides.

use std::env;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

/// Configuration owned by a single service.
pub trait ServiceConfig: DeserializeOwned + Default {
    /// Environment variable prefix, including the trailing underscore.
    const PREFIX: &'static str;

    /// Apply `<prefix>*` environment variables on top of the file values.
    fn apply_environment_overrides(&mut self, _prefix: &str) {}

    /// Reject combinations that deserialize but cannot be served.
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Load the configuration for `T`.
pub fn load<T: ServiceConfig>() -> Result<T, ConfigError> {
    let path_var = format!("{}CONFIG", T::PREFIX);
    let mut config = match env::var(&path_var) {
        Ok(path) => {
            tracing::info!(%path_var, %path, "loading configuration file");
            from_path::<T>(Path::new(&path))?
        }
        Err(_) => T::default(),
    };
    config.apply_environment_overrides(T::PREFIX);
    config.validate()?;
    Ok(config)
}

/// Parse a YAML configuration file without applying overrides.
pub fn from_path<T: ServiceConfig>(path: &Path) -> Result<T, ConfigError> {
    let file = File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_reader(BufReader::new(file))
}

/// Parse YAML configuration from any reader. Missing keys keep their defaults.
pub fn from_reader<T: ServiceConfig, R: Read>(reader: R) -> Result<T, ConfigError> {
    let config = serde_yaml::from_reader(reader)?;
    Ok(config)
}

/// Resolve the port for a service from an environment variable.
///
/// Falls back to the provided default when the variable is missing or cannot be
/// parsed into a `u16`.
pub fn service_port(var: &str, default: u16) -> u16 {
    match env::var(var) {
        Ok(value) => value
            .parse::<u16>()
            .inspect_err(|error| {
                tracing::warn!(%var, %value, %error, "invalid port override, using default");
            })
            .unwrap_or(default),
        Err(_) => default,
    }
}

/// Read a boolean flag; unparsable values are ignored with a warning.
pub fn env_flag(var: &str) -> Option<bool> {
    let value = env::var(var).ok()?;
    let parsed = parse_flag(&value);
    if parsed.is_none() {
        tracing::warn!(%var, %value, "invalid boolean override, ignoring");
    }
    parsed
}

/// Read a non-empty string value.
pub fn env_string(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
