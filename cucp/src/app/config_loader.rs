//! Configuration loading for the CU-CP application
//!
//! Wraps [`CucpConfig`] parsing and validation with the error type the binary
//! reports at startup.
//!
//! # Example
//!
//! ```rust,ignore
//! use cucp::app::load_config;
//!
//! let config = load_config("config/cucp.yaml")?;
//! println!("serving PLMN {}", config.plmn()?);
//! ```

use std::path::Path;

use cucp_common::{ConfigValidationErrors, CucpConfig};
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// One or more invalid values
    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ConfigValidationErrors),
}

/// Loads and validates a configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CucpConfig, ConfigError> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    load_config_from_str(&contents)
}

/// Parses and validates a configuration from YAML text.
pub fn load_config_from_str(yaml: &str) -> Result<CucpConfig, ConfigError> {
    let config = CucpConfig::from_yaml(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    config.validate()?;
    Ok(config)
}
