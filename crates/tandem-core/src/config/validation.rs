//! Configuration validation

use tracing::debug;

use crate::error::{ConfigError, Result};

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_concurrency(config.concurrency)?;

    if config.package_manager.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "package_manager".to_string(),
            message: "package manager cannot be empty".to_string(),
        }
        .into());
    }

    if config.log_file.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "log_file".to_string(),
            message: "log file name cannot be empty".to_string(),
        }
        .into());
    }

    debug!("configuration validation passed");
    Ok(())
}

/// Validate a concurrency limit
pub fn validate_concurrency(concurrency: usize) -> Result<()> {
    if concurrency == 0 {
        return Err(ConfigError::InvalidValue {
            field: "concurrency".to_string(),
            message: "must be a positive integer".to_string(),
        }
        .into());
    }
    Ok(())
}
