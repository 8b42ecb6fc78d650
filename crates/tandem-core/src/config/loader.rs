//! Configuration loading

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{ConfigError, Result};

use super::defaults::CONFIG_FILE_NAMES;
use super::types::Config;
use super::validation::validate_config;

/// On-disk config syntax, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "toml" => Some(Self::Toml),
            "yaml" | "yml" => Some(Self::Yaml),
            _ => None,
        }
    }

    /// Parse `content` into a [`Config`] without validating it
    pub fn parse(self, content: &str) -> Result<Config> {
        let config = match self {
            Self::Toml => toml::from_str(content).map_err(ConfigError::TomlError)?,
            Self::Yaml => serde_yaml::from_str(content).map_err(ConfigError::YamlError)?,
        };
        Ok(config)
    }
}

/// Read, parse and validate one config file
pub fn load_config(path: &Path) -> Result<Config> {
    let format = ConfigFormat::from_path(path).ok_or_else(|| ConfigError::InvalidValue {
        field: "config file".to_string(),
        message: format!("unsupported extension: {}", path.display()),
    })?;
    let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;

    let config = format.parse(&content)?;
    validate_config(&config)?;
    info!(path = %path.display(), ?format, "loaded config");
    Ok(config)
}

/// Nearest config file at or above `start_dir`
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let found = start_dir
        .ancestors()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|candidate| candidate.is_file());
    debug!(start_dir = %start_dir.display(), found = ?found, "config lookup");
    found
}

/// Load the nearest config, falling back to defaults when there is none.
///
/// A file that exists but fails to parse or validate is still an error.
pub fn load_config_or_default(start_dir: &Path) -> Result<(Config, Option<PathBuf>)> {
    let Some(path) = find_config(start_dir) else {
        debug!("no config file, using defaults");
        return Ok((Config::default(), None));
    };
    let config = load_config(&path)?;
    Ok((config, Some(path)))
}
