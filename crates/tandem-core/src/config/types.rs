//! Configuration file types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::defaults::{
    DEFAULT_CONCURRENCY, DEFAULT_LOG_FILE, DEFAULT_PACKAGES_ROOT, DEFAULT_PACKAGE_MANAGER,
};

/// Contents of a `tandem.toml` / `tandem.yaml` file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the packages, relative to the monorepo root
    pub packages_root: PathBuf,

    /// Maximum concurrent tasks
    pub concurrency: usize,

    /// Package manager executable used by `install` and `run`
    pub package_manager: String,

    /// Include patterns applied when none are given on the command line
    pub include: Vec<String>,

    /// Exclude patterns applied when none are given on the command line
    pub exclude: Vec<String>,

    /// Debug log file name, relative to the monorepo root
    pub log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            packages_root: PathBuf::from(DEFAULT_PACKAGES_ROOT),
            concurrency: DEFAULT_CONCURRENCY,
            package_manager: DEFAULT_PACKAGE_MANAGER.to_string(),
            include: Vec::new(),
            exclude: Vec::new(),
            log_file: DEFAULT_LOG_FILE.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("concurrency = 8\n").unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.packages_root, PathBuf::from("packages"));
        assert_eq!(config.package_manager, "npm");
        assert!(config.include.is_empty());
    }

    #[test]
    fn test_yaml_lists() {
        let config: Config =
            serde_yaml::from_str("package_manager: yarn\nexclude:\n  - '^@internal/'\n").unwrap();
        assert_eq!(config.package_manager, "yarn");
        assert_eq!(config.exclude, vec!["^@internal/"]);
    }
}
