//! Resolved per-invocation configuration

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;
use crate::monorepo::selection::SelectionCriteria;

use super::types::Config;
use super::validation::{validate_concurrency, validate_config};

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Include patterns; replace the configured ones when non-empty
    pub include: Vec<String>,
    /// Exclude patterns; replace the configured ones when non-empty
    pub exclude: Vec<String>,
    /// Add transitive dependents of the matched packages
    pub expand_dependents: bool,
    /// Add transitive dependencies of the matched packages
    pub expand_dependencies: bool,
    /// Concurrency limit
    pub concurrency: Option<usize>,
    /// Packages root, relative to the monorepo root
    pub packages_root: Option<PathBuf>,
}

/// Immutable configuration for a single run, built once and passed down
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Monorepo root
    pub root_dir: PathBuf,
    /// Absolute packages root
    pub packages_root: PathBuf,
    /// Working set selection
    pub criteria: SelectionCriteria,
    /// Maximum concurrent tasks
    pub concurrency: usize,
    /// Package manager executable
    pub package_manager: String,
    /// Absolute path of the debug log artifact
    pub log_file: PathBuf,
}

impl RunConfig {
    /// Merge the config file with command-line overrides.
    ///
    /// Fails on invalid patterns or a non-positive concurrency limit.
    pub fn resolve(root_dir: &Path, config: &Config, overrides: ConfigOverrides) -> Result<Self> {
        validate_config(config)?;

        let concurrency = overrides.concurrency.unwrap_or(config.concurrency);
        validate_concurrency(concurrency)?;

        let include = if overrides.include.is_empty() {
            &config.include
        } else {
            &overrides.include
        };
        let exclude = if overrides.exclude.is_empty() {
            &config.exclude
        } else {
            &overrides.exclude
        };

        let criteria = SelectionCriteria::new(include, exclude)?
            .with_dependents(overrides.expand_dependents)
            .with_dependencies(overrides.expand_dependencies);

        let packages_root = root_dir.join(
            overrides
                .packages_root
                .as_deref()
                .unwrap_or(&config.packages_root),
        );

        debug!(
            root = %root_dir.display(),
            packages_root = %packages_root.display(),
            concurrency,
            "resolved run configuration"
        );

        Ok(Self {
            root_dir: root_dir.to_path_buf(),
            packages_root,
            criteria,
            concurrency,
            package_manager: config.package_manager.clone(),
            log_file: root_dir.join(&config.log_file),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, SelectionError, TandemError};

    #[test]
    fn test_overrides_take_precedence() {
        let config = Config {
            include: vec!["^app".to_string()],
            ..Default::default()
        };
        let overrides = ConfigOverrides {
            include: vec!["^lib".to_string()],
            concurrency: Some(2),
            packages_root: Some(PathBuf::from("libs")),
            ..Default::default()
        };

        let run = RunConfig::resolve(Path::new("/repo"), &config, overrides).unwrap();
        assert_eq!(run.concurrency, 2);
        assert_eq!(run.packages_root, PathBuf::from("/repo/libs"));
        assert_eq!(run.log_file, PathBuf::from("/repo/tandem-debug.log"));
        assert!(run.criteria.matches_name("lib-a"));
        assert!(!run.criteria.matches_name("app-a"));
    }

    #[test]
    fn test_config_patterns_used_without_overrides() {
        let config = Config {
            exclude: vec!["internal".to_string()],
            ..Default::default()
        };
        let run =
            RunConfig::resolve(Path::new("/repo"), &config, ConfigOverrides::default()).unwrap();
        assert!(!run.criteria.matches_name("@org/internal-tools"));
        assert!(run.criteria.matches_name("@org/ui"));
        assert_eq!(run.concurrency, 4);
    }

    #[test]
    fn test_zero_concurrency_override_rejected() {
        let overrides = ConfigOverrides {
            concurrency: Some(0),
            ..Default::default()
        };
        let result = RunConfig::resolve(Path::new("/repo"), &Config::default(), overrides);
        assert!(matches!(
            result,
            Err(TandemError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let overrides = ConfigOverrides {
            include: vec!["(unclosed".to_string()],
            ..Default::default()
        };
        let result = RunConfig::resolve(Path::new("/repo"), &Config::default(), overrides);
        assert!(matches!(
            result,
            Err(TandemError::Selection(SelectionError::InvalidPattern { .. }))
        ));
    }
}
