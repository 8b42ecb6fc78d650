//! Monorepo context shared by all commands

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tandem_core::config::load_config_or_default;
use tandem_core::monorepo::{select, PackageDiscovery};
use tandem_core::{Package, RunConfig, SelectionCriteria, WorkingSet};

use crate::cli::Cli;

/// Resolved configuration plus the packages discovered for this invocation
#[derive(Debug)]
pub struct Context {
    pub run: RunConfig,
    pub config_path: Option<PathBuf>,
}

impl Context {
    /// Locate the config file and merge it with the command line.
    ///
    /// The monorepo root is the directory holding the config file, or the
    /// starting directory when there is none.
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let start = match &cli.directory {
            Some(dir) => dir.clone(),
            None => std::env::current_dir()?,
        };
        let (config, config_path) = load_config_or_default(&start)?;
        let root = config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or(start);

        let run = RunConfig::resolve(&root, &config, cli.overrides())?;
        Ok(Self { run, config_path })
    }

    /// Every package under the packages root
    pub fn discover(&self) -> anyhow::Result<Vec<Package>> {
        Ok(PackageDiscovery::new(&self.run.packages_root).discover()?)
    }

    /// Discover, then select with the configured criteria
    pub fn working_set(&self) -> anyhow::Result<(Vec<Package>, WorkingSet)> {
        self.working_set_with(&self.run.criteria)
    }

    /// Discover, then select with custom criteria
    pub fn working_set_with(
        &self,
        criteria: &SelectionCriteria,
    ) -> anyhow::Result<(Vec<Package>, WorkingSet)> {
        let packages = self.discover()?;
        let working_set = select(&packages, criteria);
        Ok((packages, working_set))
    }
}

/// Names of all monorepo packages, hidden from the package manager during a task
pub fn local_names(packages: &[Package]) -> Arc<HashSet<String>> {
    Arc::new(packages.iter().map(|p| p.name.clone()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn write_package(root: &Path, dir: &str, manifest: &str) {
        let dir = root.join("packages").join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("package.json"), manifest).unwrap();
    }

    #[test]
    fn test_root_is_config_directory() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("tandem.toml"), "concurrency = 2\n").unwrap();
        let nested = temp.path().join("packages/a");
        std::fs::create_dir_all(&nested).unwrap();

        let cli = Cli::try_parse_from(["tandem", "-C", nested.to_str().unwrap(), "list"]).unwrap();
        let context = Context::load(&cli).unwrap();

        assert_eq!(context.run.root_dir, temp.path());
        assert_eq!(context.run.packages_root, temp.path().join("packages"));
        assert_eq!(context.run.concurrency, 2);
        assert!(context.config_path.is_some());
    }

    #[test]
    fn test_working_set_and_local_names() {
        let temp = TempDir::new().unwrap();
        write_package(temp.path(), "a", r#"{"name": "a"}"#);
        write_package(
            temp.path(),
            "b",
            r#"{"name": "b", "dependencies": {"a": "1.0.0"}}"#,
        );

        let cli = Cli::try_parse_from([
            "tandem",
            "-C",
            temp.path().to_str().unwrap(),
            "-i",
            "^b$",
            "list",
        ])
        .unwrap();
        let context = Context::load(&cli).unwrap();
        let (packages, working_set) = context.working_set().unwrap();

        assert_eq!(working_set.names(), vec!["b"]);
        let names = local_names(&packages);
        assert!(names.contains("a") && names.contains("b"));
    }
}
