//! Link command

use std::sync::Arc;

use clap::Args;
use tracing::{debug, info};

use tandem_npm::Linker;
use tandem_tasks::{task_fn, TaskOutcome};

use crate::cli::Cli;

use super::context::Context;
use super::runner::run_packages;

/// Symlink every local dependency into `<package>/node_modules`
#[derive(Debug, Args)]
pub struct LinkCommand {}

impl LinkCommand {
    pub fn execute(&self, cli: &Cli, context: &Context) -> anyhow::Result<()> {
        info!("executing link command");
        let (packages, working_set) = context.working_set()?;
        let linker = Arc::new(Linker::new(&packages));

        run_packages(cli, context, &working_set, move |_reporter, _hooks| {
            Arc::new(task_fn("link local packages", move |package, _kill| {
                let linker = linker.clone();
                async move {
                    match linker.link(&package) {
                        Ok(links) => {
                            debug!(package = %package.name, links = links.len(), "linked");
                            TaskOutcome::Success
                        }
                        Err(e) => TaskOutcome::Failure(e.to_string()),
                    }
                }
            }))
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cli::commands::CommandError;
    use clap::Parser;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_package(root: &Path, dir: &str, manifest: &str) {
        let dir = root.join("packages").join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("package.json"), manifest).unwrap();
    }

    fn link(root: &Path, extra: &[&str]) -> anyhow::Result<()> {
        let mut argv = vec!["tandem", "-q", "-C", root.to_str().unwrap()];
        argv.extend_from_slice(extra);
        argv.push("link");
        let cli = Cli::try_parse_from(argv).unwrap();
        let context = Context::load(&cli).unwrap();
        cli.execute(cli.command.as_ref().unwrap(), &context)
    }

    #[test]
    fn test_links_local_dependencies() {
        let temp = TempDir::new().unwrap();
        write_package(temp.path(), "core", r#"{"name": "@org/core"}"#);
        write_package(
            temp.path(),
            "app",
            r#"{"name": "app", "devDependencies": {"@org/core": "*"}}"#,
        );

        link(temp.path(), &[]).unwrap();

        let target = std::fs::read_link(temp.path().join("packages/app/node_modules/@org/core"))
            .unwrap();
        assert_eq!(target, temp.path().join("packages/core"));
    }

    #[test]
    fn test_conflict_fails_the_package() {
        let temp = TempDir::new().unwrap();
        write_package(temp.path(), "core", r#"{"name": "core"}"#);
        write_package(
            temp.path(),
            "app",
            r#"{"name": "app", "dependencies": {"core": "1.0.0"}}"#,
        );
        std::fs::create_dir_all(temp.path().join("packages/app/node_modules/core")).unwrap();

        let err = link(temp.path(), &["-i", "^app$"]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CommandError>(),
            Some(CommandError::TasksFailed { failed: 1 })
        ));
    }
}
