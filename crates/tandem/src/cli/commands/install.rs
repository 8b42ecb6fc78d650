//! Install command

use std::sync::Arc;

use clap::Args;
use tracing::info;

use tandem_tasks::CommandTask;

use crate::cli::Cli;

use super::context::{local_names, Context};
use super::ensure_executable;
use super::runner::run_packages;

/// Run `<package manager> install` in every selected package
#[derive(Debug, Args)]
pub struct InstallCommand {
    /// Extra arguments passed to the package manager
    #[arg(last = true)]
    pub args: Vec<String>,
}

impl InstallCommand {
    pub fn execute(&self, cli: &Cli, context: &Context) -> anyhow::Result<()> {
        info!("executing install command");
        let package_manager = context.run.package_manager.clone();
        ensure_executable(&package_manager)?;

        let (packages, working_set) = context.working_set()?;
        let names = local_names(&packages);
        let args: Vec<String> = std::iter::once("install".to_string())
            .chain(self.args.iter().cloned())
            .collect();

        run_packages(cli, context, &working_set, move |reporter, hooks| {
            Arc::new(
                CommandTask::new(package_manager, args, hooks, reporter).with_manifest_guard(names),
            )
        })
    }
}
