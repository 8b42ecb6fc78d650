//! Run command - run a package.json script across the working set

use std::sync::Arc;

use clap::Args;
use tracing::info;

use tandem_tasks::CommandTask;

use crate::cli::Cli;

use super::context::{local_names, Context};
use super::ensure_executable;
use super::runner::run_packages;

/// Run a script in every selected package declaring it
#[derive(Debug, Args)]
pub struct RunCommand {
    /// Script name from package.json
    pub script: String,

    /// Extra arguments passed to the script
    #[arg(last = true)]
    pub args: Vec<String>,
}

impl RunCommand {
    /// Package manager arguments: `run <script> [-- args]`
    fn manager_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string(), self.script.clone()];
        if !self.args.is_empty() {
            args.push("--".to_string());
            args.extend(self.args.iter().cloned());
        }
        args
    }

    pub fn execute(&self, cli: &Cli, context: &Context) -> anyhow::Result<()> {
        info!(script = %self.script, "executing run command");
        let package_manager = context.run.package_manager.clone();
        ensure_executable(&package_manager)?;

        let criteria = context.run.criteria.clone().with_script(&self.script);
        let (packages, working_set) = context.working_set_with(&criteria)?;
        let names = local_names(&packages);
        let args = self.manager_args();

        run_packages(cli, context, &working_set, move |reporter, hooks| {
            Arc::new(
                CommandTask::new(package_manager, args, hooks, reporter).with_manifest_guard(names),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_args() {
        let cmd = RunCommand {
            script: "test".to_string(),
            args: Vec::new(),
        };
        assert_eq!(cmd.manager_args(), vec!["run", "test"]);

        let cmd = RunCommand {
            script: "test".to_string(),
            args: vec!["--watch".to_string()],
        };
        assert_eq!(cmd.manager_args(), vec!["run", "test", "--", "--watch"]);
    }
}
