//! Exec command

use std::sync::Arc;

use clap::Args;
use tracing::info;

use tandem_tasks::CommandTask;

use crate::cli::Cli;

use super::context::Context;
use super::ensure_executable;
use super::runner::run_packages;

/// Run an executable in every selected package. The manifest is left untouched.
#[derive(Debug, Args)]
pub struct ExecCommand {
    /// Program to run
    pub executable: String,

    /// Arguments for the program
    #[arg(last = true)]
    pub args: Vec<String>,
}

impl ExecCommand {
    pub fn execute(&self, cli: &Cli, context: &Context) -> anyhow::Result<()> {
        info!(executable = %self.executable, "executing exec command");
        ensure_executable(&self.executable)?;

        let (_, working_set) = context.working_set()?;
        let program = self.executable.clone();
        let args = self.args.clone();

        run_packages(cli, context, &working_set, move |reporter, hooks| {
            Arc::new(CommandTask::new(program, args, hooks, reporter))
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::cli::commands::CommandError;
    use clap::Parser;
    use tempfile::TempDir;

    fn monorepo() -> TempDir {
        let temp = TempDir::new().unwrap();
        for (dir, manifest) in [
            ("a", r#"{"name": "a"}"#),
            ("b", r#"{"name": "b", "dependencies": {"a": "1.0.0"}}"#),
        ] {
            let dir = temp.path().join("packages").join(dir);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("package.json"), manifest).unwrap();
        }
        temp
    }

    fn run(temp: &TempDir, args: &[&str]) -> anyhow::Result<()> {
        let mut argv = vec!["tandem", "-q", "-C", temp.path().to_str().unwrap()];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv).unwrap();
        let context = Context::load(&cli).unwrap();
        let command = cli.command.as_ref().unwrap();
        cli.execute(command, &context)
    }

    #[test]
    fn test_exec_runs_in_each_package() {
        let temp = monorepo();
        run(&temp, &["exec", "touch", "--", "marker"]).unwrap();

        assert!(temp.path().join("packages/a/marker").exists());
        assert!(temp.path().join("packages/b/marker").exists());
    }

    #[test]
    fn test_exec_failure_is_reported() {
        let temp = monorepo();
        let err = run(&temp, &["exec", "sh", "--", "-c", "exit 1"]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CommandError>(),
            Some(CommandError::TasksFailed { failed: 1 })
        ));
    }

    #[test]
    fn test_exec_unknown_program() {
        let temp = monorepo();
        let err = run(&temp, &["exec", "definitely-not-a-real-program"]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CommandError>(),
            Some(CommandError::ExecutableNotFound { .. })
        ));
    }
}
