//! CLI commands

mod context;
mod exec;
mod install;
mod link;
mod list;
mod run;
mod runner;

pub use context::Context;
pub use exec::ExecCommand;
pub use install::InstallCommand;
pub use link::LinkCommand;
pub use list::ListCommand;
pub use run::RunCommand;

use thiserror::Error;

/// Command failures with a dedicated exit code
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program to run could not be found on PATH
    #[error("Executable not found: {name}")]
    ExecutableNotFound { name: String },

    /// The run finished with failed packages
    #[error("{failed} package task{} failed", plural_suffix(.failed))]
    TasksFailed { failed: usize },

    /// The run was interrupted
    #[error("Run aborted")]
    Aborted,
}

fn plural_suffix(n: &usize) -> &'static str {
    if *n == 1 {
        ""
    } else {
        "s"
    }
}

/// Fail early when `program` cannot be resolved.
///
/// Names containing a path separator are resolved per package and are not checked.
fn ensure_executable(program: &str) -> Result<(), CommandError> {
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        return Ok(());
    }
    which::which(program)
        .map(|_| ())
        .map_err(|_| CommandError::ExecutableNotFound {
            name: program.to_string(),
        })
}
