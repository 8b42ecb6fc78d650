//! Exit codes for the CLI

use tandem_core::{ConfigError, SelectionError, TandemError};
use tandem_tasks::SchedulerError;

use crate::cli::commands::CommandError;

/// Success
pub const SUCCESS: u8 = 0;

/// At least one package task failed
pub const TASK_FAILURE: u8 = 1;

/// Bad flag, pattern, concurrency or executable
pub const INVALID_ARGUMENT: u8 = 2;

/// Packages root directory does not exist
pub const ROOT_NOT_FOUND: u8 = 3;

/// Cyclic local dependency graph
pub const INVALID_GRAPH: u8 = 4;

/// Manifest or configuration I/O error
pub const IO_ERROR: u8 = 5;

/// No subcommand given
pub const NO_COMMAND: u8 = 64;

/// Aborted by interrupt
pub const ABORTED: u8 = 130;

/// Map a command error to the process exit code
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CommandError>() {
            return match e {
                CommandError::ExecutableNotFound { .. } => INVALID_ARGUMENT,
                CommandError::TasksFailed { .. } => TASK_FAILURE,
                CommandError::Aborted => ABORTED,
            };
        }
        if let Some(e) = cause.downcast_ref::<SchedulerError>() {
            return match e {
                SchedulerError::InvalidArgument(_) => INVALID_ARGUMENT,
                SchedulerError::InvalidGraph(_) => INVALID_GRAPH,
            };
        }
        if let Some(e) = cause.downcast_ref::<TandemError>() {
            return match e {
                TandemError::Selection(SelectionError::InvalidPattern { .. }) => INVALID_ARGUMENT,
                TandemError::Selection(SelectionError::PathNotFound(_)) => ROOT_NOT_FOUND,
                TandemError::Config(ConfigError::InvalidValue { .. }) => INVALID_ARGUMENT,
                TandemError::Graph(_) => INVALID_GRAPH,
                TandemError::Config(_)
                | TandemError::Manifest(_)
                | TandemError::Io(_)
                | TandemError::Json(_) => IO_ERROR,
                TandemError::Link(_) => TASK_FAILURE,
            };
        }
        if cause.is::<std::io::Error>() {
            return IO_ERROR;
        }
    }
    TASK_FAILURE
}
