//! tandem tasks - Task orchestration engine
//!
//! This crate runs one task per package of a working set, never starting a
//! package before its local dependencies succeeded, with a bounded number of
//! concurrent tasks, failure propagation and cooperative abort.

pub mod abort;
pub mod process;
pub mod reporter;
pub mod scheduler;
pub mod task;

pub use abort::AbortSignal;
pub use process::{CommandTask, ExitHook, ExitHooks};
pub use reporter::{
    CollectingReporter, TaskEvent, TaskReporter, TaskReporterRegistry, TracingReporter,
};
pub use scheduler::{
    PackageResult, PackageStatus, RunCounts, RunOutcome, RunStatus, SchedulerError,
    SchedulerOptions, SkipReason, TaskScheduler,
};
pub use task::{task_fn, FnTask, PackageTask, TaskOutcome};
