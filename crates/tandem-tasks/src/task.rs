//! Per-package task abstraction

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use tandem_core::Package;

/// How a single package task ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The task completed successfully
    Success,
    /// The task failed; the detail is shown to the user
    Failure(String),
}

impl TaskOutcome {
    /// Check if this outcome represents success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::Failure(detail) => write!(f, "failure: {}", detail),
        }
    }
}

/// A task the scheduler runs once per package.
///
/// `kill` is cancelled when the run is aborted; a task observing it should
/// stop as soon as possible and still return an outcome.
#[async_trait]
pub trait PackageTask: Send + Sync {
    /// Short human-readable description, e.g. the command line
    fn describe(&self) -> String;

    /// Run the task for one package
    async fn run(&self, package: &Package, kill: CancellationToken) -> TaskOutcome;
}

/// A [`PackageTask`] backed by an async closure
pub struct FnTask<F> {
    description: String,
    f: F,
}

impl<F> fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Wrap an async closure as a [`PackageTask`]
pub fn task_fn<F, Fut>(description: impl Into<String>, f: F) -> FnTask<F>
where
    F: Fn(Package, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = TaskOutcome> + Send,
{
    FnTask {
        description: description.into(),
        f,
    }
}

#[async_trait]
impl<F, Fut> PackageTask for FnTask<F>
where
    F: Fn(Package, CancellationToken) -> Fut + Send + Sync,
    Fut: Future<Output = TaskOutcome> + Send,
{
    fn describe(&self) -> String {
        self.description.clone()
    }

    async fn run(&self, package: &Package, kill: CancellationToken) -> TaskOutcome {
        (self.f)(package.clone(), kill).await
    }
}
