//! Task scheduler - dependency-ordered async executor using tokio
//!
//! Every package of the working set runs the supplied task once. A package
//! becomes ready when all of its in-set dependencies succeeded; ready
//! packages start in name order while fewer than `concurrency` tasks run.
//! A failure skips every transitive dependent, and raising the abort signal
//! stops new starts and cancels the kill token of every running task.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument};

use tandem_core::config::defaults::DEFAULT_CONCURRENCY;
use tandem_core::{DependencyGraph, GraphError, Package, WorkingSet};

use crate::abort::AbortSignal;
use crate::reporter::{TaskEvent, TaskReporter};
use crate::task::{PackageTask, TaskOutcome};

/// Errors that prevent a run from starting
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A scheduler option is out of range
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The working set's dependency graph contains a cycle
    #[error(transparent)]
    InvalidGraph(#[from] GraphError),
}

/// Why a package never started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The named dependency failed or was itself skipped
    DependencyFailed(String),
    /// The run was aborted first
    Aborted,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DependencyFailed(dep) => write!(f, "dependency {} failed", dep),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

/// Per-package state within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageStatus {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed(String),
    Skipped(SkipReason),
}

impl PackageStatus {
    /// Whether the package reached a final state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_) | Self::Skipped(_))
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Ready => f.write_str("ready"),
            Self::Running => f.write_str("running"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed(detail) => write!(f, "failed: {}", detail),
            Self::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

/// Final result of one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageResult {
    pub name: String,
    pub status: PackageStatus,
    /// Task duration; `None` for packages that never started
    pub duration: Option<Duration>,
}

/// Aggregated run status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    Failed,
    Aborted,
}

/// Package counts per final status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Result of [`TaskScheduler::execute`]
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Per-package results in name order
    pub results: Vec<PackageResult>,
    /// Wall-clock duration of the whole run
    pub duration: Duration,
    /// Whether the abort signal was raised during the run
    pub aborted: bool,
}

impl RunOutcome {
    /// Result of one package
    pub fn get(&self, name: &str) -> Option<&PackageResult> {
        self.results.iter().find(|r| r.name == name)
    }

    pub fn counts(&self) -> RunCounts {
        let mut counts = RunCounts {
            total: self.results.len(),
            ..Default::default()
        };
        for result in &self.results {
            match result.status {
                PackageStatus::Succeeded => counts.succeeded += 1,
                PackageStatus::Failed(_) => counts.failed += 1,
                PackageStatus::Skipped(_) => counts.skipped += 1,
                _ => {}
            }
        }
        counts
    }

    /// Aborted when the signal was raised, otherwise Failed when any package failed
    pub fn status(&self) -> RunStatus {
        if self.aborted {
            RunStatus::Aborted
        } else if self
            .results
            .iter()
            .any(|r| matches!(r.status, PackageStatus::Failed(_)))
        {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == RunStatus::Succeeded
    }
}

/// Options for the task scheduler
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Maximum concurrent tasks
    pub concurrency: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Task scheduler - runs a task over a working set with bounded parallelism
pub struct TaskScheduler {
    options: SchedulerOptions,
    reporter: Arc<dyn TaskReporter>,
}

type Completion = (String, TaskOutcome, Duration);

impl TaskScheduler {
    /// Create a new scheduler; `concurrency` must be positive
    pub fn new(
        options: SchedulerOptions,
        reporter: Arc<dyn TaskReporter>,
    ) -> Result<Self, SchedulerError> {
        if options.concurrency == 0 {
            return Err(SchedulerError::InvalidArgument(
                "concurrency must be at least 1".to_string(),
            ));
        }
        Ok(Self { options, reporter })
    }

    /// Run `task` for every package of `working_set`.
    ///
    /// Per-package failures are captured in the outcome; only an invalid
    /// graph is reported as an error, before anything starts.
    #[instrument(skip_all, fields(packages = working_set.len(), concurrency = self.options.concurrency))]
    pub async fn execute(
        &self,
        working_set: &WorkingSet,
        task: Arc<dyn PackageTask>,
        abort: &AbortSignal,
    ) -> Result<RunOutcome, SchedulerError> {
        let start = Instant::now();
        let graph = DependencyGraph::build(working_set.packages());
        if graph.has_cycles() {
            return Err(GraphError::Cyclic(graph.cycles().to_vec()).into());
        }

        let mut state = RunState::new(&graph);
        let command = task.describe();
        let mut running: JoinSet<Completion> = JoinSet::new();
        let mut aborting = false;

        loop {
            if !aborting && abort.is_aborted() {
                aborting = true;
                self.reporter.report(&TaskEvent::AbortRequested {
                    running: running.len(),
                });
            }

            if !aborting {
                while running.len() < self.options.concurrency {
                    let Some(name) = state.next_ready() else {
                        break;
                    };
                    let Some(package) = working_set.get(&name) else {
                        continue;
                    };
                    self.reporter.report(&TaskEvent::Started {
                        package: name.clone(),
                        command: command.clone(),
                    });
                    spawn_task(&mut running, package.clone(), task.clone(), abort);
                }
            }

            if running.is_empty() {
                break;
            }

            tokio::select! {
                biased;
                _ = abort.cancelled(), if !aborting => {
                    // Kill tokens are children of the signal; the next
                    // iteration only reports the abort.
                    debug!("abort signal observed");
                }
                joined = running.join_next() => match joined {
                    Some(Ok((name, outcome, duration))) => {
                        self.complete(&mut state, name, outcome, duration, aborting);
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "task worker failed");
                    }
                    None => break,
                },
            }
        }

        for name in state.unfinished() {
            let status = if aborting {
                PackageStatus::Skipped(SkipReason::Aborted)
            } else {
                PackageStatus::Failed("task worker lost".to_string())
            };
            if let PackageStatus::Skipped(reason) = &status {
                self.reporter.report(&TaskEvent::Skipped {
                    package: name.clone(),
                    reason: reason.to_string(),
                });
            }
            state.set(&name, status);
        }

        let outcome = RunOutcome {
            results: state.into_results(),
            duration: start.elapsed(),
            aborted: aborting,
        };

        let counts = outcome.counts();
        self.reporter.report(&TaskEvent::AllCompleted {
            total: counts.total,
            succeeded: counts.succeeded,
            failed: counts.failed,
            skipped: counts.skipped,
            duration: outcome.duration,
        });
        info!(
            succeeded = counts.succeeded,
            failed = counts.failed,
            skipped = counts.skipped,
            aborted = outcome.aborted,
            "run finished"
        );

        Ok(outcome)
    }

    /// Record a finished task. While aborting, waiting dependents are left
    /// for the final abort sweep.
    fn complete(
        &self,
        state: &mut RunState<'_>,
        name: String,
        outcome: TaskOutcome,
        duration: Duration,
        aborting: bool,
    ) {
        state.durations.insert(name.clone(), duration);
        match outcome {
            TaskOutcome::Success => {
                self.reporter.report(&TaskEvent::Succeeded {
                    package: name.clone(),
                    duration,
                });
                state.set(&name, PackageStatus::Succeeded);
                state.release_dependents(&name);
            }
            TaskOutcome::Failure(detail) => {
                self.reporter.report(&TaskEvent::Failed {
                    package: name.clone(),
                    duration,
                    error: detail.clone(),
                });
                state.set(&name, PackageStatus::Failed(detail));
                if aborting {
                    return;
                }
                for skipped in state.skip_dependents(&name) {
                    debug!(package = %skipped, dependency = %name, "skipping dependent");
                    self.reporter.report(&TaskEvent::Skipped {
                        package: skipped,
                        reason: SkipReason::DependencyFailed(name.clone()).to_string(),
                    });
                }
            }
        }
    }
}

/// Run one package task on its own tokio task so a panic is caught and
/// attributed to the package.
fn spawn_task(
    running: &mut JoinSet<Completion>,
    package: Package,
    task: Arc<dyn PackageTask>,
    abort: &AbortSignal,
) {
    let kill = abort.child_token();
    running.spawn(async move {
        let started = Instant::now();
        let name = package.name.clone();
        let handle = tokio::spawn(async move { task.run(&package, kill).await });
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) if e.is_panic() => {
                TaskOutcome::Failure(format!("task panicked: {}", panic_message(e.into_panic())))
            }
            Err(e) => TaskOutcome::Failure(format!("task cancelled: {}", e)),
        };
        (name, outcome, started.elapsed())
    });
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Scheduler-owned bookkeeping for one run
struct RunState<'g> {
    graph: &'g DependencyGraph,
    statuses: BTreeMap<String, PackageStatus>,
    remaining: HashMap<String, usize>,
    ready: BTreeSet<String>,
    durations: HashMap<String, Duration>,
}

impl<'g> RunState<'g> {
    fn new(graph: &'g DependencyGraph) -> Self {
        let mut state = Self {
            graph,
            statuses: BTreeMap::new(),
            remaining: HashMap::new(),
            ready: BTreeSet::new(),
            durations: HashMap::new(),
        };
        for node in graph.nodes() {
            let count = node.dependencies.len();
            state.remaining.insert(node.name.clone(), count);
            if count == 0 {
                state.ready.insert(node.name.clone());
                state.statuses.insert(node.name.clone(), PackageStatus::Ready);
            } else {
                state.statuses.insert(node.name.clone(), PackageStatus::Pending);
            }
        }
        state
    }

    fn set(&mut self, name: &str, status: PackageStatus) {
        if let Some(current) = self.statuses.get_mut(name) {
            *current = status;
        }
    }

    /// Take the smallest ready name and mark it running
    fn next_ready(&mut self) -> Option<String> {
        let name = self.ready.pop_first()?;
        self.set(&name, PackageStatus::Running);
        Some(name)
    }

    fn release_dependents(&mut self, name: &str) {
        let Some(node) = self.graph.get(name) else {
            return;
        };
        for dependent in &node.dependents {
            if self.statuses.get(dependent) != Some(&PackageStatus::Pending) {
                continue;
            }
            if let Some(count) = self.remaining.get_mut(dependent) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.ready.insert(dependent.clone());
                    self.set(dependent, PackageStatus::Ready);
                }
            }
        }
    }

    /// Mark every transitive dependent still waiting as skipped; returns their names
    fn skip_dependents(&mut self, name: &str) -> Vec<String> {
        let mut skipped = Vec::new();
        for dependent in self.graph.transitive_dependents(name) {
            if matches!(
                self.statuses.get(&dependent),
                Some(PackageStatus::Pending | PackageStatus::Ready)
            ) {
                self.ready.remove(&dependent);
                self.set(
                    &dependent,
                    PackageStatus::Skipped(SkipReason::DependencyFailed(name.to_string())),
                );
                skipped.push(dependent);
            }
        }
        skipped
    }

    fn unfinished(&self) -> Vec<String> {
        self.statuses
            .iter()
            .filter(|(_, s)| !s.is_terminal())
            .map(|(n, _)| n.clone())
            .collect()
    }

    fn into_results(self) -> Vec<PackageResult> {
        let durations = self.durations;
        self.statuses
            .into_iter()
            .map(|(name, status)| PackageResult {
                duration: durations.get(&name).copied(),
                name,
                status,
            })
            .collect()
    }
}
