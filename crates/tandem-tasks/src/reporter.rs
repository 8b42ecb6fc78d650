//! Task execution reporting

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Events emitted during a run
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// A package task is starting
    Started { package: String, command: String },
    /// A package task produced a line of output
    Output {
        package: String,
        line: String,
        is_stderr: bool,
    },
    /// A package task completed successfully
    Succeeded { package: String, duration: Duration },
    /// A package task failed
    Failed {
        package: String,
        duration: Duration,
        error: String,
    },
    /// A package was never started
    Skipped { package: String, reason: String },
    /// The abort signal was observed; `running` tasks are being stopped
    AbortRequested { running: usize },
    /// The run is over
    AllCompleted {
        total: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        duration: Duration,
    },
}

/// Trait for reporting task execution progress
pub trait TaskReporter: Send + Sync {
    /// Handle a task event
    fn report(&self, event: &TaskEvent);
}

/// Simple reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl TaskReporter for TracingReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Started { package, command } => {
                tracing::info!(%package, %command, "task started");
            }
            TaskEvent::Output {
                package,
                line,
                is_stderr,
            } => {
                tracing::debug!(%package, stderr = is_stderr, "{}", line);
            }
            TaskEvent::Succeeded { package, duration } => {
                tracing::info!(%package, "completed in {:.1}s", duration.as_secs_f64());
            }
            TaskEvent::Failed {
                package,
                duration,
                error,
            } => {
                tracing::error!(
                    %package,
                    "failed after {:.1}s: {}",
                    duration.as_secs_f64(),
                    error
                );
            }
            TaskEvent::Skipped { package, reason } => {
                tracing::info!(%package, "skipped: {}", reason);
            }
            TaskEvent::AbortRequested { running } => {
                tracing::warn!(running, "abort requested, stopping running tasks");
            }
            TaskEvent::AllCompleted {
                total,
                succeeded,
                failed,
                skipped,
                duration,
            } => {
                tracing::info!(
                    "All tasks complete: {}/{} succeeded, {} failed, {} skipped ({:.1}s)",
                    succeeded,
                    total,
                    failed,
                    skipped,
                    duration.as_secs_f64()
                );
            }
        }
    }
}

/// Reporter that collects events for later inspection
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<TaskEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Names of started packages, in start order
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                TaskEvent::Started { package, .. } => Some(package),
                _ => None,
            })
            .collect()
    }
}

impl TaskReporter for CollectingReporter {
    fn report(&self, event: &TaskEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Fan-out over several reporters
pub struct TaskReporterRegistry {
    reporters: Vec<Arc<dyn TaskReporter>>,
}

impl TaskReporterRegistry {
    pub fn new() -> Self {
        Self {
            reporters: vec![Arc::new(TracingReporter)],
        }
    }

    pub fn empty() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    pub fn register<R: TaskReporter + 'static>(&mut self, reporter: R) {
        self.reporters.push(Arc::new(reporter));
    }

    /// Register a reporter that is also held elsewhere
    pub fn register_shared(&mut self, reporter: Arc<dyn TaskReporter>) {
        self.reporters.push(reporter);
    }

    pub fn all(&self) -> &[Arc<dyn TaskReporter>] {
        &self.reporters
    }

    /// Broadcast an event to all registered reporters
    pub fn broadcast(&self, event: &TaskEvent) {
        for reporter in &self.reporters {
            reporter.report(event);
        }
    }
}

impl TaskReporter for TaskReporterRegistry {
    fn report(&self, event: &TaskEvent) {
        self.broadcast(event);
    }
}

impl Default for TaskReporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_reporter() {
        let reporter = CollectingReporter::default();

        reporter.report(&TaskEvent::Started {
            package: "core".to_string(),
            command: "npm install".to_string(),
        });
        reporter.report(&TaskEvent::Succeeded {
            package: "core".to_string(),
            duration: Duration::from_secs(5),
        });

        assert_eq!(reporter.events().len(), 2);
        assert_eq!(reporter.started(), vec!["core"]);
    }

    #[test]
    fn test_tracing_reporter() {
        let reporter = TracingReporter;

        // Just verify it doesn't panic
        reporter.report(&TaskEvent::AbortRequested { running: 2 });
        reporter.report(&TaskEvent::AllCompleted {
            total: 3,
            succeeded: 1,
            failed: 1,
            skipped: 1,
            duration: Duration::from_secs(1),
        });
    }

    #[test]
    fn test_broadcast() {
        let collecting = Arc::new(CollectingReporter::default());
        let mut registry = TaskReporterRegistry::empty();
        registry.register_shared(collecting.clone());
        registry.register(TracingReporter);
        assert_eq!(registry.all().len(), 2);

        registry.report(&TaskEvent::Skipped {
            package: "ui".to_string(),
            reason: "aborted".to_string(),
        });

        assert_eq!(collecting.events().len(), 1);
    }

    #[test]
    fn test_default_registry_traces() {
        assert_eq!(TaskReporterRegistry::default().all().len(), 1);
        assert!(TaskReporterRegistry::empty().all().is_empty());
    }
}
