//! Shared execution of one task over a working set

use std::sync::Arc;

use console::style;
use tracing::warn;

use tandem_core::WorkingSet;
use tandem_tasks::{
    AbortSignal, ExitHooks, PackageStatus, PackageTask, RunOutcome, RunStatus, SchedulerOptions,
    TaskReporter, TaskReporterRegistry, TaskScheduler,
};

use crate::cli::output::{self, ConsoleReporter};
use crate::cli::{Cli, OutputFormat};

use super::{CommandError, Context};

/// Terminates every registered child when dropped
struct Teardown(ExitHooks);

impl Drop for Teardown {
    fn drop(&mut self) {
        self.0.terminate_all();
    }
}

/// Run the task built by `make_task` for every package of `working_set`.
///
/// SIGINT, SIGTERM and SIGHUP raise the abort signal; every child still
/// registered is terminated on the way out, whatever the result.
pub fn run_packages<F>(
    cli: &Cli,
    context: &Context,
    working_set: &WorkingSet,
    make_task: F,
) -> anyhow::Result<()>
where
    F: FnOnce(Arc<dyn TaskReporter>, ExitHooks) -> Arc<dyn PackageTask>,
{
    if working_set.is_empty() {
        if cli.format == OutputFormat::Json {
            let empty = RunOutcome {
                results: Vec::new(),
                duration: Default::default(),
                aborted: false,
            };
            println!("{}", serde_json::to_string_pretty(&summary_json(&empty))?);
        } else if !cli.quiet {
            output::warning("No packages selected");
        }
        return Ok(());
    }

    let mut registry = TaskReporterRegistry::new();
    if cli.shows_progress() {
        registry.register(ConsoleReporter::new(working_set.names(), cli.verbose > 0));
    }
    let reporter: Arc<dyn TaskReporter> = Arc::new(registry);

    let hooks = ExitHooks::new();
    let _teardown = Teardown(hooks.clone());
    let task = make_task(reporter.clone(), hooks);
    let scheduler = TaskScheduler::new(
        SchedulerOptions {
            concurrency: context.run.concurrency,
        },
        reporter,
    )?;

    if cli.shows_progress() {
        output::info(&format!(
            "{} in {}",
            style(task.describe()).bold(),
            output::count(working_set.len(), "package")
        ));
        println!();
    }

    let abort = AbortSignal::new();
    let runtime = tokio::runtime::Runtime::new()?;
    let outcome = runtime.block_on(async {
        let signal = abort.clone();
        tokio::spawn(async move {
            if let Some(name) = shutdown_signal().await {
                warn!(signal = name, "signal received, aborting run");
                signal.abort();
            }
        });
        scheduler.execute(working_set, task, &abort).await
    })?;

    report_outcome(cli, &outcome)
}

/// Wait for the first of SIGINT, SIGTERM or SIGHUP and return its name.
///
/// Returns `None` when no handler could be installed.
#[cfg(unix)]
async fn shutdown_signal() -> Option<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut terminate, mut hangup) =
        match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
            (Ok(terminate), Ok(hangup)) => (terminate, hangup),
            (Err(e), _) | (_, Err(e)) => {
                warn!(error = %e, "failed to install signal handlers, only ctrl-c aborts");
                return tokio::signal::ctrl_c().await.ok().map(|()| "SIGINT");
            }
        };

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.ok().map(|()| "SIGINT"),
        _ = terminate.recv() => Some("SIGTERM"),
        _ = hangup.recv() => Some("SIGHUP"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Option<&'static str> {
    tokio::signal::ctrl_c().await.ok().map(|()| "ctrl-c")
}

/// Print the summary and turn the run status into the command result
fn report_outcome(cli: &Cli, outcome: &RunOutcome) -> anyhow::Result<()> {
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary_json(outcome))?),
        OutputFormat::Text if !cli.quiet => print_summary(outcome),
        OutputFormat::Text => {}
    }

    match outcome.status() {
        RunStatus::Succeeded => Ok(()),
        RunStatus::Failed => Err(CommandError::TasksFailed {
            failed: outcome.counts().failed,
        }
        .into()),
        RunStatus::Aborted => Err(CommandError::Aborted.into()),
    }
}

fn print_summary(outcome: &RunOutcome) {
    let width = outcome
        .results
        .iter()
        .map(|r| r.name.len())
        .max()
        .unwrap_or(0);

    println!();
    println!("{}", output::header("Summary"));
    for result in &outcome.results {
        let name = format!("{:width$}", result.name, width = width);
        let timing = result.duration.map(output::seconds).unwrap_or_default();
        match &result.status {
            PackageStatus::Succeeded => {
                println!("  {} {} {}", style("✓").green(), name, style(timing).dim());
            }
            PackageStatus::Failed(detail) => {
                println!(
                    "  {} {} {} {}",
                    style("✗").red(),
                    style(name).red(),
                    style(timing).dim(),
                    detail
                );
            }
            PackageStatus::Skipped(reason) => {
                println!(
                    "  {} {} {}",
                    style("○").yellow(),
                    style(name).yellow(),
                    style(reason).dim()
                );
            }
            other => println!("  {} {} {}", style("?").dim(), name, other),
        }
    }
    println!();

    let counts = outcome.counts();
    let line = format!(
        "{}/{} succeeded, {} failed, {} skipped ({})",
        counts.succeeded,
        counts.total,
        counts.failed,
        counts.skipped,
        output::seconds(outcome.duration)
    );
    match outcome.status() {
        RunStatus::Succeeded => output::success(&line),
        RunStatus::Failed => output::error(&line),
        RunStatus::Aborted => output::error(&format!("aborted: {}", line)),
    }
}

/// Machine-readable run summary
fn summary_json(outcome: &RunOutcome) -> serde_json::Value {
    let counts = outcome.counts();
    let status = match outcome.status() {
        RunStatus::Succeeded => "succeeded",
        RunStatus::Failed => "failed",
        RunStatus::Aborted => "aborted",
    };

    serde_json::json!({
        "status": status,
        "total": counts.total,
        "succeeded": counts.succeeded,
        "failed": counts.failed,
        "skipped": counts.skipped,
        "duration_ms": outcome.duration.as_millis() as u64,
        "packages": outcome.results.iter().map(|r| {
            let (state, detail) = match &r.status {
                PackageStatus::Succeeded => ("succeeded", None),
                PackageStatus::Failed(detail) => ("failed", Some(detail.clone())),
                PackageStatus::Skipped(reason) => ("skipped", Some(reason.to_string())),
                other => ("unfinished", Some(other.to_string())),
            };
            serde_json::json!({
                "name": r.name,
                "status": state,
                "detail": detail,
                "duration_ms": r.duration.map(|d| d.as_millis() as u64),
            })
        }).collect::<Vec<_>>(),
    })
}
