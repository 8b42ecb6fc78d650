//! tandem - run package tasks across an npm monorepo in dependency order

mod cli;
mod exit_codes;

use std::path::Path;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use cli::commands::Context;
use cli::{output, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli.color.apply();

    let Some(command) = &cli.command else {
        // Printing help can only fail on a closed stdout
        let _ = Cli::command().print_help();
        println!();
        return ExitCode::from(exit_codes::NO_COMMAND);
    };

    let context = match Context::load(&cli) {
        Ok(context) => context,
        Err(e) => {
            output::error(&format!("{:#}", e));
            return ExitCode::from(exit_codes::exit_code_for(&e));
        }
    };

    let log_file = context.run.log_file.clone();
    let guard = init_tracing(&cli, &log_file);
    tracing::debug!(command = ?command, root = %context.run.root_dir.display(), "starting");

    let code = match cli.execute(command, &context) {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => {
            tracing::debug!(error = %format!("{:#}", e), "command failed");
            output::error(&format!("{:#}", e));
            exit_codes::exit_code_for(&e)
        }
    };

    // Flush the file layer before deciding whether to keep the log
    drop(guard);
    if code == exit_codes::SUCCESS {
        let _ = std::fs::remove_file(&log_file);
    } else if log_file.is_file() && !cli.quiet {
        output::warning(&format!("Debug log written to {}", log_file.display()));
    }

    ExitCode::from(code)
}

/// Console filter from `RUST_LOG`, else from `-q` / `-v` count
fn console_filter(cli: &Cli) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match (cli.quiet, cli.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            (false, 2) => "debug",
            (false, _) => "trace",
        };
        EnvFilter::new(level)
    })
}

/// Set up tracing with two layers:
/// - Console (stderr): controlled by RUST_LOG or -v (default: warn)
/// - File: debug-level JSON to the run's log artifact, truncated first
fn init_tracing(cli: &Cli, log_file: &Path) -> Option<WorkerGuard> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(cli.color.ansi_stderr())
        .with_target(false)
        .with_filter(console_filter(cli));

    if let Some((dir, name)) = prepare_log_file(log_file) {
        let file_appender = tracing_appender::rolling::never(dir, name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(console_layer)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(non_blocking)
                    .with_target(true)
                    .with_filter(EnvFilter::new("debug")),
            )
            .init();

        return Some(guard);
    }

    // Fallback: console only
    tracing_subscriber::registry().with(console_layer).init();
    None
}

/// Remove a stale log and return its directory and file name
fn prepare_log_file(log_file: &Path) -> Option<(&Path, &std::ffi::OsStr)> {
    let dir = log_file.parent()?;
    let name = log_file.file_name()?;
    std::fs::create_dir_all(dir).ok()?;
    match std::fs::remove_file(log_file) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(_) => return None,
    }
    Some((dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_prepare_log_file_removes_stale_log() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("tandem-debug.log");
        std::fs::write(&log, "old run").unwrap();

        let (dir, name) = prepare_log_file(&log).unwrap();
        assert_eq!(dir, temp.path());
        assert_eq!(name, "tandem-debug.log");
        assert!(!log.exists());
    }

    #[test]
    fn test_console_filter_levels() {
        let quiet = Cli::try_parse_from(["tandem", "-q", "-vv", "list"]).unwrap();
        let verbose = Cli::try_parse_from(["tandem", "-vv", "list"]).unwrap();
        if std::env::var_os("RUST_LOG").is_none() {
            assert_eq!(console_filter(&quiet).to_string(), "error");
            assert_eq!(console_filter(&verbose).to_string(), "debug");
        }
    }
}
