//! Console reporter with live, package-prefixed output

use console::style;

use tandem_tasks::{TaskEvent, TaskReporter};

use super::seconds;

/// Prints task progress to the terminal
pub struct ConsoleReporter {
    /// Width package names are padded to
    width: usize,
    /// Show the command on start
    verbose: bool,
}

impl ConsoleReporter {
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>, verbose: bool) -> Self {
        Self {
            width: names.into_iter().map(str::len).max().unwrap_or(0),
            verbose,
        }
    }

    fn prefix(&self, package: &str) -> String {
        format!("{:width$}", package, width = self.width)
    }
}

impl TaskReporter for ConsoleReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::Started { package, command } => {
                println!(
                    "  {} {} {}",
                    style("▸").dim(),
                    style(self.prefix(package)).bold(),
                    if self.verbose {
                        style(format!("({})", command)).dim().to_string()
                    } else {
                        String::new()
                    }
                );
            }
            TaskEvent::Output {
                package,
                line,
                is_stderr,
            } => {
                let prefix = self.prefix(package);
                if *is_stderr {
                    println!("  {} {} {}", style(prefix).red().dim(), style("|").dim(), line);
                } else {
                    println!("  {} {} {}", style(prefix).dim(), style("|").dim(), line);
                }
            }
            TaskEvent::Succeeded { package, duration } => {
                println!(
                    "  {} {} {}",
                    style("✓").green(),
                    style(self.prefix(package)).green(),
                    style(seconds(*duration)).dim()
                );
            }
            TaskEvent::Failed {
                package,
                duration,
                error,
            } => {
                println!(
                    "  {} {} {} {}",
                    style("✗").red(),
                    style(self.prefix(package)).red(),
                    style(seconds(*duration)).dim(),
                    style(error).red().dim()
                );
            }
            TaskEvent::Skipped { package, reason } => {
                println!(
                    "  {} {} {}",
                    style("○").yellow(),
                    style(self.prefix(package)).yellow(),
                    style(format!("({})", reason)).dim()
                );
            }
            TaskEvent::AbortRequested { running } => {
                println!(
                    "  {} interrupted, stopping {} running task{}",
                    style("!").yellow().bold(),
                    running,
                    if *running == 1 { "" } else { "s" }
                );
            }
            // The run summary is printed once the scheduler returns
            TaskEvent::AllCompleted { .. } => {}
        }
    }
}
