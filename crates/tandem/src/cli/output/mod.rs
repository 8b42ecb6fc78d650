//! Output formatting utilities

pub mod reporter;

use std::time::Duration;

use console::{style, Style};

pub use reporter::ConsoleReporter;

/// Print a success message
pub fn success(message: &str) {
    println!("{} {}", style("✓").green().bold(), message);
}

/// Print an error message
pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), message);
}

/// Print a warning message
pub fn warning(message: &str) {
    eprintln!("{} {}", style("!").yellow().bold(), message);
}

/// Print an info message
pub fn info(message: &str) {
    println!("{} {}", style("→").blue(), message);
}

/// Create a styled header
pub fn header(text: &str) -> String {
    style(text).bold().to_string()
}

/// Seconds with one decimal, e.g. `1.2s`
pub fn seconds(duration: Duration) -> String {
    format!("{:.1}s", duration.as_secs_f64())
}

/// `1 package`, `2 packages`
pub fn count(n: usize, noun: &str) -> String {
    format!("{} {}{}", n, noun, if n == 1 { "" } else { "s" })
}

/// Style for package names
pub fn name_style() -> Style {
    Style::new().cyan()
}

/// Style for version numbers
pub fn version_style() -> Style {
    Style::new().green()
}

/// Style for paths
pub fn path_style() -> Style {
    Style::new().dim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_and_seconds() {
        assert_eq!(count(1, "package"), "1 package");
        assert_eq!(count(3, "package"), "3 packages");
        assert_eq!(seconds(Duration::from_millis(1250)), "1.2s");
    }
}
