//! CLI definition and command handling

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

use tandem_core::ConfigOverrides;

use commands::{
    Context, ExecCommand, InstallCommand, LinkCommand, ListCommand, RunCommand,
};

/// tandem - run package tasks across an npm monorepo in dependency order
#[derive(Debug, Parser)]
#[command(name = "tandem")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Only select packages whose name matches this regex (repeatable)
    #[arg(short = 'i', long = "include", value_name = "REGEX", global = true)]
    pub include: Vec<String>,

    /// Drop packages whose name matches this regex (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "REGEX", global = true)]
    pub exclude: Vec<String>,

    /// Also select every package depending on a selected package
    #[arg(long, global = true)]
    pub dependents: bool,

    /// Also select every dependency of a selected package
    #[arg(long, global = true)]
    pub dependencies: bool,

    /// Maximum number of concurrently running tasks
    #[arg(short = 'j', long, value_name = "N", global = true)]
    pub concurrency: Option<usize>,

    /// Increase console log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// When to use colors
    #[arg(long, value_enum, default_value_t = ColorChoice::Auto, global = true)]
    pub color: ColorChoice,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Packages root, relative to the monorepo root
    #[arg(long, value_name = "DIR", global = true)]
    pub root: Option<PathBuf>,

    /// Monorepo root (defaults to the current directory)
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Color output setting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ColorChoice {
    /// Color when writing to a terminal
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorChoice {
    /// Apply the choice to console styling
    pub fn apply(self) {
        match self {
            Self::Auto => {}
            Self::Always => {
                console::set_colors_enabled(true);
                console::set_colors_enabled_stderr(true);
            }
            Self::Never => {
                console::set_colors_enabled(false);
                console::set_colors_enabled_stderr(false);
            }
        }
    }

    /// Whether log lines on stderr should carry ANSI colors
    pub fn ansi_stderr(self) -> bool {
        match self {
            Self::Auto => console::colors_enabled_stderr(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the package manager's install in every selected package
    Install(InstallCommand),

    /// Symlink local dependencies into each package's node_modules
    Link(LinkCommand),

    /// List the selected packages
    List(ListCommand),

    /// Run a package.json script in every package declaring it
    Run(RunCommand),

    /// Run an arbitrary executable in every selected package
    Exec(ExecCommand),
}

impl Cli {
    /// Command-line values that take precedence over the config file
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            expand_dependents: self.dependents,
            expand_dependencies: self.dependencies,
            concurrency: self.concurrency,
            packages_root: self.root.clone(),
        }
    }

    /// Whether human-readable progress should be printed
    pub fn shows_progress(&self) -> bool {
        !self.quiet && self.format == OutputFormat::Text
    }

    /// Execute a subcommand against the loaded context
    pub fn execute(&self, command: &Commands, context: &Context) -> anyhow::Result<()> {
        match command {
            Commands::Install(cmd) => cmd.execute(self, context),
            Commands::Link(cmd) => cmd.execute(self, context),
            Commands::List(cmd) => cmd.execute(self, context),
            Commands::Run(cmd) => cmd.execute(self, context),
            Commands::Exec(cmd) => cmd.execute(self, context),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tandem", "run", "build", "-i", "^@org/", "-i", "cli", "-x", "docs", "-j", "2",
            "--dependents", "-vv",
        ])
        .unwrap();

        assert_eq!(cli.include, vec!["^@org/", "cli"]);
        assert_eq!(cli.exclude, vec!["docs"]);
        assert_eq!(cli.concurrency, Some(2));
        assert_eq!(cli.verbose, 2);
        assert!(cli.dependents);
        assert!(!cli.dependencies);
        match cli.command {
            Some(Commands::Run(cmd)) => {
                assert_eq!(cmd.script, "build");
                assert!(cmd.args.is_empty());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_passthrough_arguments() {
        let cli = Cli::try_parse_from(["tandem", "exec", "ls", "--", "-la", "--color"]).unwrap();
        match cli.command {
            Some(Commands::Exec(cmd)) => {
                assert_eq!(cmd.executable, "ls");
                assert_eq!(cmd.args, vec!["-la", "--color"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand_parses() {
        let cli = Cli::try_parse_from(["tandem", "--format", "json"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.format, OutputFormat::Json);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from(["tandem", "--root", "libs", "--dependencies", "list"]).unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.packages_root, Some(PathBuf::from("libs")));
        assert!(overrides.expand_dependencies);
        assert_eq!(overrides.concurrency, None);
    }

    #[test]
    fn test_bad_color_value_rejected() {
        assert!(Cli::try_parse_from(["tandem", "--color", "sometimes", "list"]).is_err());
    }
}
