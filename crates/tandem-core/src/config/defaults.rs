//! Default configuration values

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "tandem.toml";

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "tandem.yaml";

/// Default directory holding the monorepo packages
pub const DEFAULT_PACKAGES_ROOT: &str = "packages";

/// Default number of concurrently running tasks
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Default package manager executable
pub const DEFAULT_PACKAGE_MANAGER: &str = "npm";

/// Default name of the per-run debug log
pub const DEFAULT_LOG_FILE: &str = "tandem-debug.log";

/// Config file names checked in each directory, in priority order
pub const CONFIG_FILE_NAMES: [&str; 4] = [
    DEFAULT_CONFIG_TOML,
    DEFAULT_CONFIG_YAML,
    ".tandem.toml",
    ".tandem.yaml",
];
