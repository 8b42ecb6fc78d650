//! Error types for tandem

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using TandemError
pub type Result<T> = std::result::Result<T, TandemError>;

/// Main error type for tandem operations
#[derive(Debug, Error)]
pub enum TandemError {
    /// Configuration-related errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Package selection errors
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Dependency graph errors
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// Manifest read/write errors
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Local package linking errors
    #[error(transparent)]
    Link(#[from] LinkError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration: {field} - {message}")]
    InvalidValue { field: String, message: String },

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// IO error
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while computing the working set
#[derive(Debug, Error)]
pub enum SelectionError {
    /// A filter pattern is not a valid regular expression
    #[error("Invalid filter pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The packages root directory does not exist
    #[error("Packages root not found at {0}")]
    PathNotFound(PathBuf),
}

/// Dependency graph errors
#[derive(Debug, Error)]
pub enum GraphError {
    /// The local dependency graph contains at least one cycle
    #[error("Circular dependencies detected: {}", format_cycles(.0))]
    Cyclic(Vec<Vec<String>>),
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|c| c.join(" -> "))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Manifest (package.json) errors
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Failed to read the manifest
    #[error("Failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the manifest
    #[error("Failed to parse manifest {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Failed to write the manifest
    #[error("Failed to write manifest {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The manifest parsed but does not have the expected shape
    #[error("Malformed manifest {path}: {message}")]
    Malformed { path: PathBuf, message: String },
}

/// Errors while linking local packages into node_modules
#[derive(Debug, Error)]
pub enum LinkError {
    /// Something other than a symlink already occupies the link location
    #[error("Cannot link {name}: {path} exists and is not a symlink")]
    Conflict { name: String, path: PathBuf },

    /// Filesystem failure while creating the link
    #[error("Failed to link {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cyclic_message_lists_cycles() {
        let err = GraphError::Cyclic(vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string(), "d".to_string(), "e".to_string()],
        ]);
        assert_eq!(
            err.to_string(),
            "Circular dependencies detected: a -> b; c -> d -> e"
        );
    }

    #[test]
    fn test_selection_error_converts() {
        let err: TandemError = SelectionError::PathNotFound(PathBuf::from("packages")).into();
        assert!(matches!(
            err,
            TandemError::Selection(SelectionError::PathNotFound(_))
        ));
        assert_eq!(err.to_string(), "Packages root not found at packages");
    }
}
