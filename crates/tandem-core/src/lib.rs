//! tandem core - Core library for the tandem monorepo task runner
//!
//! This crate provides the package model, error handling, configuration,
//! package discovery, the local dependency graph and working set selection.

pub mod config;
pub mod error;
pub mod monorepo;
pub mod types;

pub use config::{Config, ConfigOverrides, RunConfig};
pub use error::{
    ConfigError, GraphError, LinkError, ManifestError, Result, SelectionError, TandemError,
};
pub use monorepo::{DependencyGraph, SelectionCriteria, WorkingSet};
pub use types::Package;
