//! Monorepo support
//!
//! - Package discovery under a packages root
//! - Dependency graph analysis with topological sorting and cycle detection
//! - Working set selection with transitive expansion

pub mod discovery;
pub mod graph;
pub mod selection;

pub use discovery::PackageDiscovery;
pub use graph::{DependencyGraph, PackageNode};
pub use selection::{resolve_working_set, select, SelectionCriteria, WorkingSet};
