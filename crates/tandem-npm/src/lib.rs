//! tandem npm - package.json handling for the tandem monorepo task runner
//!
//! This crate edits package manifests (the manifest guard hides local
//! dependencies from the package manager for the duration of a task) and
//! links local packages into each other's node_modules.

pub mod guard;
pub mod link;
pub mod manifest;

pub use guard::{mangle, unmangle, MangleRecord, ManifestGuard};
pub use link::{CreatedLink, LinkStatus, Linker};
pub use manifest::{DependencyField, PackageManifest};
