//! Core types

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A package living inside the monorepo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Package name (unique within the monorepo)
    pub name: String,
    /// Declared version, if any
    pub version: Option<String>,
    /// Path to the package directory
    pub path: PathBuf,
    /// Path to the package.json file
    pub manifest_path: PathBuf,
    /// Declared scripts (script name -> command)
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
    /// Monorepo packages this package depends on
    #[serde(default)]
    pub local_dependencies: BTreeSet<String>,
    /// Monorepo packages depending on this package
    #[serde(default)]
    pub local_dependents: BTreeSet<String>,
}

impl Package {
    /// Create a package rooted at `path` with no scripts or local edges
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: name.into(),
            version: None,
            manifest_path: path.join("package.json"),
            path,
            scripts: BTreeMap::new(),
            local_dependencies: BTreeSet::new(),
            local_dependents: BTreeSet::new(),
        }
    }

    /// Add a local dependency
    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.local_dependencies.insert(name.into());
        self
    }

    /// Add a script
    pub fn with_script(mut self, name: impl Into<String>, command: impl Into<String>) -> Self {
        self.scripts.insert(name.into(), command.into());
        self
    }

    /// Whether the package declares the given script
    pub fn has_script(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }
}

/// Fill in `local_dependents` from the `local_dependencies` of the whole set.
///
/// Dependencies naming packages outside the set are dropped.
pub fn link_dependents(packages: &mut [Package]) {
    let names: BTreeSet<String> = packages.iter().map(|p| p.name.clone()).collect();
    let mut dependents: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

    for pkg in packages.iter_mut() {
        pkg.local_dependencies.retain(|d| names.contains(d) && *d != pkg.name);
        for dep in &pkg.local_dependencies {
            dependents
                .entry(dep.clone())
                .or_default()
                .insert(pkg.name.clone());
        }
    }

    for pkg in packages.iter_mut() {
        pkg.local_dependents = dependents.remove(&pkg.name).unwrap_or_default();
    }
}
