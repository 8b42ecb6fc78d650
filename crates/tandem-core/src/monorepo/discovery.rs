//! Package discovery under the packages root

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

use glob::{glob, Pattern};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result, SelectionError};
use crate::types::{link_dependents, Package};

/// Manifest file name of an npm-style package
pub const MANIFEST_NAME: &str = "package.json";

/// The subset of package.json discovery cares about
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageJson {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    scripts: BTreeMap<String, String>,
    #[serde(default)]
    dependencies: HashMap<String, serde_json::Value>,
    #[serde(default)]
    dev_dependencies: HashMap<String, serde_json::Value>,
    #[serde(default)]
    peer_dependencies: HashMap<String, serde_json::Value>,
}

/// Package discovery for a packages root directory.
///
/// Packages are `<root>/<dir>/package.json` or, for scoped layouts,
/// `<root>/@scope/<dir>/package.json`.
pub struct PackageDiscovery {
    root: PathBuf,
}

impl PackageDiscovery {
    /// Create a new package discovery instance
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The packages root being searched
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Discover all packages, sorted by name, with local edges resolved
    pub fn discover(&self) -> Result<Vec<Package>> {
        if !self.root.is_dir() {
            return Err(SelectionError::PathNotFound(self.root.clone()).into());
        }

        debug!(root = %self.root.display(), "discovering packages");

        let mut packages: Vec<Package> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut all_deps: HashMap<String, BTreeSet<String>> = HashMap::new();

        // The root is matched literally, only the package levels are wildcards
        let root = Pattern::escape(&self.root.to_string_lossy());
        for pattern in [
            format!("*/{}", MANIFEST_NAME),
            format!("@*/*/{}", MANIFEST_NAME),
        ] {
            let full_pattern = format!("{}/{}", root.trim_end_matches('/'), pattern);

            let entries = glob(&full_pattern).map_err(|e| ConfigError::InvalidValue {
                field: "packages_root".to_string(),
                message: e.to_string(),
            })?;

            for entry in entries {
                let manifest_path = match entry {
                    Ok(path) => path,
                    Err(e) => {
                        warn!(error = %e, "unreadable path while discovering packages");
                        continue;
                    }
                };

                let Some((pkg, deps)) = self.parse_package(&manifest_path) else {
                    continue;
                };

                if !seen.insert(pkg.name.clone()) {
                    warn!(
                        name = %pkg.name,
                        path = %manifest_path.display(),
                        "duplicate package name, ignoring"
                    );
                    continue;
                }

                all_deps.insert(pkg.name.clone(), deps);
                packages.push(pkg);
            }
        }

        for pkg in &mut packages {
            if let Some(deps) = all_deps.remove(&pkg.name) {
                pkg.local_dependencies = deps.into_iter().filter(|d| seen.contains(d)).collect();
            }
        }
        link_dependents(&mut packages);
        packages.sort_by(|a, b| a.name.cmp(&b.name));

        info!(count = packages.len(), "discovered packages");
        Ok(packages)
    }

    /// Parse a package from its manifest, returning it with every declared dependency name
    fn parse_package(&self, manifest_path: &Path) -> Option<(Package, BTreeSet<String>)> {
        let content = match std::fs::read_to_string(manifest_path) {
            Ok(content) => content,
            Err(e) => {
                warn!(path = %manifest_path.display(), error = %e, "cannot read manifest");
                return None;
            }
        };

        let manifest: PackageJson = match serde_json::from_str(&content) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(path = %manifest_path.display(), error = %e, "cannot parse manifest");
                return None;
            }
        };

        let Some(name) = manifest.name else {
            warn!(path = %manifest_path.display(), "manifest has no name, skipping");
            return None;
        };

        let deps: BTreeSet<String> = manifest
            .dependencies
            .into_keys()
            .chain(manifest.dev_dependencies.into_keys())
            .chain(manifest.peer_dependencies.into_keys())
            .collect();

        let path = manifest_path
            .parent()
            .unwrap_or(Path::new("."))
            .to_path_buf();

        Some((
            Package {
                name,
                version: manifest.version,
                path,
                manifest_path: manifest_path.to_path_buf(),
                scripts: manifest.scripts,
                local_dependencies: BTreeSet::new(),
                local_dependents: BTreeSet::new(),
            },
            deps,
        ))
    }
}
