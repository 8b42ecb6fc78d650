//! Manifest mutation guard
//!
//! While the package manager runs inside a package, entries naming other
//! monorepo packages are removed from `dependencies` and `devDependencies`
//! so the package manager does not try to fetch them from a registry. The
//! removed entries are put back afterwards and both fields are re-sorted.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, instrument};

use tandem_core::error::Result;

use crate::manifest::{sort_keys, DependencyField, PackageManifest};

/// Entries removed from a manifest by [`mangle`], per dependency field
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MangleRecord {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dependencies: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub dev_dependencies: BTreeMap<String, Value>,
}

impl MangleRecord {
    /// Removed entries of one field
    pub fn field(&self, field: DependencyField) -> &BTreeMap<String, Value> {
        match field {
            DependencyField::Dependencies => &self.dependencies,
            DependencyField::DevDependencies => &self.dev_dependencies,
        }
    }

    fn field_mut(&mut self, field: DependencyField) -> &mut BTreeMap<String, Value> {
        match field {
            DependencyField::Dependencies => &mut self.dependencies,
            DependencyField::DevDependencies => &mut self.dev_dependencies,
        }
    }

    /// Whether nothing was removed
    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty() && self.dev_dependencies.is_empty()
    }

    /// Total number of removed entries
    pub fn len(&self) -> usize {
        self.dependencies.len() + self.dev_dependencies.len()
    }
}

/// Remove every dependency entry naming one of `excluded` and write the manifest back
#[instrument(skip(excluded), fields(path = %manifest_path.display()))]
pub fn mangle(manifest_path: &Path, excluded: &HashSet<String>) -> Result<MangleRecord> {
    let mut manifest = PackageManifest::load(manifest_path)?;
    let mut record = MangleRecord::default();

    for field in DependencyField::ALL {
        let Some(deps) = manifest.dependencies_mut(field)? else {
            continue;
        };
        let removed = record.field_mut(field);
        deps.retain(|name, version| {
            if excluded.contains(name) {
                removed.insert(name.clone(), version.clone());
                false
            } else {
                true
            }
        });
    }

    manifest.save()?;
    debug!(removed = record.len(), "manifest mangled");
    Ok(record)
}

/// Put the entries of `record` back and sort both dependency fields.
///
/// The on-disk manifest is re-read first; a value written by the external
/// command for a recorded key is kept.
#[instrument(skip(record), fields(path = %manifest_path.display(), restored = record.len()))]
pub fn unmangle(manifest_path: &Path, record: &MangleRecord) -> Result<()> {
    let mut manifest = PackageManifest::load(manifest_path)?;

    for field in DependencyField::ALL {
        let removed = record.field(field);
        let deps = if removed.is_empty() {
            match manifest.dependencies_mut(field)? {
                Some(deps) => deps,
                None => continue,
            }
        } else {
            manifest.dependencies_entry(field)?
        };

        for (name, version) in removed {
            if !deps.contains_key(name) {
                deps.insert(name.clone(), version.clone());
            }
        }
        sort_keys(deps);
    }

    manifest.save()?;
    debug!("manifest restored");
    Ok(())
}

/// Scoped mangle: restores the manifest exactly once, on [`restore`](Self::restore) or drop
#[derive(Debug)]
pub struct ManifestGuard {
    path: PathBuf,
    record: Option<MangleRecord>,
}

impl ManifestGuard {
    /// Mangle the manifest and return a guard owning the record
    pub fn mangle(manifest_path: &Path, excluded: &HashSet<String>) -> Result<Self> {
        let record = mangle(manifest_path, excluded)?;
        Ok(Self {
            path: manifest_path.to_path_buf(),
            record: Some(record),
        })
    }

    /// The removed entries, until restored
    pub fn record(&self) -> Option<&MangleRecord> {
        self.record.as_ref()
    }

    /// Restore the manifest now, reporting any failure
    pub fn restore(mut self) -> Result<()> {
        match self.record.take() {
            Some(record) => unmangle(&self.path, &record),
            None => Ok(()),
        }
    }
}

impl Drop for ManifestGuard {
    fn drop(&mut self) {
        if let Some(record) = self.record.take() {
            if let Err(e) = unmangle(&self.path, &record) {
                error!(path = %self.path.display(), error = %e, "failed to restore manifest");
            }
        }
    }
}
