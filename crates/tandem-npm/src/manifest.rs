//! package.json document handling
//!
//! The manifest is kept as an untyped JSON object so that fields tandem does
//! not know about survive a load/save cycle in their original order.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use tandem_core::error::{ManifestError, Result};

/// The two dependency fields the manifest guard edits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyField {
    Dependencies,
    DevDependencies,
}

impl DependencyField {
    /// Both fields, in manifest order
    pub const ALL: [DependencyField; 2] = [Self::Dependencies, Self::DevDependencies];

    /// JSON key of the field
    pub fn key(&self) -> &'static str {
        match self {
            Self::Dependencies => "dependencies",
            Self::DevDependencies => "devDependencies",
        }
    }
}

impl std::fmt::Display for DependencyField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A parsed package.json
#[derive(Debug, Clone)]
pub struct PackageManifest {
    path: PathBuf,
    fields: Map<String, Value>,
}

impl PackageManifest {
    /// Load package.json from path
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let value: Value =
            serde_json::from_str(&content).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        match value {
            Value::Object(fields) => Ok(Self {
                path: path.to_path_buf(),
                fields,
            }),
            _ => Err(ManifestError::Malformed {
                path: path.to_path_buf(),
                message: "top-level value is not an object".to_string(),
            }
            .into()),
        }
    }

    /// Save package.json back to where it was loaded from, pretty-printed
    pub fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.fields).map_err(|source| {
            ManifestError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;

        // Ensure trailing newline
        let content = if content.ends_with('\n') {
            content
        } else {
            format!("{}\n", content)
        };

        std::fs::write(&self.path, content).map_err(|source| {
            ManifestError::Write {
                path: self.path.clone(),
                source,
            }
            .into()
        })
    }

    /// Path of the manifest file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Package name, if declared
    pub fn name(&self) -> Option<&str> {
        self.fields.get("name").and_then(Value::as_str)
    }

    /// A dependency field, if present
    pub fn dependencies(&self, field: DependencyField) -> Result<Option<&Map<String, Value>>> {
        match self.fields.get(field.key()) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(malformed_field(&self.path, field)),
        }
    }

    /// A dependency field for editing, if present
    pub fn dependencies_mut(
        &mut self,
        field: DependencyField,
    ) -> Result<Option<&mut Map<String, Value>>> {
        match self.fields.get_mut(field.key()) {
            None => Ok(None),
            Some(Value::Object(map)) => Ok(Some(map)),
            Some(_) => Err(malformed_field(&self.path, field)),
        }
    }

    /// A dependency field for editing, created empty at the end if absent
    pub fn dependencies_entry(&mut self, field: DependencyField) -> Result<&mut Map<String, Value>> {
        let path = &self.path;
        self.fields
            .entry(field.key())
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| malformed_field(path, field))
    }
}

fn malformed_field(path: &Path, field: DependencyField) -> tandem_core::TandemError {
    ManifestError::Malformed {
        path: path.to_path_buf(),
        message: format!("'{}' is not an object", field),
    }
    .into()
}

/// Re-insert every key of `map` in ascending order
pub fn sort_keys(map: &mut Map<String, Value>) {
    let mut entries: Vec<(String, Value)> = std::mem::take(map).into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    map.extend(entries);
}
