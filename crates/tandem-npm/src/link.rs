//! Linking of local packages into each other's node_modules

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use tandem_core::error::{LinkError, Result};
use tandem_core::Package;

/// What happened to a single dependency link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkStatus {
    /// A new symlink was created
    Created,
    /// An existing symlink was replaced
    Replaced,
}

/// A link created for one local dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedLink {
    /// Dependency name
    pub name: String,
    /// Path of the link inside node_modules
    pub link: PathBuf,
    /// Directory the link points at
    pub target: PathBuf,
    pub status: LinkStatus,
}

/// Symlinks local dependencies into `<package>/node_modules`
#[derive(Debug, Clone)]
pub struct Linker {
    locations: HashMap<String, PathBuf>,
}

impl Linker {
    /// Create a linker knowing the location of every local package
    pub fn new<'a>(packages: impl IntoIterator<Item = &'a Package>) -> Self {
        Self {
            locations: packages
                .into_iter()
                .map(|p| (p.name.clone(), p.path.clone()))
                .collect(),
        }
    }

    /// Link every local dependency of `package`.
    ///
    /// Stops at the first dependency that cannot be linked.
    pub fn link(&self, package: &Package) -> Result<Vec<CreatedLink>> {
        let node_modules = package.path.join("node_modules");
        let mut created = Vec::new();

        for name in &package.local_dependencies {
            let Some(target) = self.locations.get(name) else {
                debug!(package = %package.name, dependency = %name, "dependency location unknown");
                continue;
            };

            // Scoped names (@scope/name) nest one directory deeper
            let link = node_modules.join(name);
            let status = prepare_link_location(name, &link)?;
            create_dir_symlink(target, &link).map_err(|source| LinkError::Io {
                path: link.clone(),
                source,
            })?;

            debug!(
                package = %package.name,
                dependency = %name,
                link = %link.display(),
                "linked local dependency"
            );
            created.push(CreatedLink {
                name: name.clone(),
                link,
                target: target.clone(),
                status,
            });
        }

        Ok(created)
    }
}

/// Make sure `link` can be created: parents exist and no stale symlink is in the way
fn prepare_link_location(name: &str, link: &Path) -> Result<LinkStatus> {
    if let Some(parent) = link.parent() {
        std::fs::create_dir_all(parent).map_err(|source| LinkError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    match std::fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            remove_symlink(link).map_err(|source| LinkError::Io {
                path: link.to_path_buf(),
                source,
            })?;
            Ok(LinkStatus::Replaced)
        }
        Ok(_) => Err(LinkError::Conflict {
            name: name.to_string(),
            path: link.to_path_buf(),
        }
        .into()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LinkStatus::Created),
        Err(source) => Err(LinkError::Io {
            path: link.to_path_buf(),
            source,
        }
        .into()),
    }
}

#[cfg(unix)]
fn create_dir_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_dir_symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(unix)]
fn remove_symlink(link: &Path) -> std::io::Result<()> {
    std::fs::remove_file(link)
}

#[cfg(windows)]
fn remove_symlink(link: &Path) -> std::io::Result<()> {
    std::fs::remove_dir(link).or_else(|_| std::fs::remove_file(link))
}
