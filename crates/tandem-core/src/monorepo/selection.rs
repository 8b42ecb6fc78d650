//! Working set selection
//!
//! Filters the discovered packages by name patterns, optionally expands the
//! result with transitive dependents and/or dependencies, and applies a final
//! predicate (e.g. "declares script X").

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info, instrument};

use crate::error::{Result, SelectionError};
use crate::types::Package;

use super::discovery::PackageDiscovery;
use super::graph::DependencyGraph;

type Predicate = Arc<dyn Fn(&Package) -> bool + Send + Sync>;

/// Criteria used to compute a working set
#[derive(Clone, Default)]
pub struct SelectionCriteria {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    expand_dependents: bool,
    expand_dependencies: bool,
    predicate: Option<(String, Predicate)>,
}

impl fmt::Debug for SelectionCriteria {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionCriteria")
            .field(
                "include",
                &self.include.iter().map(Regex::as_str).collect::<Vec<_>>(),
            )
            .field(
                "exclude",
                &self.exclude.iter().map(Regex::as_str).collect::<Vec<_>>(),
            )
            .field("expand_dependents", &self.expand_dependents)
            .field("expand_dependencies", &self.expand_dependencies)
            .field("predicate", &self.predicate.as_ref().map(|(d, _)| d))
            .finish()
    }
}

impl SelectionCriteria {
    /// Compile include and exclude patterns
    pub fn new<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Result<Self> {
        Ok(Self {
            include: compile_patterns(include)?,
            exclude: compile_patterns(exclude)?,
            ..Default::default()
        })
    }

    /// Also select every package transitively depending on a matched package
    pub fn with_dependents(mut self, expand: bool) -> Self {
        self.expand_dependents = expand;
        self
    }

    /// Also select every transitive dependency of a matched package
    pub fn with_dependencies(mut self, expand: bool) -> Self {
        self.expand_dependencies = expand;
        self
    }

    /// Keep only packages satisfying `predicate`, applied after expansion
    pub fn with_predicate<F>(mut self, description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Package) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some((description.into(), Arc::new(predicate)));
        self
    }

    /// Keep only packages declaring the given script
    pub fn with_script(self, script: &str) -> Self {
        let name = script.to_string();
        self.with_predicate(format!("has script '{}'", script), move |pkg| {
            pkg.has_script(&name)
        })
    }

    /// Whether a name passes the include/exclude filters
    pub fn matches_name(&self, name: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|re| re.is_match(name));
        included && !self.exclude.iter().any(|re| re.is_match(name))
    }
}

fn compile_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p.as_ref()).map_err(|source| {
                SelectionError::InvalidPattern {
                    pattern: p.as_ref().to_string(),
                    source,
                }
                .into()
            })
        })
        .collect()
}

/// Packages selected for a run, unique by name and sorted by name
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    packages: Vec<Package>,
    index: HashMap<String, usize>,
}

impl WorkingSet {
    /// Build a working set, deduplicating by name and sorting
    pub fn new(packages: impl IntoIterator<Item = Package>) -> Self {
        let by_name: BTreeMap<String, Package> = packages
            .into_iter()
            .map(|p| (p.name.clone(), p))
            .collect();
        let packages: Vec<Package> = by_name.into_values().collect();
        let index = packages
            .iter()
            .enumerate()
            .map(|(i, p)| (p.name.clone(), i))
            .collect();
        Self { packages, index }
    }

    /// Packages in name order
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    /// Iterate over packages in name order
    pub fn iter(&self) -> std::slice::Iter<'_, Package> {
        self.packages.iter()
    }

    /// Look up a package by name
    pub fn get(&self, name: &str) -> Option<&Package> {
        self.index.get(name).map(|&i| &self.packages[i])
    }

    /// Whether a package is in the set
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Package names in name order
    pub fn names(&self) -> Vec<&str> {
        self.packages.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl<'a> IntoIterator for &'a WorkingSet {
    type Item = &'a Package;
    type IntoIter = std::slice::Iter<'a, Package>;

    fn into_iter(self) -> Self::IntoIter {
        self.packages.iter()
    }
}

/// Compute the working set from all discovered packages
#[instrument(skip_all, fields(packages = packages.len()))]
pub fn select(packages: &[Package], criteria: &SelectionCriteria) -> WorkingSet {
    let mut selected: HashMap<&str, &Package> = packages
        .iter()
        .filter(|p| criteria.matches_name(&p.name))
        .map(|p| (p.name.as_str(), p))
        .collect();

    debug!(matched = selected.len(), "filtered packages by name");

    if criteria.expand_dependents || criteria.expand_dependencies {
        let graph = DependencyGraph::build(packages);
        let by_name: HashMap<&str, &Package> =
            packages.iter().map(|p| (p.name.as_str(), p)).collect();
        let seeds: Vec<&str> = selected.keys().copied().collect();

        for seed in seeds {
            let mut reached = Vec::new();
            if criteria.expand_dependents {
                reached.extend(graph.transitive_dependents(seed));
            }
            if criteria.expand_dependencies {
                reached.extend(graph.transitive_dependencies(seed));
            }
            for name in reached {
                if let Some(&pkg) = by_name.get(name.as_str()) {
                    selected.entry(pkg.name.as_str()).or_insert(pkg);
                }
            }
        }

        debug!(expanded = selected.len(), "expanded selection");
    }

    let working_set = WorkingSet::new(
        selected
            .into_values()
            .filter(|p| match &criteria.predicate {
                Some((_, predicate)) => predicate(*p),
                None => true,
            })
            .cloned(),
    );

    info!(selected = working_set.len(), "working set computed");
    working_set
}

/// Discover packages under `packages_root` and select the working set
pub fn resolve_working_set(packages_root: &Path, criteria: &SelectionCriteria) -> Result<WorkingSet> {
    let packages = PackageDiscovery::new(packages_root).discover()?;
    Ok(select(&packages, criteria))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TandemError;
    use crate::types::link_dependents;

    /// app -> ui -> core, app -> core, cli -> core, docs standalone
    fn create_packages() -> Vec<Package> {
        let mut packages = vec![
            Package::new("@org/core", "packages/core").with_script("build", "tsc"),
            Package::new("@org/ui", "packages/ui")
                .with_dependency("@org/core")
                .with_script("build", "tsc"),
            Package::new("@org/app", "packages/app")
                .with_dependency("@org/ui")
                .with_dependency("@org/core"),
            Package::new("cli", "packages/cli").with_dependency("@org/core"),
            Package::new("docs", "packages/docs"),
        ];
        link_dependents(&mut packages);
        packages
    }

    fn criteria(include: &[&str], exclude: &[&str]) -> SelectionCriteria {
        SelectionCriteria::new(include, exclude).unwrap()
    }

    #[test]
    fn test_no_filters_selects_everything_sorted() {
        let set = select(&create_packages(), &SelectionCriteria::default());
        assert_eq!(
            set.names(),
            vec!["@org/app", "@org/core", "@org/ui", "cli", "docs"]
        );
    }

    #[test]
    fn test_include_and_exclude() {
        let set = select(&create_packages(), &criteria(&["^@org/"], &["app$"]));
        assert_eq!(set.names(), vec!["@org/core", "@org/ui"]);

        let set = select(&create_packages(), &criteria(&["cli", "docs"], &[]));
        assert_eq!(set.names(), vec!["cli", "docs"]);
    }

    #[test]
    fn test_dependents_closure_counts_each_package_once() {
        // @org/app reaches @org/core by two paths
        let set = select(
            &create_packages(),
            &criteria(&["^@org/core$"], &[]).with_dependents(true),
        );
        assert_eq!(set.names(), vec!["@org/app", "@org/core", "@org/ui", "cli"]);
    }

    #[test]
    fn test_expansion_ignores_excludes() {
        let set = select(
            &create_packages(),
            &criteria(&["^@org/core$"], &["cli"]).with_dependents(true),
        );
        assert!(set.contains("cli"));
    }

    #[test]
    fn test_dependencies_closure() {
        let set = select(
            &create_packages(),
            &criteria(&["^@org/app$"], &[]).with_dependencies(true),
        );
        assert_eq!(set.names(), vec!["@org/app", "@org/core", "@org/ui"]);
    }

    #[test]
    fn test_predicate_applied_last() {
        let set = select(
            &create_packages(),
            &criteria(&["^@org/core$"], &[])
                .with_dependents(true)
                .with_script("build"),
        );
        assert_eq!(set.names(), vec!["@org/core", "@org/ui"]);
    }

    #[test]
    fn test_invalid_pattern() {
        let result = SelectionCriteria::new(&["[a-"], &[]);
        assert!(matches!(
            result,
            Err(TandemError::Selection(SelectionError::InvalidPattern { .. }))
        ));
    }

    #[test]
    fn test_working_set_dedups_and_indexes() {
        let set = WorkingSet::new(vec![
            Package::new("b", "b"),
            Package::new("a", "a"),
            Package::new("b", "b"),
        ]);
        assert_eq!(set.names(), vec!["a", "b"]);
        assert_eq!(set.get("b").map(|p| p.name.as_str()), Some("b"));
        assert!(!set.contains("c"));
    }

    #[test]
    fn test_resolve_missing_root() {
        let result = resolve_working_set(
            Path::new("/definitely/not/here"),
            &SelectionCriteria::default(),
        );
        assert!(matches!(
            result,
            Err(TandemError::Selection(SelectionError::PathNotFound(_)))
        ));
    }
}
