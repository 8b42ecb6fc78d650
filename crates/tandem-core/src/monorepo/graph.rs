//! Dependency graph for monorepo packages

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{GraphError, Result};
use crate::types::Package;

/// A node in the dependency graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageNode {
    /// Package name
    pub name: String,
    /// Packages in the graph this package depends on
    pub dependencies: BTreeSet<String>,
    /// Packages in the graph that depend on this package
    pub dependents: BTreeSet<String>,
}

/// Dependency graph over a set of packages.
///
/// Edges pointing outside the set are dropped.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Nodes indexed by package name
    nodes: BTreeMap<String, PackageNode>,
    /// Topologically sorted order (dependencies before dependents)
    sorted_order: Vec<String>,
    /// Circular dependencies detected
    cycles: Vec<Vec<String>>,
}

impl DependencyGraph {
    /// Build a dependency graph from packages
    #[instrument(skip_all, fields(packages = packages.len()))]
    pub fn build(packages: &[Package]) -> Self {
        let members: HashSet<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        let mut nodes: BTreeMap<String, PackageNode> = BTreeMap::new();

        for pkg in packages {
            let dependencies = pkg
                .local_dependencies
                .iter()
                .filter(|d| members.contains(d.as_str()) && **d != pkg.name)
                .cloned()
                .collect();
            nodes.insert(
                pkg.name.clone(),
                PackageNode {
                    name: pkg.name.clone(),
                    dependencies,
                    dependents: BTreeSet::new(),
                },
            );
        }

        // Build reverse dependency mapping (dependents)
        let edges: Vec<(String, String)> = nodes
            .values()
            .flat_map(|n| n.dependencies.iter().map(|d| (d.clone(), n.name.clone())))
            .collect();
        for (dep, dependent) in edges {
            if let Some(dep_node) = nodes.get_mut(&dep) {
                dep_node.dependents.insert(dependent);
            }
        }

        let (sorted_order, cycles) = Self::topological_sort(&nodes);

        debug!(
            nodes = nodes.len(),
            cycles = cycles.len(),
            "dependency graph built"
        );

        Self {
            nodes,
            sorted_order,
            cycles,
        }
    }

    /// Perform topological sort using Kahn's algorithm.
    ///
    /// Ties are broken by name so the order is reproducible.
    fn topological_sort(nodes: &BTreeMap<String, PackageNode>) -> (Vec<String>, Vec<Vec<String>>) {
        let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut sorted: Vec<String> = Vec::new();

        for (name, node) in nodes {
            let degree = node.dependencies.len();
            in_degree.insert(name.as_str(), degree);
            if degree == 0 {
                queue.push_back(name.as_str());
            }
        }

        while let Some(name) = queue.pop_front() {
            sorted.push(name.to_string());

            if let Some(node) = nodes.get(name) {
                for dependent in &node.dependents {
                    if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                        *degree = degree.saturating_sub(1);
                        if *degree == 0 {
                            queue.push_back(dependent.as_str());
                        }
                    }
                }
            }
        }

        // Nodes never reaching in-degree zero sit on or behind a cycle
        let mut cycles = Vec::new();
        if sorted.len() != nodes.len() {
            let in_sorted: HashSet<&str> = sorted.iter().map(String::as_str).collect();
            let cyclic_nodes: BTreeSet<&str> = nodes
                .keys()
                .map(String::as_str)
                .filter(|n| !in_sorted.contains(n))
                .collect();

            for start in &cyclic_nodes {
                if let Some(cycle) = Self::find_cycle(nodes, start, &cyclic_nodes) {
                    let already_known = cycles.iter().any(|c: &Vec<String>| {
                        c.len() == cycle.len() && cycle.iter().all(|n| c.contains(n))
                    });
                    if !already_known {
                        cycles.push(cycle);
                    }
                }
            }
        }

        (sorted, cycles)
    }

    /// Find a cycle passing through `start`, following dependency edges
    fn find_cycle(
        nodes: &BTreeMap<String, PackageNode>,
        start: &str,
        cyclic_nodes: &BTreeSet<&str>,
    ) -> Option<Vec<String>> {
        fn dfs(
            nodes: &BTreeMap<String, PackageNode>,
            current: &str,
            start: &str,
            visited: &mut HashSet<String>,
            path: &mut Vec<String>,
            cyclic_nodes: &BTreeSet<&str>,
        ) -> bool {
            path.push(current.to_string());
            visited.insert(current.to_string());

            if let Some(node) = nodes.get(current) {
                for dep in &node.dependencies {
                    if dep == start {
                        return true;
                    }
                    if cyclic_nodes.contains(dep.as_str())
                        && !visited.contains(dep)
                        && dfs(nodes, dep, start, visited, path, cyclic_nodes)
                    {
                        return true;
                    }
                }
            }

            path.pop();
            false
        }

        let mut visited = HashSet::new();
        let mut path = Vec::new();
        if dfs(nodes, start, start, &mut visited, &mut path, cyclic_nodes) {
            Some(path)
        } else {
            None
        }
    }

    /// Get packages in topologically sorted order (dependencies first)
    pub fn sorted(&self) -> &[String] {
        &self.sorted_order
    }

    /// Check if there are any circular dependencies
    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }

    /// Get detected circular dependencies
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    /// Get a package node
    pub fn get(&self, name: &str) -> Option<&PackageNode> {
        self.nodes.get(name)
    }

    /// Iterate over all nodes in name order
    pub fn nodes(&self) -> impl Iterator<Item = &PackageNode> {
        self.nodes.values()
    }

    /// Number of packages in the graph
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no packages
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Get all packages transitively depending on the given package
    pub fn transitive_dependents(&self, name: &str) -> BTreeSet<String> {
        self.traverse(name, |node| &node.dependents)
    }

    /// Get all transitive dependencies of a package
    pub fn transitive_dependencies(&self, name: &str) -> BTreeSet<String> {
        self.traverse(name, |node| &node.dependencies)
    }

    /// Breadth-first traversal, visiting every reachable node once
    fn traverse<F>(&self, name: &str, edges: F) -> BTreeSet<String>
    where
        F: Fn(&PackageNode) -> &BTreeSet<String>,
    {
        let mut reached = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(name);

        while let Some(current) = queue.pop_front() {
            if let Some(node) = self.nodes.get(current) {
                for next in edges(node) {
                    if next != name && reached.insert(next.clone()) {
                        queue.push_back(next.as_str());
                    }
                }
            }
        }

        reached
    }

    /// Validate that the graph has no cycles
    pub fn validate(&self) -> Result<()> {
        if self.has_cycles() {
            return Err(GraphError::Cyclic(self.cycles.clone()).into());
        }
        Ok(())
    }
}
