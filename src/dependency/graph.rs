// src/dependency/graph.rs

//! Lazily built package dependency graph
//!
//! The graph starts from the package being installed (the root) and its
//! declared package dependencies. [`DependencyGraph::build`] walks outward
//! breadth-first, asking a [`DependencyResolver`] for the dependencies of
//! each newly discovered package. A package is resolved once per minimum
//! version: when a later edge raises the bound of a package that was already
//! resolved, its old children are dropped and it is resolved again, so the
//! children always belong to the version that will be installed. Once built,
//! the graph can report cycles and produce a dependency-first installation
//! order.
//!
//! Only package dependencies become nodes. Features, libraries and external
//! requirements are never resolved here.

use super::{Dependency, DependencyKind, DependencyList};
use crate::version::Version;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// Why a dependency could not be turned into an installable package
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveFailure {
    #[error("No matches")]
    NotFound,

    #[error("Too many matches ({0})")]
    Ambiguous(usize),

    #[error("No package version found")]
    NoVersions,

    #[error("No installers found")]
    NoInstallers,

    #[error("Minimum required version not available (latest is {latest})")]
    VersionNotSatisfied { latest: Version },

    #[error("Search failed: {0}")]
    Search(String),
}

/// Outcome of resolving one dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The package will be installed; these are its own dependencies
    Dependencies(DependencyList),
    /// Already installed at an acceptable version
    Satisfied,
    /// Cannot be resolved; the node stays a leaf and is not installed
    Unresolved(ResolveFailure),
}

/// Maps a dependency to what it needs in turn
pub trait DependencyResolver {
    fn resolve(&mut self, dependency: &Dependency) -> Resolution;
}

impl<F> DependencyResolver for F
where
    F: FnMut(&Dependency) -> Resolution,
{
    fn resolve(&mut self, dependency: &Dependency) -> Resolution {
        self(dependency)
    }
}

/// Expansion state of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    /// Discovered but not yet handed to the resolver
    Pending,
    /// Resolved to an installable package; children are known
    Expanded,
    /// Already installed, not expanded further
    Satisfied,
    /// Resolution failed, not expanded further
    Unresolved(ResolveFailure),
}

#[derive(Debug, Clone)]
struct Node {
    /// First-seen id, with the tightest minimum version across all edges
    dependency: Dependency,
    state: NodeState,
    children: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Directed graph of package dependencies rooted at the package being installed
pub struct DependencyGraph<R> {
    root: String,
    nodes: HashMap<String, Node>,
    frontier: Vec<String>,
    resolver: R,
}

impl<R: DependencyResolver> DependencyGraph<R> {
    /// Create a graph for `root` whose direct dependencies are already known
    ///
    /// Nothing is resolved until [`DependencyGraph::build`] is called.
    pub fn new(root: Dependency, root_dependencies: &DependencyList, resolver: R) -> Self {
        let root_key = root.normalized_id();
        let mut graph = Self {
            root: root_key.clone(),
            nodes: HashMap::new(),
            frontier: Vec::new(),
            resolver,
        };

        graph.nodes.insert(
            root_key.clone(),
            Node {
                dependency: root,
                state: NodeState::Expanded,
                children: Vec::new(),
            },
        );

        for dependency in root_dependencies.of_kind(DependencyKind::Package) {
            graph.add_edge(&root_key, dependency);
        }

        graph
    }

    /// Resolve every reachable package in discovery order
    ///
    /// A package is resolved again only when its minimum version is raised
    /// after it was resolved. Bounds only grow, so this terminates.
    ///
    /// Calling this again after the graph is complete does nothing.
    pub fn build(&mut self) {
        let mut next = 0;
        while next < self.frontier.len() {
            let key = self.frontier[next].clone();
            next += 1;

            let Some(dependency) = self.nodes.get(&key).map(|n| n.dependency.clone()) else {
                continue;
            };

            let resolution = self.resolver.resolve(&dependency);
            debug!("Resolved {}: {:?}", dependency, resolution);

            let state = match resolution {
                Resolution::Dependencies(children) => {
                    for child in children.of_kind(DependencyKind::Package) {
                        self.add_edge(&key, child);
                    }
                    NodeState::Expanded
                }
                Resolution::Satisfied => NodeState::Satisfied,
                Resolution::Unresolved(reason) => NodeState::Unresolved(reason),
            };

            if let Some(node) = self.nodes.get_mut(&key) {
                node.state = state;
            }
        }

        self.frontier.clear();
    }

    fn add_edge(&mut self, from: &str, dependency: &Dependency) {
        let key = dependency.normalized_id();

        match self.nodes.get_mut(&key) {
            Some(existing) => {
                let raised = existing.dependency.tighten(dependency.min_version.as_ref());
                // A resolved node chose its candidate under the old bound
                if raised && key != self.root && existing.state != NodeState::Pending {
                    debug!("Resolving {} again", existing.dependency);
                    existing.state = NodeState::Pending;
                    existing.children.clear();
                    self.frontier.push(key.clone());
                }
            }
            None => {
                self.nodes.insert(
                    key.clone(),
                    Node {
                        dependency: dependency.clone(),
                        state: NodeState::Pending,
                        children: Vec::new(),
                    },
                );
                self.frontier.push(key.clone());
            }
        }

        if let Some(parent) = self.nodes.get_mut(from) {
            if !parent.children.contains(&key) {
                parent.children.push(key);
            }
        }
    }
}

impl<R> DependencyGraph<R> {
    /// The root package
    pub fn root(&self) -> &Dependency {
        &self.nodes[&self.root].dependency
    }

    /// Number of nodes, root included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Node for `id` (case-insensitive), with its tightened minimum version
    pub fn node(&self, id: &str) -> Option<&Dependency> {
        self.nodes.get(&id.to_lowercase()).map(|n| &n.dependency)
    }

    pub fn node_state(&self, id: &str) -> Option<&NodeState> {
        self.nodes.get(&id.to_lowercase()).map(|n| &n.state)
    }

    pub fn min_version(&self, id: &str) -> Option<&Version> {
        self.node(id).and_then(|d| d.min_version.as_ref())
    }

    /// Check `candidate` against the tightest bound any path places on `id`
    ///
    /// Unknown ids are never satisfied.
    pub fn is_version_ok(&self, id: &str, candidate: &Version) -> bool {
        self.node(id).is_some_and(|d| d.is_version_ok(candidate))
    }

    /// True if some package reachable from the root depends on itself transitively
    pub fn has_loop(&self) -> bool {
        let mut marks = HashMap::new();
        self.detect_cycle_dfs(&self.root, &mut marks)
    }

    fn detect_cycle_dfs<'a>(&'a self, key: &'a str, marks: &mut HashMap<&'a str, Mark>) -> bool {
        marks.insert(key, Mark::Visiting);

        if let Some(node) = self.nodes.get(key) {
            for child in &node.children {
                match marks.get(child.as_str()) {
                    Some(Mark::Visiting) => {
                        debug!("Dependency loop: {} -> {}", key, child);
                        return true;
                    }
                    Some(Mark::Done) => {}
                    None => {
                        if self.detect_cycle_dfs(child, marks) {
                            return true;
                        }
                    }
                }
            }
        }

        marks.insert(key, Mark::Done);
        false
    }

    /// Dependencies first, each exactly once, root excluded
    ///
    /// Returns `None` when the graph has a loop, since no valid order exists.
    pub fn installation_order(&self) -> Option<Vec<Dependency>> {
        if self.has_loop() {
            return None;
        }

        let mut visited = HashSet::new();
        let mut order = Vec::new();
        self.post_order(&self.root, &mut visited, &mut order);
        order.pop();
        Some(order)
    }

    fn post_order<'a>(&'a self, key: &'a str, visited: &mut HashSet<&'a str>, order: &mut Vec<Dependency>) {
        if !visited.insert(key) {
            return;
        }
        if let Some(node) = self.nodes.get(key) {
            for child in &node.children {
                self.post_order(child, visited, order);
            }
            order.push(node.dependency.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Resolver over a fixed `id -> [deps]` table; unknown ids are unresolved
    struct Table(HashMap<String, Vec<String>>);

    impl DependencyResolver for Table {
        fn resolve(&mut self, dependency: &Dependency) -> Resolution {
            match self.0.get(&dependency.id.to_lowercase()) {
                Some(deps) => Resolution::Dependencies(deps.iter().map(Dependency::package).collect()),
                None => Resolution::Unresolved(ResolveFailure::NotFound),
            }
        }
    }

    fn table(entries: &[(&str, &[&str])]) -> Table {
        Table(
            entries
                .iter()
                .map(|(id, deps)| (id.to_lowercase(), deps.iter().map(|d| d.to_string()).collect()))
                .collect(),
        )
    }

    fn ids(order: &[Dependency]) -> Vec<&str> {
        order.iter().map(|d| d.id.as_str()).collect()
    }

    fn list(ids: &[&str]) -> DependencyList {
        ids.iter().copied().map(Dependency::package).collect()
    }

    fn fixture() -> Vec<(&'static str, &'static [&'static str])> {
        vec![
            ("B", &[]),
            ("C", &["B"]),
            ("D", &["E"]),
            ("E", &["D"]),
            ("F", &["B"]),
            ("G", &["C"]),
            ("H", &["G", "B"]),
        ]
    }

    #[test]
    fn test_empty_root_dependencies() {
        let mut calls = 0;
        let mut graph = DependencyGraph::new(
            Dependency::package("Root"),
            &DependencyList::new(),
            |_: &Dependency| {
                calls += 1;
                Resolution::Satisfied
            },
        );
        graph.build();

        assert!(!graph.has_loop());
        assert_eq!(graph.installation_order().unwrap(), Vec::new());
        assert!(graph.is_empty());
        drop(graph);
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_chain_order() {
        let mut graph = DependencyGraph::new(Dependency::package("StackOrderIsOk"), &list(&["C"]), table(&fixture()));
        graph.build();

        assert!(!graph.has_loop());
        assert_eq!(ids(&graph.installation_order().unwrap()), vec!["B", "C"]);
    }

    #[test]
    fn test_shared_dependency_is_not_a_loop() {
        let mut graph = DependencyGraph::new(
            Dependency::package("DependencyAlreadyInStackButNoLoop"),
            &list(&["C", "F"]),
            table(&fixture()),
        );
        graph.build();

        assert!(!graph.has_loop());
        assert_eq!(ids(&graph.installation_order().unwrap()), vec!["B", "C", "F"]);
    }

    #[test]
    fn test_path_between_branches() {
        let mut graph = DependencyGraph::new(
            Dependency::package("PathBetweenBranchesButNoLoop"),
            &list(&["C", "H"]),
            table(&fixture()),
        );
        graph.build();

        assert!(!graph.has_loop());
        assert_eq!(ids(&graph.installation_order().unwrap()), vec!["B", "C", "G", "H"]);
    }

    #[test]
    fn test_loop_detected() {
        let mut graph = DependencyGraph::new(Dependency::package("EasyToSeeLoop"), &list(&["D"]), table(&fixture()));
        graph.build();

        assert!(graph.has_loop());
        assert!(graph.installation_order().is_none());
    }

    #[test]
    fn test_self_reference_is_a_loop() {
        let mut graph = DependencyGraph::new(Dependency::package("A"), &list(&["B"]), table(&[("B", &["a"])]));
        graph.build();
        assert!(graph.has_loop());
    }

    #[test]
    fn test_each_node_resolved_once() {
        let mut seen: Vec<String> = Vec::new();
        let mut inner = table(&fixture());
        let mut graph = DependencyGraph::new(
            Dependency::package("Root"),
            &list(&["C", "H", "F"]),
            |d: &Dependency| {
                seen.push(d.id.clone());
                inner.resolve(d)
            },
        );
        graph.build();
        graph.build();
        drop(graph);

        // breadth-first: direct dependencies first, then their children
        assert_eq!(seen, vec!["C", "H", "F", "B", "G"]);
    }

    #[test]
    fn test_non_package_dependencies_are_ignored() {
        let mut root_deps = list(&["B"]);
        root_deps.add(Dependency::new(DependencyKind::WindowsFeature, "NetFx3"));
        root_deps.add(Dependency::new(DependencyKind::External, "JDK"));

        let mut graph = DependencyGraph::new(Dependency::package("Root"), &root_deps, table(&fixture()));
        graph.build();

        assert_eq!(graph.len(), 2);
        assert!(graph.node("NetFx3").is_none());
    }

    #[test]
    fn test_satisfied_and_unresolved_are_leaves() {
        let mut graph = DependencyGraph::new(
            Dependency::package("Root"),
            &list(&["installed1", "missing"]),
            |d: &Dependency| match d.id.as_str() {
                "installed1" => Resolution::Satisfied,
                _ => Resolution::Unresolved(ResolveFailure::NotFound),
            },
        );
        graph.build();

        assert_eq!(graph.node_state("installed1"), Some(&NodeState::Satisfied));
        assert_eq!(
            graph.node_state("missing"),
            Some(&NodeState::Unresolved(ResolveFailure::NotFound))
        );
        assert_eq!(ids(&graph.installation_order().unwrap()), vec!["installed1", "missing"]);
    }

    #[test]
    fn test_min_version_tightened_across_paths() {
        let mut root_deps = DependencyList::new();
        root_deps.add(Dependency::package("minVersion").with_min_version("1.0"));
        root_deps.add(Dependency::package("requires1.5"));

        let mut graph = DependencyGraph::new(Dependency::package("Root"), &root_deps, |d: &Dependency| {
            match d.id.as_str() {
                "requires1.5" => Resolution::Dependencies(
                    vec![Dependency::package("minVersion").with_min_version("1.5")].into(),
                ),
                _ => Resolution::Dependencies(DependencyList::new()),
            }
        });
        graph.build();

        assert_eq!(graph.min_version("MINVERSION"), Some(&Version::parse("1.5")));
        assert!(graph.is_version_ok("minVersion", &Version::parse("1.5")));
        assert!(!graph.is_version_ok("minVersion", &Version::parse("1.0")));
        assert!(!graph.is_version_ok("unknown", &Version::parse("1.0")));

        let order = graph.installation_order().unwrap();
        assert_eq!(ids(&order), vec!["minVersion", "requires1.5"]);
        assert_eq!(order[0].min_version, Some(Version::parse("1.5")));
    }

    #[test]
    fn test_raised_bound_resolves_again() {
        let mut root_deps = DependencyList::new();
        root_deps.add(Dependency::package("Lib").with_min_version("1.0"));
        root_deps.add(Dependency::package("Mid"));

        let mut seen: Vec<String> = Vec::new();
        let mut graph = DependencyGraph::new(Dependency::package("Root"), &root_deps, |d: &Dependency| {
            seen.push(d.to_string());
            let at_least = |v: &str| d.min_version.as_ref().is_some_and(|min| *min >= Version::parse(v));
            match d.id.as_str() {
                "Mid" => Resolution::Dependencies(vec![Dependency::package("Lib").with_min_version("1.5")].into()),
                // Lib 1.0 has no dependencies, Lib 1.5 needs X
                "Lib" if at_least("1.5") => Resolution::Dependencies(vec![Dependency::package("X")].into()),
                "Lib" => Resolution::Dependencies(vec![Dependency::package("Old")].into()),
                _ => Resolution::Dependencies(DependencyList::new()),
            }
        });
        graph.build();

        assert!(!graph.has_loop());
        assert_eq!(ids(&graph.installation_order().unwrap()), vec!["X", "Lib", "Mid"]);
        assert_eq!(graph.node_state("Lib"), Some(&NodeState::Expanded));
        drop(graph);

        assert_eq!(seen, vec!["Lib [>= 1.0]", "Mid", "Old", "Lib [>= 1.5]", "X"]);
    }

    #[test]
    fn test_raised_bound_on_satisfied_node() {
        let mut root_deps = DependencyList::new();
        root_deps.add(Dependency::package("Lib"));
        root_deps.add(Dependency::package("Mid"));

        let mut graph = DependencyGraph::new(Dependency::package("Root"), &root_deps, |d: &Dependency| {
            match d.id.as_str() {
                "Mid" => Resolution::Dependencies(vec![Dependency::package("Lib").with_min_version("2.0")].into()),
                // installed Lib is 1.0
                "Lib" if d.min_version.is_none() => Resolution::Satisfied,
                _ => Resolution::Dependencies(DependencyList::new()),
            }
        });
        graph.build();

        assert_eq!(graph.node_state("Lib"), Some(&NodeState::Expanded));
        assert_eq!(graph.min_version("Lib"), Some(&Version::parse("2.0")));
        assert_eq!(ids(&graph.installation_order().unwrap()), vec!["Lib", "Mid"]);
    }

    #[test]
    fn test_bound_raised_before_resolution_resolves_once() {
        let mut root_deps = DependencyList::new();
        root_deps.add(Dependency::package("A"));
        root_deps.add(Dependency::package("B"));

        let mut seen: Vec<String> = Vec::new();
        let mut graph = DependencyGraph::new(Dependency::package("Root"), &root_deps, |d: &Dependency| {
            seen.push(d.to_string());
            match d.id.as_str() {
                "A" => Resolution::Dependencies(vec![Dependency::package("C").with_min_version("1.0")].into()),
                "B" => Resolution::Dependencies(vec![Dependency::package("C").with_min_version("2.0")].into()),
                _ => Resolution::Dependencies(DependencyList::new()),
            }
        });
        graph.build();
        drop(graph);

        assert_eq!(seen, vec!["A", "B", "C [>= 2.0]"]);
    }

    #[test]
    fn test_order_places_dependencies_first() {
        let mut graph = DependencyGraph::new(
            Dependency::package("Root"),
            &list(&["H", "F", "C"]),
            table(&fixture()),
        );
        graph.build();
        let order = graph.installation_order().unwrap();
        let position = |id: &str| order.iter().position(|d| d.id == id).unwrap();

        assert_eq!(order.len(), 5);
        assert!(position("B") < position("C"));
        assert!(position("C") < position("G"));
        assert!(position("G") < position("H"));
        assert!(position("B") < position("F"));
    }
}
