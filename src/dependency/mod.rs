// src/dependency/mod.rs

//! Typed package dependencies
//!
//! A manifest declares what a package needs before it can be installed:
//! OS features, OS libraries, other packages from a source, and external
//! requirements the installer cannot satisfy on its own. Only package
//! dependencies are resolved and installed; the other kinds are reported.
//!
//! [`DependencyList`] keeps one entry per `(kind, id)` and merges repeated
//! declarations by keeping the stricter minimum version.

mod graph;

pub use graph::{DependencyGraph, DependencyResolver, NodeState, Resolution, ResolveFailure};

use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of requirement a dependency expresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DependencyKind {
    WindowsFeature,
    WindowsLibrary,
    Package,
    External,
}

impl DependencyKind {
    /// All kinds in report order
    pub const ALL: [DependencyKind; 4] = [
        DependencyKind::WindowsFeature,
        DependencyKind::WindowsLibrary,
        DependencyKind::Package,
        DependencyKind::External,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            DependencyKind::WindowsFeature => "windowsFeature",
            DependencyKind::WindowsLibrary => "windowsLibrary",
            DependencyKind::Package => "package",
            DependencyKind::External => "external",
        }
    }

    /// Section heading used when listing dependencies of this kind
    pub fn heading(&self) -> &str {
        match self {
            DependencyKind::WindowsFeature => "Windows Features",
            DependencyKind::WindowsLibrary => "Windows Libraries",
            DependencyKind::Package => "Package Dependencies",
            DependencyKind::External => "External Dependencies",
        }
    }
}

impl FromStr for DependencyKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "windowsFeature" => Ok(DependencyKind::WindowsFeature),
            "windowsLibrary" => Ok(DependencyKind::WindowsLibrary),
            "package" => Ok(DependencyKind::Package),
            "external" => Ok(DependencyKind::External),
            _ => Err(format!("Invalid dependency type: {}", s)),
        }
    }
}

/// A single requirement with an optional lower version bound
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    #[serde(rename = "type")]
    pub kind: DependencyKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_version: Option<Version>,
}

impl Dependency {
    pub fn new(kind: DependencyKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            min_version: None,
        }
    }

    /// Shorthand for a package dependency
    pub fn package(id: impl Into<String>) -> Self {
        Self::new(DependencyKind::Package, id)
    }

    pub fn with_min_version(mut self, version: impl Into<Version>) -> Self {
        self.min_version = Some(version.into());
        self
    }

    /// Key used for identity: package ids are case-insensitive, other kinds are exact
    pub fn normalized_id(&self) -> String {
        match self.kind {
            DependencyKind::Package => self.id.to_lowercase(),
            _ => self.id.clone(),
        }
    }

    /// True when both refer to the same requirement, ignoring version bounds
    pub fn same_identity(&self, other: &Dependency) -> bool {
        self.kind == other.kind
            && match self.kind {
                DependencyKind::Package => self.id.to_lowercase() == other.id.to_lowercase(),
                _ => self.id == other.id,
            }
    }

    /// True when `candidate` satisfies the minimum version (or there is none)
    pub fn is_version_ok(&self, candidate: &Version) -> bool {
        self.min_version
            .as_ref()
            .is_none_or(|min| candidate >= min)
    }

    /// Raise the minimum version to `version` if it is stricter; true when it moved
    fn tighten(&mut self, version: Option<&Version>) -> bool {
        let Some(version) = version else { return false };
        match &self.min_version {
            Some(current) if current >= version => false,
            _ => {
                self.min_version = Some(version.clone());
                true
            }
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)?;
        if let Some(min) = &self.min_version {
            write!(f, " [>= {}]", min)?;
        }
        Ok(())
    }
}

/// Ordered set of dependencies, unique by `(kind, id)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Dependency>", into = "Vec<Dependency>")]
pub struct DependencyList {
    dependencies: Vec<Dependency>,
}

impl DependencyList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency, merging with an existing entry of the same identity
    ///
    /// A merge never loosens the bound: the larger of the two minimum
    /// versions is kept, and a bound always wins over no bound.
    pub fn add(&mut self, dependency: Dependency) {
        match self
            .dependencies
            .iter_mut()
            .find(|existing| existing.same_identity(&dependency))
        {
            Some(existing) => {
                existing.tighten(dependency.min_version.as_ref());
            }
            None => self.dependencies.push(dependency),
        }
    }

    /// Add every entry of `other`, merging as in [`DependencyList::add`]
    pub fn add_all(&mut self, other: &DependencyList) {
        for dependency in &other.dependencies {
            self.add(dependency.clone());
        }
    }

    pub fn has_any(&self) -> bool {
        !self.dependencies.is_empty()
    }

    pub fn has_any_of(&self, kind: DependencyKind) -> bool {
        self.dependencies.iter().any(|d| d.kind == kind)
    }

    /// Look up the entry matching `dependency`'s identity
    pub fn get(&self, dependency: &Dependency) -> Option<&Dependency> {
        self.dependencies.iter().find(|d| d.same_identity(dependency))
    }

    /// Call `f` for every dependency of `kind`, in insertion order
    pub fn apply_to_kind<F>(&self, kind: DependencyKind, mut f: F)
    where
        F: FnMut(&Dependency),
    {
        for dependency in self.of_kind(kind) {
            f(dependency);
        }
    }

    pub fn of_kind(&self, kind: DependencyKind) -> impl Iterator<Item = &Dependency> {
        self.dependencies.iter().filter(move |d| d.kind == kind)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Dependency> {
        self.dependencies.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dependencies.len()
    }

    pub fn clear(&mut self) {
        self.dependencies.clear();
    }

    /// True if an entry with exactly this kind, id and minimum version exists
    pub fn contains_exact(&self, kind: DependencyKind, id: &str, min_version: Option<&str>) -> bool {
        let wanted = Dependency::new(kind, id);
        self.dependencies.iter().any(|d| {
            d.same_identity(&wanted)
                && match (min_version, &d.min_version) {
                    (None, None) => true,
                    (Some(expected), Some(actual)) => *actual == Version::parse(expected),
                    _ => false,
                }
        })
    }
}

impl From<Vec<Dependency>> for DependencyList {
    fn from(dependencies: Vec<Dependency>) -> Self {
        dependencies.into_iter().collect()
    }
}

impl From<DependencyList> for Vec<Dependency> {
    fn from(list: DependencyList) -> Self {
        list.dependencies
    }
}

impl FromIterator<Dependency> for DependencyList {
    fn from_iter<I: IntoIterator<Item = Dependency>>(iter: I) -> Self {
        let mut list = DependencyList::new();
        list.extend(iter);
        list
    }
}

impl Extend<Dependency> for DependencyList {
    fn extend<I: IntoIterator<Item = Dependency>>(&mut self, iter: I) {
        for dependency in iter {
            self.add(dependency);
        }
    }
}

impl<'a> IntoIterator for &'a DependencyList {
    type Item = &'a Dependency;
    type IntoIter = std::slice::Iter<'a, Dependency>;

    fn into_iter(self) -> Self::IntoIter {
        self.dependencies.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_merges_same_identity() {
        let mut list = DependencyList::new();
        list.add(Dependency::package("Contoso.Lib"));
        list.add(Dependency::package("contoso.lib"));

        assert_eq!(list.len(), 1);
        assert_eq!(list.iter().next().unwrap().id, "Contoso.Lib");
    }

    #[test]
    fn test_add_keeps_stricter_min_version() {
        let mut list = DependencyList::new();
        list.add(Dependency::package("A").with_min_version("1.5"));
        list.add(Dependency::package("a").with_min_version("1.0"));
        assert!(list.contains_exact(DependencyKind::Package, "A", Some("1.5")));

        list.add(Dependency::package("A").with_min_version("2.0"));
        assert!(list.contains_exact(DependencyKind::Package, "A", Some("2.0")));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_add_bound_wins_over_no_bound() {
        let mut list = DependencyList::new();
        list.add(Dependency::package("A"));
        list.add(Dependency::package("A").with_min_version("1.0"));
        assert!(list.contains_exact(DependencyKind::Package, "A", Some("1.0")));

        list.add(Dependency::package("A"));
        assert!(list.contains_exact(DependencyKind::Package, "A", Some("1.0")));
    }

    #[test]
    fn test_same_id_different_kind_is_distinct() {
        let mut list = DependencyList::new();
        list.add(Dependency::new(DependencyKind::WindowsFeature, "Hyper-V"));
        list.add(Dependency::new(DependencyKind::External, "Hyper-V"));
        assert_eq!(list.len(), 2);
        assert!(list.has_any_of(DependencyKind::External));
        assert!(!list.has_any_of(DependencyKind::Package));
    }

    #[test]
    fn test_non_package_ids_are_case_sensitive() {
        let mut list = DependencyList::new();
        list.add(Dependency::new(DependencyKind::WindowsLibrary, "VCRuntime"));
        list.add(Dependency::new(DependencyKind::WindowsLibrary, "vcruntime"));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_apply_to_kind_preserves_order() {
        let list: DependencyList = vec![
            Dependency::package("B"),
            Dependency::new(DependencyKind::External, "X"),
            Dependency::package("A"),
        ]
        .into();

        let mut seen = Vec::new();
        list.apply_to_kind(DependencyKind::Package, |d| seen.push(d.id.clone()));
        assert_eq!(seen, vec!["B", "A"]);
    }

    #[test]
    fn test_is_version_ok() {
        let unbounded = Dependency::package("A");
        assert!(unbounded.is_version_ok(&Version::parse("0.1")));

        let bounded = Dependency::package("A").with_min_version("1.5");
        assert!(bounded.is_version_ok(&Version::parse("1.5")));
        assert!(bounded.is_version_ok(&Version::parse("1.10")));
        assert!(!bounded.is_version_ok(&Version::parse("1.0")));
    }

    #[test]
    fn test_clear() {
        let mut list: DependencyList = vec![Dependency::package("A")].into();
        assert!(list.has_any());
        list.clear();
        assert!(list.is_empty());
    }

    #[test]
    fn test_deserialize_merges_duplicates() {
        let json = r#"[
            {"type": "package", "id": "Foo", "minVersion": "1.0"},
            {"type": "package", "id": "foo", "minVersion": "2.0"},
            {"type": "windowsFeature", "id": "NetFx3"}
        ]"#;
        let list: DependencyList = serde_json::from_str(json).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains_exact(DependencyKind::Package, "Foo", Some("2.0")));
        assert!(list.contains_exact(DependencyKind::WindowsFeature, "NetFx3", None));
    }

    #[test]
    fn test_display_includes_min_version() {
        assert_eq!(
            Dependency::package("Dep1").with_min_version("1.0").to_string(),
            "Dep1 [>= 1.0]"
        );
        assert_eq!(Dependency::package("Dep2").to_string(), "Dep2");
    }
}
