// src/source/mod.rs

//! Package sources
//!
//! A source answers "which packages have this id" with the versions it can
//! offer and, for the installed source, the version already on the system.
//!
//! - [`CatalogSource`]: available packages from a JSON catalog file
//! - [`InstalledSource`]: packages recorded in the local database
//! - [`CompositeSource`]: an available source correlated with installed state

mod catalog;
mod composite;
mod installed;

pub use catalog::{CatalogMetadata, CatalogSource};
pub use composite::CompositeSource;
pub use installed::InstalledSource;

use crate::dependency::Dependency;
use crate::error::Result;
use crate::manifest::Manifest;
use crate::version::Version;

/// Case-insensitive exact match on package id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub id: String,
}

impl SearchRequest {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn matches(&self, id: &str) -> bool {
        self.id.to_lowercase() == id.to_lowercase()
    }
}

/// One package found by a search
#[derive(Debug, Clone, PartialEq)]
pub struct PackageMatch {
    pub id: String,
    /// Version currently installed, if any
    pub installed_version: Option<Version>,
    /// Installable versions, newest first
    pub available: Vec<Manifest>,
}

impl PackageMatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            installed_version: None,
            available: Vec::new(),
        }
    }

    /// Add an available version, keeping newest-first order
    pub fn add_available(&mut self, manifest: Manifest) {
        let position = self
            .available
            .iter()
            .position(|existing| existing.version < manifest.version)
            .unwrap_or(self.available.len());
        self.available.insert(position, manifest);
    }

    pub fn latest_available(&self) -> Option<&Manifest> {
        self.available.first()
    }

    pub fn find_version(&self, version: &Version) -> Option<&Manifest> {
        self.available.iter().find(|m| &m.version == version)
    }

    /// Oldest installable version that satisfies `dependency`'s minimum
    pub fn lowest_satisfying(&self, dependency: &Dependency) -> Option<&Manifest> {
        self.available
            .iter()
            .rev()
            .find(|m| !m.installers.is_empty() && dependency.is_version_ok(&m.version))
    }

    /// True when the installed version satisfies `dependency`
    pub fn is_installed_ok(&self, dependency: &Dependency) -> bool {
        self.installed_version
            .as_ref()
            .is_some_and(|v| dependency.is_version_ok(v))
    }
}

/// Anything packages can be searched in
pub trait PackageSource: Send + Sync {
    /// Display name for diagnostics
    fn name(&self) -> &str;

    fn search(&self, request: &SearchRequest) -> Result<Vec<PackageMatch>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Installer;

    fn manifest(version: &str, installers: usize) -> Manifest {
        let mut m = Manifest::new("Pkg", version);
        m.installers = vec![Installer::default(); installers];
        m
    }

    #[test]
    fn test_available_sorted_newest_first() {
        let mut m = PackageMatch::new("Pkg");
        m.add_available(manifest("1.5", 1));
        m.add_available(manifest("2.0", 1));
        m.add_available(manifest("1.0", 1));

        let versions: Vec<String> = m.available.iter().map(|v| v.version.to_string()).collect();
        assert_eq!(versions, vec!["2.0", "1.5", "1.0"]);
        assert_eq!(m.latest_available().unwrap().version, Version::parse("2"));
    }

    #[test]
    fn test_lowest_satisfying() {
        let mut m = PackageMatch::new("Pkg");
        m.add_available(manifest("1.0", 1));
        m.add_available(manifest("1.5", 1));
        m.add_available(manifest("1.7", 0));
        m.add_available(manifest("2.0", 1));

        let any = Dependency::package("Pkg");
        assert_eq!(m.lowest_satisfying(&any).unwrap().version, Version::parse("1.0"));

        let at_least = Dependency::package("Pkg").with_min_version("1.6");
        assert_eq!(m.lowest_satisfying(&at_least).unwrap().version, Version::parse("2.0"));

        let too_high = Dependency::package("Pkg").with_min_version("3");
        assert!(m.lowest_satisfying(&too_high).is_none());
    }

    #[test]
    fn test_search_request_is_case_insensitive() {
        let request = SearchRequest::by_id("Contoso.App");
        assert!(request.matches("contoso.app"));
        assert!(!request.matches("contoso.app2"));
    }
}
