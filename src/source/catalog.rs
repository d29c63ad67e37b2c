// src/source/catalog.rs

//! JSON catalog of available packages
//!
//! A catalog is a single JSON index listing package manifests:
//!
//! ```json
//! {
//!   "name": "main",
//!   "packages": [
//!     { "id": "Contoso.Lib", "version": "1.0", "installers": [{ "architecture": "x64" }] }
//!   ]
//! }
//! ```
//!
//! Several manifests with the same id (case-insensitive) are versions of
//! one package.

use super::{PackageMatch, PackageSource, SearchRequest};
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Catalog index format
#[derive(Debug, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default)]
    pub packages: Vec<Manifest>,
}

/// Available packages loaded from a catalog index
#[derive(Debug, Clone)]
pub struct CatalogSource {
    name: String,
    packages: Vec<PackageMatch>,
}

impl CatalogSource {
    /// Build a catalog from manifests, grouping versions by id
    pub fn from_manifests(name: impl Into<String>, manifests: impl IntoIterator<Item = Manifest>) -> Self {
        let mut packages: Vec<PackageMatch> = Vec::new();

        for manifest in manifests {
            let key = manifest.id.to_lowercase();
            match packages.iter_mut().find(|p| p.id.to_lowercase() == key) {
                Some(existing) => existing.add_available(manifest),
                None => {
                    let mut package = PackageMatch::new(manifest.id.clone());
                    package.add_available(manifest);
                    packages.push(package);
                }
            }
        }

        Self {
            name: name.into(),
            packages,
        }
    }

    /// Parse a catalog index from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let metadata: CatalogMetadata = serde_json::from_str(text)?;
        Ok(Self::from_manifests(metadata.name, metadata.packages))
    }

    /// Load a catalog index from a file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading catalog from {}", path.display());

        let text = fs::read_to_string(path)
            .map_err(|e| Error::Catalog(format!("Failed to read {}: {}", path.display(), e)))?;
        let catalog = Self::from_json(&text)
            .map_err(|e| Error::Catalog(format!("Failed to parse {}: {}", path.display(), e)))?;

        info!("Loaded catalog '{}' with {} package(s)", catalog.name, catalog.packages.len());
        Ok(catalog)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl PackageSource for CatalogSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn search(&self, request: &SearchRequest) -> Result<Vec<PackageMatch>> {
        Ok(self
            .packages
            .iter()
            .filter(|p| request.matches(&p.id))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const CATALOG: &str = r#"{
        "name": "test",
        "packages": [
            {"id": "B", "version": "1.0", "installers": [{}]},
            {"id": "minVersion", "version": "1.0", "installers": [{}]},
            {"id": "MinVersion", "version": "1.5", "installers": [{}]}
        ]
    }"#;

    #[test]
    fn test_versions_grouped_by_id() {
        let catalog = CatalogSource::from_json(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);

        let found = catalog.search(&SearchRequest::by_id("MINVERSION")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].available.len(), 2);
        assert_eq!(found[0].latest_available().unwrap().version, Version::parse("1.5"));
    }

    #[test]
    fn test_search_no_match() {
        let catalog = CatalogSource::from_json(CATALOG).unwrap();
        assert!(catalog.search(&SearchRequest::by_id("Z")).unwrap().is_empty());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();

        let catalog = CatalogSource::load(file.path()).unwrap();
        assert_eq!(catalog.name(), "test");
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not json").unwrap();

        let result = CatalogSource::load(file.path());
        assert!(matches!(result.unwrap_err(), Error::Catalog(_)));
    }
}
