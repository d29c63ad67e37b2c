// src/manifest.rs

//! Package manifests
//!
//! A manifest describes one version of a package: its id, version and the
//! installers that can put it on the system. Dependencies may be declared on
//! each installer or once at the manifest level; an installer without its
//! own dependencies inherits the manifest-level ones.

use crate::dependency::DependencyList;
use crate::error::Result;
use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// One way of installing a package version
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "DependencyList::is_empty")]
    pub dependencies: DependencyList,
}

/// Metadata for one version of a package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: String,
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub installers: Vec<Installer>,
    /// Dependencies shared by installers that declare none
    #[serde(default, skip_serializing_if = "DependencyList::is_empty")]
    pub dependencies: DependencyList,
}

impl Manifest {
    pub fn new(id: impl Into<String>, version: impl Into<Version>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            name: None,
            description: None,
            installers: Vec::new(),
            dependencies: DependencyList::new(),
        }
    }

    /// Parse a manifest from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load a manifest from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading manifest from {}", path.display());
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Dependencies that apply when installing with `installer`
    pub fn dependencies_for(&self, installer: &Installer) -> DependencyList {
        if installer.dependencies.has_any() {
            installer.dependencies.clone()
        } else {
            self.dependencies.clone()
        }
    }

    /// Union of what every installer of this manifest may need
    pub fn all_installer_dependencies(&self) -> DependencyList {
        let mut all = DependencyList::new();
        for installer in &self.installers {
            all.add_all(&self.dependencies_for(installer));
        }
        if self.installers.is_empty() {
            all.add_all(&self.dependencies);
        }
        all
    }
}
