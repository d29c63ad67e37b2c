// src/source/composite.rs

//! Available packages correlated with what is installed

use super::{PackageMatch, PackageSource, SearchRequest};
use crate::error::Result;
use std::sync::Arc;

/// Searches an available source and fills in installed versions
///
/// Packages that are installed but no longer offered by the available
/// source are still returned, with no available versions.
pub struct CompositeSource {
    name: String,
    available: Arc<dyn PackageSource>,
    installed: Arc<dyn PackageSource>,
}

impl CompositeSource {
    pub fn new(available: Arc<dyn PackageSource>, installed: Arc<dyn PackageSource>) -> Self {
        Self {
            name: format!("{}+{}", available.name(), installed.name()),
            available,
            installed,
        }
    }
}

impl PackageSource for CompositeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn search(&self, request: &SearchRequest) -> Result<Vec<PackageMatch>> {
        let mut matches = self.available.search(request)?;
        let installed = self.installed.search(request)?;

        for record in installed {
            let key = record.id.to_lowercase();
            match matches.iter_mut().find(|m| m.id.to_lowercase() == key) {
                Some(existing) => existing.installed_version = record.installed_version,
                None => matches.push(record),
            }
        }

        Ok(matches)
    }
}
