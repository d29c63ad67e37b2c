// src/source/installed.rs

//! Installed packages as a searchable source

use super::{PackageMatch, PackageSource, SearchRequest};
use crate::db;
use crate::db::models::Trove;
use crate::error::Result;
use crate::version::Version;
use tracing::debug;

/// Packages recorded as installed in the local database
///
/// Matches carry an installed version and no available versions. When a
/// package is recorded at several versions, the highest one is reported.
#[derive(Debug, Clone)]
pub struct InstalledSource {
    db_path: String,
}

impl InstalledSource {
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }
}

impl PackageSource for InstalledSource {
    fn name(&self) -> &str {
        "installed"
    }

    fn search(&self, request: &SearchRequest) -> Result<Vec<PackageMatch>> {
        let conn = db::open(&self.db_path)?;
        let troves = Trove::find_by_name(&conn, &request.id)?;
        debug!("Installed search for '{}' found {} record(s)", request.id, troves.len());

        let Some(first) = troves.first() else {
            return Ok(Vec::new());
        };

        let mut found = PackageMatch::new(first.name.clone());
        found.installed_version = troves.iter().map(|t| Version::parse(&t.version)).max();
        Ok(vec![found])
    }
}
