// src/workflow/install.rs

//! Single-package install steps
//!
//! - `SearchPackage`: find the requested id in a source
//! - `SelectInstaller`: pick the installer to use from the manifest
//! - `ExecuteInstaller`: hand the package to the [`PackageInstaller`] backend
//!
//! Dependency handling lives in [`super::dependencies`]; the pipelines built
//! here splice those steps in before the package itself is installed.

use super::context::{Context, ExitCode};
use super::data::{Installer, Manifest, PackageSource, Query, RequestedVersion};
use super::dependencies::DependencyManager;
use super::task::{Pipeline, WorkflowTask};
use crate::db;
use crate::db::models::{Changeset, ChangesetStatus, Trove};
use crate::error::{Error, Result};
use crate::manifest;
use crate::source::{self, SearchRequest};
use crate::version::Version;
use std::sync::Arc;
use tracing::{info, warn};

/// Shown before installing a package that declares dependencies
pub const INSTALL_DEPENDENCIES_MESSAGE: &str = "This package requires the following dependencies:";

/// Backend that actually puts a package on the system
pub trait PackageInstaller: Send + Sync {
    fn install(&self, manifest: &manifest::Manifest, installer: &manifest::Installer) -> Result<()>;
}

/// Records installs as troves in the local database
#[derive(Debug, Clone)]
pub struct DatabaseInstaller {
    db_path: String,
}

impl DatabaseInstaller {
    pub fn new(db_path: impl Into<String>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// Remove every recorded version of `id`, returning what was removed
    pub fn remove(&self, id: &str) -> Result<Vec<Trove>> {
        let mut conn = db::open(&self.db_path)?;
        let troves = Trove::find_by_name(&conn, id)?;
        if troves.is_empty() {
            return Ok(troves);
        }

        db::transaction(&mut conn, |tx| {
            let mut changeset = Changeset::new(format!("Remove {}", troves[0].name));
            changeset.insert(tx)?;
            for trove in &troves {
                if let Some(trove_id) = trove.id {
                    Trove::delete(tx, trove_id)?;
                }
            }
            changeset.update_status(tx, ChangesetStatus::Applied)?;
            Ok(())
        })?;

        info!("Removed {} record(s) of {}", troves.len(), id);
        Ok(troves)
    }
}

impl PackageInstaller for DatabaseInstaller {
    fn install(&self, manifest: &manifest::Manifest, installer: &manifest::Installer) -> Result<()> {
        let mut conn = db::open(&self.db_path)?;

        let existing = Trove::find_by_name(&conn, &manifest.id)?;
        if existing
            .iter()
            .any(|t| Version::parse(&t.version) == manifest.version && t.architecture == installer.architecture)
        {
            return Err(Error::InstallError(format!(
                "{} version {} is already installed",
                manifest.id, manifest.version
            )));
        }

        db::transaction(&mut conn, |tx| {
            let mut changeset = Changeset::new(format!("Install {}-{}", manifest.id, manifest.version));
            let changeset_id = changeset.insert(tx)?;

            let mut trove = Trove::new(manifest.id.clone(), manifest.version.to_string());
            trove.architecture = installer.architecture.clone();
            trove.description = manifest.description.clone().or_else(|| manifest.name.clone());
            trove.source = installer.url.clone();
            trove.installed_by_changeset_id = Some(changeset_id);
            trove.insert(tx)?;

            changeset.update_status(tx, ChangesetStatus::Applied)?;
            Ok(())
        })?;

        info!("Recorded install of {} {}", manifest.id, manifest.version);
        Ok(())
    }
}

/// Find the queried package in `source` and load the manifest to install
pub fn search_package(source: Arc<dyn source::PackageSource>) -> WorkflowTask {
    WorkflowTask::new("SearchPackage", move |ctx: &mut Context| {
        let query = ctx.get::<Query>()?.clone();
        let matches = match source.search(&SearchRequest::by_id(&query)) {
            Ok(matches) => matches,
            Err(e) => {
                ctx.reporter().error(format!("Failed to search {}: {}", source.name(), e));
                ctx.terminate(ExitCode::InternalError);
                return Ok(());
            }
        };

        let found = match matches.as_slice() {
            [] => {
                ctx.reporter().info("No package found matching input criteria.");
                ctx.terminate(ExitCode::NoPackageFound);
                return Ok(());
            }
            [found] => found,
            _ => {
                ctx.reporter().info("Multiple packages found matching input criteria.");
                for m in &matches {
                    ctx.reporter().info(format!("  {}", m.id));
                }
                ctx.terminate(ExitCode::MultiplePackagesFound);
                return Ok(());
            }
        };

        let selected = match ctx.get::<RequestedVersion>() {
            Ok(version) => found.find_version(version),
            Err(_) => found.latest_available(),
        };
        let Some(selected) = selected.cloned() else {
            ctx.reporter().info(format!("No matching version of {} is available.", found.id));
            ctx.terminate(ExitCode::NoPackageFound);
            return Ok(());
        };

        ctx.reporter().info(format!("Found {} [{}] in {}", selected.id, selected.version, source.name()));
        ctx.add::<Manifest>(selected);
        ctx.add::<PackageSource>(Arc::clone(&source));
        Ok(())
    })
}

/// Use the manifest's first installer
pub fn select_installer() -> WorkflowTask {
    WorkflowTask::new("SelectInstaller", |ctx: &mut Context| {
        let installer = ctx.get::<Manifest>()?.installers.first().cloned();
        match installer {
            Some(installer) => ctx.add::<Installer>(installer),
            None => {
                ctx.reporter().error("No applicable installer found.");
                ctx.terminate(ExitCode::NoApplicableInstaller);
            }
        }
        Ok(())
    })
}

/// Install the selected package through the environment's backend
pub fn execute_installer() -> WorkflowTask {
    WorkflowTask::new("ExecuteInstaller", |ctx: &mut Context| {
        let manifest = ctx.get::<Manifest>()?.clone();
        let installer = ctx.get::<Installer>()?.clone();

        ctx.reporter().info(format!("Installing {} {}", manifest.id, manifest.version));
        match ctx.installer().install(&manifest, &installer) {
            Ok(()) => ctx.reporter().info("Successfully installed"),
            Err(e) => {
                warn!("Install of {} failed: {}", manifest.id, e);
                ctx.reporter().error(format!("Installation failed: {}", e));
                ctx.terminate(ExitCode::InstallFailed);
            }
        }
        Ok(())
    })
}

/// Search, resolve dependencies, then install the root package
pub fn install_pipeline(source: Arc<dyn source::PackageSource>, dependencies: &Arc<DependencyManager>) -> Pipeline {
    Pipeline::new()
        .then(search_package(source))
        .then(select_installer())
        .then(dependencies.get_dependencies_from_installer())
        .then(dependencies.report_dependencies(INSTALL_DEPENDENCIES_MESSAGE))
        .then(dependencies.build_package_dependencies_graph())
        .then(dependencies.install_dependencies())
        .then(execute_installer())
}

/// Like [`install_pipeline`] for a manifest already in the context
pub fn manifest_install_pipeline(dependencies: &Arc<DependencyManager>) -> Pipeline {
    Pipeline::new()
        .then(select_installer())
        .then(dependencies.get_dependencies_from_installer())
        .then(dependencies.report_dependencies(INSTALL_DEPENDENCIES_MESSAGE))
        .then(dependencies.build_package_dependencies_graph())
        .then(dependencies.install_dependencies())
        .then(execute_installer())
}

/// Install one already-resolved dependency; its own dependencies come first in the plan
pub fn dependency_install_pipeline() -> Pipeline {
    Pipeline::new().then(execute_installer())
}

#[cfg(test)]
pub(crate) struct NoopInstaller;

#[cfg(test)]
impl PackageInstaller for NoopInstaller {
    fn install(&self, _manifest: &manifest::Manifest, _installer: &manifest::Installer) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CatalogSource;
    use crate::workflow::context::Environment;
    use crate::workflow::reporter::Reporter;
    use tempfile::NamedTempFile;

    fn catalog() -> Arc<dyn source::PackageSource> {
        let mut one = manifest::Manifest::new("Tool", "1.0");
        one.installers.push(manifest::Installer::default());
        let mut two = manifest::Manifest::new("Tool", "2.0");
        two.installers.push(manifest::Installer::default());
        let bare = manifest::Manifest::new("Bare", "1.0");
        Arc::new(CatalogSource::from_manifests("test", vec![one, two, bare]))
    }

    fn context() -> (Context, crate::workflow::reporter::CapturedOutput) {
        let (reporter, output) = Reporter::capture();
        (Context::new(Environment::new(reporter, Arc::new(NoopInstaller))), output)
    }

    #[test]
    fn test_search_selects_latest() {
        let (mut ctx, _) = context();
        ctx.add::<Query>("tool".to_string());
        ctx.execute(&search_package(catalog())).unwrap();

        assert_eq!(ctx.get::<Manifest>().unwrap().version, Version::parse("2.0"));
        assert!(ctx.contains::<PackageSource>());
    }

    #[test]
    fn test_search_requested_version() {
        let (mut ctx, _) = context();
        ctx.add::<Query>("Tool".to_string());
        ctx.add::<RequestedVersion>(Version::parse("1.0"));
        ctx.execute(&search_package(catalog())).unwrap();

        assert_eq!(ctx.get::<Manifest>().unwrap().version, Version::parse("1.0"));
    }

    #[test]
    fn test_search_not_found_terminates() {
        let (mut ctx, output) = context();
        ctx.add::<Query>("Nope".to_string());
        ctx.execute(&search_package(catalog())).unwrap();

        assert_eq!(ctx.exit_code(), Some(ExitCode::NoPackageFound));
        assert!(output.contains("No package found"));
    }

    #[test]
    fn test_select_installer_requires_one() {
        let (mut ctx, _) = context();
        ctx.add::<Manifest>(manifest::Manifest::new("Bare", "1.0"));
        ctx.execute(&select_installer()).unwrap();
        assert_eq!(ctx.exit_code(), Some(ExitCode::NoApplicableInstaller));
    }

    #[test]
    fn test_database_installer_records_trove() {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap().to_string();
        db::init(&db_path).unwrap();

        let backend = DatabaseInstaller::new(db_path.clone());
        let mut pkg = manifest::Manifest::new("Tool", "1.0");
        pkg.installers.push(manifest::Installer::default());

        backend.install(&pkg, &pkg.installers[0]).unwrap();
        assert!(matches!(
            backend.install(&pkg, &pkg.installers[0]),
            Err(Error::InstallError(_))
        ));

        let conn = db::open(&db_path).unwrap();
        let troves = Trove::find_by_name(&conn, "tool").unwrap();
        assert_eq!(troves.len(), 1);
        assert!(troves[0].installed_by_changeset_id.is_some());

        assert_eq!(backend.remove("TOOL").unwrap().len(), 1);
        assert!(Trove::find_by_name(&conn, "tool").unwrap().is_empty());
    }
}
