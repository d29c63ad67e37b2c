// src/workflow/dependencies.rs

//! Dependency handling steps
//!
//! Before a package is installed its package dependencies are resolved
//! against a dependency source, checked for cycles and installed one by one
//! in dependency-first order, each through a nested context of its own.
//!
//! Everything here is gated on [`Settings::dependencies_enabled`]; with the
//! gate off every step is a no-op and the package installs standalone.

use super::context::{Context, ExitCode};
use super::data::{
    Dependencies, DependencySource, InstallationOrder, Installer, Manifest, PackageSource,
    PackageToInstall, PackagesToInstall,
};
use super::install;
use super::task::WorkflowTask;
use crate::dependency::{
    Dependency, DependencyGraph, DependencyKind, DependencyList, NodeState, Resolution, ResolveFailure,
};
use crate::error::Result;
use crate::settings::Settings;
use crate::source::{self, CatalogSource, CompositeSource, SearchRequest};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shown by `validate` above the union of every installer's dependencies
pub const VALIDATE_DEPENDENCIES_MESSAGE: &str =
    "Manifest has the following dependencies that were not validated; ensure that they are valid for this manifest:";

/// Shown by `remove` above what the removed package depended on
pub const UNINSTALL_DEPENDENCIES_MESSAGE: &str =
    "This package had dependencies that may not be needed anymore:";

/// Builds the dependency steps of install, show, validate and remove pipelines
pub struct DependencyManager {
    enabled: bool,
    /// Fallback when the package did not come from a source (manifest installs)
    configured_source: Option<Arc<dyn source::PackageSource>>,
    /// Correlated with the dependency source to detect what is already installed
    installed_source: Option<Arc<dyn source::PackageSource>>,
}

impl DependencyManager {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            configured_source: None,
            installed_source: None,
        }
    }

    /// Gate and configured dependency source from settings
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let mut manager = Self::new(settings.dependencies_enabled);
        if let Some(path) = &settings.dependency_source {
            manager.configured_source = Some(Arc::new(CatalogSource::load(path)?));
        }
        Ok(manager)
    }

    pub fn with_dependency_source(mut self, source: Arc<dyn source::PackageSource>) -> Self {
        self.configured_source = Some(source);
        self
    }

    pub fn with_installed_source(mut self, source: Arc<dyn source::PackageSource>) -> Self {
        self.installed_source = Some(source);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn correlate_installed(&self, available: Arc<dyn source::PackageSource>) -> Arc<dyn source::PackageSource> {
        match &self.installed_source {
            Some(installed) => Arc::new(CompositeSource::new(available, Arc::clone(installed))),
            None => available,
        }
    }

    /// Print `message` and the `Dependencies` slot grouped by kind
    pub fn report_dependencies(self: &Arc<Self>, message: &'static str) -> WorkflowTask {
        let manager = Arc::clone(self);
        WorkflowTask::new("ReportDependencies", move |ctx: &mut Context| {
            if !manager.enabled {
                return Ok(());
            }

            let dependencies = ctx.get::<Dependencies>()?;
            if dependencies.has_any() {
                report(ctx, message, dependencies);
            }
            Ok(())
        })
    }

    /// `Dependencies` = union of what every installer of the manifest needs
    pub fn get_installers_dependencies_from_manifest(self: &Arc<Self>) -> WorkflowTask {
        let manager = Arc::clone(self);
        WorkflowTask::new("GetInstallersDependenciesFromManifest", move |ctx: &mut Context| {
            if manager.enabled {
                let dependencies = ctx.get::<Manifest>()?.all_installer_dependencies();
                ctx.add::<Dependencies>(dependencies);
            }
            Ok(())
        })
    }

    /// `Dependencies` = what the selected installer needs
    pub fn get_dependencies_from_installer(self: &Arc<Self>) -> WorkflowTask {
        let manager = Arc::clone(self);
        WorkflowTask::new("GetDependenciesFromInstaller", move |ctx: &mut Context| {
            if manager.enabled {
                let dependencies = ctx.get::<Manifest>()?.dependencies_for(ctx.get::<Installer>()?);
                ctx.add::<Dependencies>(dependencies);
            }
            Ok(())
        })
    }

    /// `Dependencies` for a package being removed
    ///
    /// Installs do not record what they pulled in, so this is always empty.
    // TODO: persist the installed dependency list per trove so remove can report it
    pub fn get_dependencies_info_for_uninstall(self: &Arc<Self>) -> WorkflowTask {
        let manager = Arc::clone(self);
        WorkflowTask::new("GetDependenciesInfoForUninstall", move |ctx: &mut Context| {
            if manager.enabled {
                ctx.add::<Dependencies>(DependencyList::new());
            }
            Ok(())
        })
    }

    /// Set `DependencySource`, or leave it unset when no source is available
    ///
    /// A package found in a source resolves its dependencies in that same
    /// source; otherwise the configured dependency source is used.
    pub fn open_dependency_source(self: &Arc<Self>) -> WorkflowTask {
        let manager = Arc::clone(self);
        WorkflowTask::new("OpenDependencySource", move |ctx: &mut Context| {
            let available = match ctx.get::<PackageSource>() {
                Ok(source) => Some(Arc::clone(source)),
                Err(_) => manager.configured_source.clone(),
            };
            if let Some(available) = available {
                debug!("Using {} as dependency source", available.name());
                ctx.add::<DependencySource>(manager.correlate_installed(available));
            }
            Ok(())
        })
    }

    /// Resolve the package dependencies of the selected installer into an install plan
    ///
    /// Sets `InstallationOrder` (every node, dependencies first) and
    /// `PackagesToInstall` (the nodes that actually need installing). A
    /// dependency loop is reported and leaves both unset, so the package
    /// itself still installs.
    pub fn build_package_dependencies_graph(self: &Arc<Self>) -> WorkflowTask {
        let manager = Arc::clone(self);
        WorkflowTask::new("BuildPackageDependenciesGraph", move |ctx: &mut Context| {
            if !manager.enabled {
                return Ok(());
            }
            manager.build_graph(ctx)
        })
    }

    fn build_graph(self: &Arc<Self>, ctx: &mut Context) -> Result<()> {
        let manifest = ctx.get::<Manifest>()?.clone();
        let root_dependencies = manifest.dependencies_for(ctx.get::<Installer>()?);
        ctx.add::<Dependencies>(root_dependencies.clone());

        // Only package dependencies are resolved against a source; features,
        // libraries and external requirements are reported, never installed
        if !root_dependencies.has_any_of(DependencyKind::Package) {
            return Ok(());
        }

        ctx.execute(&self.open_dependency_source())?;
        if !ctx.contains::<DependencySource>() {
            ctx.reporter().error("dependency source not found");
            ctx.terminate(ExitCode::InternalError);
            return Ok(());
        }

        let source = Arc::clone(ctx.get::<DependencySource>()?);
        let reporter = ctx.reporter().clone();
        let mut candidates: HashMap<String, PackageToInstall> = HashMap::new();

        let root = Dependency::package(manifest.id.clone()).with_min_version(manifest.version.clone());
        let mut graph = DependencyGraph::new(root, &root_dependencies, |dependency: &Dependency| {
            let resolution = resolve(source.as_ref(), &mut candidates, dependency);
            if let Resolution::Unresolved(failure) = &resolution {
                warn!("Cannot resolve dependency {}: {}", dependency.id, failure);
                reporter.info(format!("{}: {}", dependency.id, failure));
            }
            resolution
        });
        graph.build();

        let Some(order) = graph.installation_order() else {
            ctx.reporter().info("has loop");
            warn!("Dependency loop found");
            return Ok(());
        };
        let states: Vec<NodeState> = order
            .iter()
            .map(|d| graph.node_state(&d.id).cloned().unwrap_or(NodeState::Pending))
            .collect();
        drop(graph);

        let names: Vec<&str> = order.iter().map(|d| d.id.as_str()).chain([manifest.id.as_str()]).collect();
        ctx.reporter().info(format!("order: {}", names.join(", ")));

        // Satisfied and unresolved nodes stay in the order but install nothing
        let plan: Vec<PackageToInstall> = order
            .iter()
            .zip(&states)
            .filter(|(_, state)| **state == NodeState::Expanded)
            .filter_map(|(dependency, _)| candidates.remove(&dependency.normalized_id()))
            .collect();

        info!("{} dependenc(ies) of {} to install", plan.len(), manifest.id);
        ctx.add::<InstallationOrder>(order);
        ctx.add::<PackagesToInstall>(plan);
        Ok(())
    }

    /// Install every entry of `PackagesToInstall` in order, each in a nested context
    pub fn install_dependencies(self: &Arc<Self>) -> WorkflowTask {
        let manager = Arc::clone(self);
        WorkflowTask::new("InstallDependencies", move |ctx: &mut Context| {
            if !manager.enabled || !ctx.contains::<PackagesToInstall>() {
                return Ok(());
            }

            let packages = ctx.get::<PackagesToInstall>()?.clone();
            let pipeline = install::dependency_install_pipeline();

            for package in packages {
                let id = package.manifest.id.clone();
                let mut nested = ctx.clone_for_nested();
                nested.add::<Manifest>(package.manifest);
                nested.add::<Installer>(package.installer);
                pipeline.execute(&mut nested)?;

                if let Some(code) = nested.exit_code() {
                    warn!("Dependency {} failed to install: {}", id, code);
                    ctx.reporter().error("error installing dependencies");
                    ctx.terminate(ExitCode::InternalError);
                    return Ok(());
                }
            }
            Ok(())
        })
    }
}

/// Resolve one dependency against `source`
///
/// On success the chosen version is recorded in `candidates` and its own
/// dependencies are returned, so the version expanded is the version
/// installed. Any candidate from an earlier, weaker bound is discarded.
fn resolve(
    source: &dyn source::PackageSource,
    candidates: &mut HashMap<String, PackageToInstall>,
    dependency: &Dependency,
) -> Resolution {
    let key = dependency.normalized_id();
    candidates.remove(&key);

    let matches = match source.search(&SearchRequest::by_id(&dependency.id)) {
        Ok(matches) => matches,
        Err(e) => return Resolution::Unresolved(ResolveFailure::Search(e.to_string())),
    };

    let package = match matches.len() {
        0 => return Resolution::Unresolved(ResolveFailure::NotFound),
        1 => matches.into_iter().next(),
        n => return Resolution::Unresolved(ResolveFailure::Ambiguous(n)),
    };
    let Some(package) = package else {
        return Resolution::Unresolved(ResolveFailure::NotFound);
    };

    if package.is_installed_ok(dependency) {
        return Resolution::Satisfied;
    }
    if let Some(installed) = &package.installed_version {
        info!("{} {} is installed but {} is required, upgrading", package.id, installed, dependency);
    }

    let Some(latest) = package.latest_available() else {
        return Resolution::Unresolved(ResolveFailure::NoVersions);
    };
    if latest.installers.is_empty() {
        return Resolution::Unresolved(ResolveFailure::NoInstallers);
    }
    if !dependency.is_version_ok(&latest.version) {
        return Resolution::Unresolved(ResolveFailure::VersionNotSatisfied {
            latest: latest.version.clone(),
        });
    }

    let Some((manifest, installer)) = package
        .lowest_satisfying(dependency)
        .and_then(|m| m.installers.first().map(|i| (m, i)))
    else {
        return Resolution::Unresolved(ResolveFailure::NoInstallers);
    };

    let dependencies = manifest.dependencies_for(installer);
    debug!("Candidate for {} is {}", dependency, manifest.version);
    candidates.insert(
        key,
        PackageToInstall {
            manifest: manifest.clone(),
            installer: installer.clone(),
        },
    );
    Resolution::Dependencies(dependencies)
}

fn report(ctx: &Context, message: &str, dependencies: &DependencyList) {
    let reporter = ctx.reporter();
    reporter.info(message);

    for kind in DependencyKind::ALL {
        if !dependencies.has_any_of(kind) {
            continue;
        }
        reporter.info(format!("  - {}", kind.heading()));
        dependencies.apply_to_kind(kind, |dependency| match kind {
            DependencyKind::Package => reporter.info(format!("      {}", dependency)),
            _ => reporter.info(format!("      {}", dependency.id)),
        });
    }
}
