// src/main.rs

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use pkgflow::db::models::{Changeset, Trove};
use pkgflow::manifest::Manifest;
use pkgflow::settings::{KNOWN_KEYS, Settings};
use pkgflow::source::{CatalogSource, InstalledSource, PackageSource};
use pkgflow::version::Version;
use pkgflow::workflow::data::{self, Query, RequestedVersion};
use pkgflow::workflow::install::{install_pipeline, manifest_install_pipeline, search_package};
use pkgflow::workflow::{
    Context, DatabaseInstaller, DependencyManager, Environment, Pipeline, Reporter,
    UNINSTALL_DEPENDENCIES_MESSAGE, VALIDATE_DEPENDENCIES_MESSAGE,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

const DEFAULT_DB_PATH: &str = "/var/lib/pkgflow/pkgflow.db";

#[derive(Parser)]
#[command(name = "pkgflow")]
#[command(author, version, about = "Package installer with dependency resolution", long_about = None)]
struct Cli {
    /// Database path
    #[arg(short, long, global = true, default_value = DEFAULT_DB_PATH)]
    db_path: String,

    /// Override the dependencies.enabled setting for this run
    #[arg(long, global = true, env = "PKGFLOW_DEPENDENCIES", value_name = "BOOL")]
    dependencies: Option<bool>,

    /// Override the dependencies.source setting for this run
    #[arg(long, global = true, value_name = "CATALOG")]
    dependency_source: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the pkgflow database
    Init,
    /// Install a package and its dependencies
    Install {
        /// Package id to search for
        #[arg(required_unless_present = "manifest")]
        id: Option<String>,
        /// Install from a manifest file instead of searching
        #[arg(short, long, conflicts_with_all = ["id", "source"])]
        manifest: Option<PathBuf>,
        /// Exact version to install (default: latest)
        #[arg(long = "version", value_name = "VERSION")]
        requested_version: Option<String>,
        /// Catalog to search (default: dependencies.source)
        #[arg(short, long, value_name = "CATALOG")]
        source: Option<PathBuf>,
    },
    /// Show a package from a catalog with everything its installers depend on
    Show {
        /// Package id
        id: String,
        /// Catalog to search (default: dependencies.source)
        #[arg(short, long, value_name = "CATALOG")]
        source: Option<PathBuf>,
    },
    /// Check a manifest file and list its dependencies
    Validate {
        /// Path to the manifest JSON file
        manifest: PathBuf,
    },
    /// List installed packages
    List {
        /// Package name pattern (optional, shows all if omitted)
        pattern: Option<String>,
    },
    /// Remove an installed package
    Remove {
        /// Package id to remove
        id: String,
    },
    /// Show changeset history
    History,
    /// Read or change settings
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the stored value of a key
    Get { key: String },
    /// Store a value
    Set { key: String, value: String },
    /// Print every stored key
    List,
}

/// Settings from the database with command line overrides applied
fn load_settings(cli: &Cli) -> Result<Settings> {
    let conn = pkgflow::db::open(&cli.db_path)?;
    let mut settings = Settings::load(&conn)?;
    if let Some(enabled) = cli.dependencies {
        settings.dependencies_enabled = enabled;
    }
    if let Some(path) = &cli.dependency_source {
        settings.dependency_source = Some(path.clone());
    }
    Ok(settings)
}

fn dependency_manager(cli: &Cli, settings: &Settings) -> Result<Arc<DependencyManager>> {
    let manager = DependencyManager::from_settings(settings)?
        .with_installed_source(Arc::new(InstalledSource::new(cli.db_path.clone())));
    Ok(Arc::new(manager))
}

/// Catalog given on the command line, else the configured dependency source
fn open_catalog(path: Option<&Path>, settings: &Settings) -> Result<Arc<dyn PackageSource>> {
    let path = path
        .or(settings.dependency_source.as_deref())
        .ok_or_else(|| anyhow::anyhow!("No catalog given; pass --source or set dependencies.source"))?;
    Ok(Arc::new(CatalogSource::load(path)?))
}

fn new_context(db_path: &str) -> Context {
    Context::new(Environment::new(
        Reporter::stdout(),
        Arc::new(DatabaseInstaller::new(db_path)),
    ))
}

/// Run `pipeline`, exiting with the context's code if it was terminated
fn run(pipeline: &Pipeline, ctx: &mut Context) -> Result<()> {
    pipeline.execute(ctx)?;
    if let Some(code) = ctx.exit_code() {
        info!("Stopped: {}", code);
        std::process::exit(code.code());
    }
    Ok(())
}

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Init) => {
            info!("Initializing pkgflow database at: {}", cli.db_path);
            pkgflow::db::init(&cli.db_path)?;
            println!("Database initialized successfully at: {}", cli.db_path);
            Ok(())
        }
        Some(Commands::Install {
            id,
            manifest,
            requested_version,
            source,
        }) => {
            let settings = load_settings(&cli)?;
            let dependencies = dependency_manager(&cli, &settings)?;
            let mut ctx = new_context(&cli.db_path);

            let pipeline = match (manifest, id) {
                (Some(path), _) => {
                    info!("Installing from manifest: {}", path.display());
                    ctx.add::<data::Manifest>(Manifest::load(path)?);
                    manifest_install_pipeline(&dependencies)
                }
                (None, Some(id)) => {
                    info!("Installing package: {}", id);
                    ctx.add::<Query>(id.clone());
                    if let Some(version) = requested_version {
                        ctx.add::<RequestedVersion>(Version::parse(version));
                    }
                    install_pipeline(open_catalog(source.as_deref(), &settings)?, &dependencies)
                }
                (None, None) => return Err(anyhow::anyhow!("Nothing to install")),
            };

            run(&pipeline, &mut ctx)
        }
        Some(Commands::Show { id, source }) => {
            let settings = load_settings(&cli)?;
            let dependencies = dependency_manager(&cli, &settings)?;
            let mut ctx = new_context(&cli.db_path);
            ctx.add::<Query>(id.clone());

            let pipeline = Pipeline::new()
                .then(search_package(open_catalog(source.as_deref(), &settings)?))
                .then(dependencies.get_installers_dependencies_from_manifest())
                .then(dependencies.report_dependencies("Dependencies:"));
            run(&pipeline, &mut ctx)?;

            let manifest = ctx.get::<data::Manifest>()?;
            if let Some(name) = &manifest.name {
                println!("  Name: {}", name);
            }
            if let Some(description) = &manifest.description {
                println!("  Description: {}", description);
            }
            println!("  Installers: {}", manifest.installers.len());
            Ok(())
        }
        Some(Commands::Validate { manifest }) => {
            let settings = load_settings(&cli)?;
            let dependencies = dependency_manager(&cli, &settings)?;
            let mut ctx = new_context(&cli.db_path);
            ctx.add::<data::Manifest>(Manifest::load(manifest)?);

            let pipeline = Pipeline::new()
                .then(dependencies.get_installers_dependencies_from_manifest())
                .then(dependencies.report_dependencies(VALIDATE_DEPENDENCIES_MESSAGE));
            run(&pipeline, &mut ctx)?;

            println!("Manifest validation succeeded.");
            Ok(())
        }
        Some(Commands::List { pattern }) => {
            let conn = pkgflow::db::open(&cli.db_path)?;
            let troves = Trove::list(&conn, pattern.as_deref())?;

            if troves.is_empty() {
                println!("No packages found.");
            } else {
                println!("Installed packages:");
                for trove in &troves {
                    print!("  {} {}", trove.name, trove.version);
                    if let Some(arch) = &trove.architecture {
                        print!(" [{}]", arch);
                    }
                    println!();
                }
                println!("\nTotal: {} package(s)", troves.len());
            }
            Ok(())
        }
        Some(Commands::Remove { id }) => {
            info!("Removing package: {}", id);
            let settings = load_settings(&cli)?;
            let dependencies = dependency_manager(&cli, &settings)?;
            let mut ctx = new_context(&cli.db_path);

            let pipeline = Pipeline::new()
                .then(dependencies.get_dependencies_info_for_uninstall())
                .then(dependencies.report_dependencies(UNINSTALL_DEPENDENCIES_MESSAGE));
            run(&pipeline, &mut ctx)?;

            let removed = DatabaseInstaller::new(cli.db_path.clone()).remove(id)?;
            if removed.is_empty() {
                return Err(anyhow::anyhow!("Package '{}' is not installed", id));
            }
            for trove in &removed {
                println!("Removed package: {} version {}", trove.name, trove.version);
            }
            Ok(())
        }
        Some(Commands::History) => {
            let conn = pkgflow::db::open(&cli.db_path)?;
            let changesets = Changeset::list_all(&conn)?;

            if changesets.is_empty() {
                println!("No changeset history.");
            } else {
                println!("Changeset history:");
                for changeset in &changesets {
                    let timestamp = changeset
                        .applied_at
                        .as_deref()
                        .or(changeset.created_at.as_deref())
                        .unwrap_or("pending");
                    println!(
                        "  [{}] {} - {} ({})",
                        changeset.id.unwrap_or_default(),
                        timestamp,
                        changeset.description,
                        changeset.status.as_str()
                    );
                }
                println!("\nTotal: {} changeset(s)", changesets.len());
            }
            Ok(())
        }
        Some(Commands::Config { action }) => {
            let conn = pkgflow::db::open(&cli.db_path)?;
            match action {
                ConfigCommands::Get { key } => match Settings::lookup(&conn, key)? {
                    Some(value) => println!("{}", value),
                    None => println!("{} is not set", key),
                },
                ConfigCommands::Set { key, value } => {
                    Settings::store(&conn, key, value)?;
                    println!("{} = {}", key, value);
                }
                ConfigCommands::List => {
                    for key in KNOWN_KEYS {
                        let value = Settings::lookup(&conn, key)?;
                        println!("{} = {}", key, value.as_deref().unwrap_or("(unset)"));
                    }
                }
            }
            Ok(())
        }
        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "pkgflow", &mut io::stdout());
            Ok(())
        }
        None => {
            // No command provided, show help
            println!("pkgflow v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'pkgflow --help' for usage information");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_install_requires_id_or_manifest() {
        assert!(Cli::try_parse_from(["pkgflow", "install"]).is_err());
        assert!(Cli::try_parse_from(["pkgflow", "install", "Contoso.App"]).is_ok());
        assert!(Cli::try_parse_from(["pkgflow", "install", "--manifest", "app.json"]).is_ok());
    }

    #[test]
    fn test_global_dependency_overrides() {
        let cli = Cli::try_parse_from([
            "pkgflow",
            "install",
            "Contoso.App",
            "--dependencies",
            "true",
            "--dependency-source",
            "deps.json",
        ])
        .unwrap();

        assert_eq!(cli.dependencies, Some(true));
        assert_eq!(cli.dependency_source, Some(PathBuf::from("deps.json")));
        assert_eq!(cli.db_path, DEFAULT_DB_PATH);
    }

    #[test]
    fn test_open_catalog_requires_a_path() {
        assert!(open_catalog(None, &Settings::default()).is_err());
    }
}
