// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn db_path_arg() -> Arg {
    Arg::new("db_path")
        .short('d')
        .long("db-path")
        .value_name("PATH")
        .default_value("/var/lib/pkgflow/pkgflow.db")
        .global(true)
        .help("Database path")
}

fn source_arg() -> Arg {
    Arg::new("source")
        .short('s')
        .long("source")
        .value_name("CATALOG")
        .help("Catalog to search (default: dependencies.source)")
}

fn build_cli() -> Command {
    Command::new("pkgflow")
        .version(env!("CARGO_PKG_VERSION"))
        .author("pkgflow Contributors")
        .about("Package installer with dependency resolution")
        .subcommand_required(false)
        .arg(db_path_arg())
        .arg(
            Arg::new("dependencies")
                .long("dependencies")
                .value_name("BOOL")
                .env("PKGFLOW_DEPENDENCIES")
                .global(true)
                .help("Override the dependencies.enabled setting for this run"),
        )
        .arg(
            Arg::new("dependency_source")
                .long("dependency-source")
                .value_name("CATALOG")
                .global(true)
                .help("Override the dependencies.source setting for this run"),
        )
        .subcommand(Command::new("init").about("Initialize the pkgflow database"))
        .subcommand(
            Command::new("install")
                .about("Install a package and its dependencies")
                .arg(Arg::new("id").help("Package id to search for"))
                .arg(
                    Arg::new("manifest")
                        .short('m')
                        .long("manifest")
                        .value_name("FILE")
                        .help("Install from a manifest file instead of searching"),
                )
                .arg(
                    Arg::new("requested_version")
                        .long("version")
                        .value_name("VERSION")
                        .help("Exact version to install (default: latest)"),
                )
                .arg(source_arg()),
        )
        .subcommand(
            Command::new("show")
                .about("Show a package from a catalog with everything its installers depend on")
                .arg(Arg::new("id").required(true).help("Package id"))
                .arg(source_arg()),
        )
        .subcommand(
            Command::new("validate")
                .about("Check a manifest file and list its dependencies")
                .arg(Arg::new("manifest").required(true).help("Path to the manifest JSON file")),
        )
        .subcommand(
            Command::new("list")
                .about("List installed packages")
                .arg(Arg::new("pattern").help("Package name pattern (optional)")),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove an installed package")
                .arg(Arg::new("id").required(true).help("Package id to remove")),
        )
        .subcommand(Command::new("history").about("Show changeset history"))
        .subcommand(
            Command::new("config")
                .about("Read or change settings")
                .subcommand_required(true)
                .subcommand(
                    Command::new("get")
                        .about("Print the stored value of a key")
                        .arg(Arg::new("key").required(true)),
                )
                .subcommand(
                    Command::new("set")
                        .about("Store a value")
                        .arg(Arg::new("key").required(true))
                        .arg(Arg::new("value").required(true).action(ArgAction::Set)),
                )
                .subcommand(Command::new("list").about("Print every stored key")),
        )
        .subcommand(
            Command::new("completions")
                .about("Generate shell completion scripts")
                .arg(
                    Arg::new("shell")
                        .required(true)
                        .value_parser(["bash", "elvish", "fish", "powershell", "zsh"])
                        .help("Shell type"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory
    let out_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let man_dir = out_dir.join("man");
    fs::create_dir_all(&man_dir).expect("Failed to create man directory");

    // Generate main man page
    let cmd = build_cli();
    let man = Man::new(cmd);
    let mut buffer = Vec::new();
    man.render(&mut buffer).expect("Failed to render man page");

    let man_path = man_dir.join("pkgflow.1");
    fs::write(&man_path, buffer).expect("Failed to write man page");

    println!("cargo:warning=Man page generated at {}", man_path.display());
}
