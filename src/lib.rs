// src/lib.rs

//! pkgflow package manager
//!
//! Installs packages described by JSON manifests, resolving their package
//! dependencies first and installing them in dependency order.
//!
//! # Architecture
//!
//! - Database-first: installed packages, changesets and settings live in SQLite
//! - Sources: packages are found in JSON catalogs and correlated with what is installed
//! - Dependency graph: built lazily from the package being installed, checked for loops
//! - Workflow: every operation is a pipeline of named steps over a shared context

pub mod db;
pub mod dependency;
mod error;
pub mod manifest;
pub mod settings;
pub mod source;
pub mod version;
pub mod workflow;

pub use error::{Error, Result};
