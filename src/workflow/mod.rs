// src/workflow/mod.rs

//! Staged execution engine
//!
//! An operation is a [`Pipeline`] of named [`WorkflowTask`] steps run
//! against a [`Context`]. Steps communicate through typed data slots
//! (see [`data`]) and stop the run by terminating the context with an
//! [`ExitCode`]. Sub-operations, such as installing one dependency, run in
//! a nested context that shares output, dispatch and installer backend with
//! its parent.

mod context;
pub mod data;
mod dependencies;
mod dispatch;
pub mod install;
mod reporter;
mod task;

pub use context::{Context, Environment, ExecutionState, ExitCode};
pub use dependencies::{DependencyManager, UNINSTALL_DEPENDENCIES_MESSAGE, VALIDATE_DEPENDENCIES_MESSAGE};
pub use dispatch::{DirectDispatch, TaskDispatch, TaskOverrides};
pub use install::{DatabaseInstaller, PackageInstaller, INSTALL_DEPENDENCIES_MESSAGE};
pub use reporter::{CapturedOutput, Reporter};
pub use task::{Pipeline, WorkflowTask};
