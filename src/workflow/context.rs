// src/workflow/context.rs

//! Per-run execution context
//!
//! A [`Context`] carries the data produced by pipeline steps, whether the
//! run has been terminated, and an environment shared with every nested
//! context cloned from it (output, task dispatch, installer backend).

use super::data::DataSlot;
use super::dispatch::{DirectDispatch, TaskDispatch};
use super::install::PackageInstaller;
use super::reporter::Reporter;
use super::task::WorkflowTask;
use crate::error::{Error, Result};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Reason a run was stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    InternalError,
    NoPackageFound,
    MultiplePackagesFound,
    NoApplicableInstaller,
    InstallFailed,
}

impl ExitCode {
    /// Process exit status
    pub fn code(&self) -> i32 {
        match self {
            ExitCode::InternalError => 1,
            ExitCode::NoPackageFound => 2,
            ExitCode::MultiplePackagesFound => 3,
            ExitCode::NoApplicableInstaller => 4,
            ExitCode::InstallFailed => 5,
        }
    }
}

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ExitCode::InternalError => "internal error",
            ExitCode::NoPackageFound => "no package found",
            ExitCode::MultiplePackagesFound => "multiple packages found",
            ExitCode::NoApplicableInstaller => "no applicable installer",
            ExitCode::InstallFailed => "install failed",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionState {
    Running,
    Terminated(ExitCode),
}

/// Collaborators shared by a context and all its nested clones
pub struct Environment {
    pub reporter: Reporter,
    pub installer: Arc<dyn PackageInstaller>,
    pub dispatch: Arc<dyn TaskDispatch>,
}

impl Environment {
    pub fn new(reporter: Reporter, installer: Arc<dyn PackageInstaller>) -> Self {
        Self {
            reporter,
            installer,
            dispatch: Arc::new(DirectDispatch),
        }
    }

    /// Route every step through `dispatch` instead of calling it directly
    pub fn with_dispatch(mut self, dispatch: Arc<dyn TaskDispatch>) -> Self {
        self.dispatch = dispatch;
        self
    }
}

pub struct Context {
    data: HashMap<&'static str, Box<dyn Any + Send>>,
    state: ExecutionState,
    env: Arc<Environment>,
}

impl Context {
    pub fn new(env: Environment) -> Self {
        Self {
            data: HashMap::new(),
            state: ExecutionState::Running,
            env: Arc::new(env),
        }
    }

    /// A fresh context for a sub-operation: no data, running, same environment
    pub fn clone_for_nested(&self) -> Self {
        Self {
            data: HashMap::new(),
            state: ExecutionState::Running,
            env: Arc::clone(&self.env),
        }
    }

    /// Store `value` under slot `K`, replacing any previous value
    pub fn add<K: DataSlot>(&mut self, value: K::Value) {
        self.data.insert(K::NAME, Box::new(value));
    }

    /// Read slot `K`; a slot no earlier step populated is a wiring error
    pub fn get<K: DataSlot>(&self) -> Result<&K::Value> {
        self.data
            .get(K::NAME)
            .and_then(|value| value.downcast_ref::<K::Value>())
            .ok_or(Error::MissingData(K::NAME))
    }

    pub fn get_mut<K: DataSlot>(&mut self) -> Result<&mut K::Value> {
        self.data
            .get_mut(K::NAME)
            .and_then(|value| value.downcast_mut::<K::Value>())
            .ok_or(Error::MissingData(K::NAME))
    }

    pub fn contains<K: DataSlot>(&self) -> bool {
        self.data.contains_key(K::NAME)
    }

    pub fn remove<K: DataSlot>(&mut self) -> Option<K::Value> {
        self.data
            .remove(K::NAME)
            .and_then(|value| value.downcast::<K::Value>().ok())
            .map(|value| *value)
    }

    /// Stop the run; the first termination wins
    pub fn terminate(&mut self, code: ExitCode) {
        if self.state == ExecutionState::Running {
            debug!("Terminating context: {}", code);
            self.state = ExecutionState::Terminated(code);
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.state != ExecutionState::Running
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn exit_code(&self) -> Option<ExitCode> {
        match self.state {
            ExecutionState::Running => None,
            ExecutionState::Terminated(code) => Some(code),
        }
    }

    pub fn reporter(&self) -> &Reporter {
        &self.env.reporter
    }

    pub fn installer(&self) -> Arc<dyn PackageInstaller> {
        Arc::clone(&self.env.installer)
    }

    /// Run one step unless the context is already terminated
    pub fn execute(&mut self, task: &WorkflowTask) -> Result<()> {
        if self.is_terminated() {
            return Ok(());
        }
        debug!("Running task {}", task.name());
        let dispatch = Arc::clone(&self.env.dispatch);
        dispatch.dispatch(task, self)
    }
}
