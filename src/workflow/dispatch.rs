// src/workflow/dispatch.rs

//! Step dispatch
//!
//! Every step a context runs goes through the [`TaskDispatch`] it was
//! created with. Production code calls the step itself; tests install
//! [`TaskOverrides`] to swap individual steps for fakes, by name, across the
//! root context and every nested context cloned from it.

use super::context::Context;
use super::task::WorkflowTask;
use crate::error::Result;
use std::sync::Mutex;
use tracing::debug;

pub trait TaskDispatch: Send + Sync {
    fn dispatch(&self, task: &WorkflowTask, context: &mut Context) -> Result<()>;
}

/// Runs each step as written
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectDispatch;

impl TaskDispatch for DirectDispatch {
    fn dispatch(&self, task: &WorkflowTask, context: &mut Context) -> Result<()> {
        task.invoke(context)
    }
}

struct Override {
    name: &'static str,
    replacement: WorkflowTask,
    used: bool,
}

/// Replaces named steps with substitute behavior and tracks which ran
#[derive(Default)]
pub struct TaskOverrides {
    overrides: Mutex<Vec<Override>>,
}

impl TaskOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the step called `name` with `replacement`
    pub fn with<F>(mut self, name: &'static str, replacement: F) -> Self
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        if let Ok(overrides) = self.overrides.get_mut() {
            overrides.push(Override {
                name,
                replacement: WorkflowTask::new(name, replacement),
                used: false,
            });
        }
        self
    }

    /// Names of overrides that no step ever hit
    pub fn unused(&self) -> Vec<&'static str> {
        self.overrides
            .lock()
            .map(|overrides| overrides.iter().filter(|o| !o.used).map(|o| o.name).collect())
            .unwrap_or_default()
    }

    fn take_replacement(&self, name: &str) -> Option<WorkflowTask> {
        let mut overrides = self.overrides.lock().ok()?;
        let entry = overrides.iter_mut().find(|o| o.name == name)?;
        entry.used = true;
        Some(entry.replacement.clone())
    }
}

impl TaskDispatch for TaskOverrides {
    fn dispatch(&self, task: &WorkflowTask, context: &mut Context) -> Result<()> {
        // The lock is released before the replacement runs, so it may run nested steps
        match self.take_replacement(task.name()) {
            Some(replacement) => {
                debug!("Running override for task {}", task.name());
                replacement.invoke(context)
            }
            None => task.invoke(context),
        }
    }
}
