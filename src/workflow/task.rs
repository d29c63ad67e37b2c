// src/workflow/task.rs

//! Pipeline steps

use super::context::Context;
use crate::error::Result;
use std::fmt;
use std::sync::Arc;

type TaskFn = dyn Fn(&mut Context) -> Result<()> + Send + Sync;

/// A named pipeline step
///
/// The name is the step's identity: overrides and logs refer to it.
#[derive(Clone)]
pub struct WorkflowTask {
    name: &'static str,
    run: Arc<TaskFn>,
}

impl WorkflowTask {
    pub fn new<F>(name: &'static str, run: F) -> Self
    where
        F: Fn(&mut Context) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            name,
            run: Arc::new(run),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Run the step body directly, bypassing dispatch
    pub fn invoke(&self, context: &mut Context) -> Result<()> {
        (self.run)(context)
    }
}

impl PartialEq for WorkflowTask {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for WorkflowTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("WorkflowTask").field(&self.name).finish()
    }
}

/// Ordered steps run against one context
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    tasks: Vec<WorkflowTask>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, task: WorkflowTask) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn tasks(&self) -> &[WorkflowTask] {
        &self.tasks
    }

    /// Run the steps in order, stopping once the context is terminated
    ///
    /// An `Err` from any step aborts the run and is returned as is.
    pub fn execute(&self, context: &mut Context) -> Result<()> {
        for task in &self.tasks {
            if context.is_terminated() {
                break;
            }
            context.execute(task)?;
        }
        Ok(())
    }
}
