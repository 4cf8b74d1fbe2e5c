/*!
 * Task Types
 * Pool lifecycle states and task errors
 */

use crate::core::types::TaskId;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Task operation result
pub type TaskResult<T> = Result<T, TaskError>;

/// Task pool lifecycle
///
/// Created → Running → Draining → Joined. A pool never leaves Joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    /// Constructed; tasks may be queued but no worker runs them
    Created,
    /// Workers are consuming the queue
    Running,
    /// `stop()` has begun; workers are finishing their current task
    Draining,
    /// All workers joined
    Joined,
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoolState::Created => "created",
            PoolState::Running => "running",
            PoolState::Draining => "draining",
            PoolState::Joined => "joined",
        };
        f.write_str(name)
    }
}

/// Task pool errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum TaskError {
    #[error("Cannot {operation} a task pool in state {state}")]
    #[diagnostic(
        code(tasks::invalid_state),
        help("start() once, wait() only on a running pool, stop() once.")
    )]
    InvalidState {
        operation: &'static str,
        state: PoolState,
    },

    #[error("Task pool is stopping; submission rejected")]
    #[diagnostic(code(tasks::stopped))]
    Stopped,

    #[error("Task pool needs between 1 and {max} workers, got {requested}")]
    #[diagnostic(code(tasks::invalid_worker_count))]
    InvalidWorkerCount { requested: usize, max: usize },

    #[error("Failed to spawn worker thread: {0}")]
    #[diagnostic(
        code(tasks::spawn_failed),
        help("The system refused a new thread. Lower the worker count.")
    )]
    Spawn(String),

    #[error("Task {task} failed: {message}")]
    #[diagnostic(code(tasks::failed))]
    Failed { task: TaskId, message: String },

    #[error("Task {task} panicked: {message}")]
    #[diagnostic(code(tasks::panicked))]
    Panicked { task: TaskId, message: String },

    #[error("Task {task} was abandoned before it ran")]
    #[diagnostic(
        code(tasks::abandoned),
        help("stop() drops queued tasks; call wait() first to run them.")
    )]
    Abandoned { task: TaskId },
}

impl TaskError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, TaskError::Spawn(_))
    }

    /// Id of the task this error belongs to, if any
    pub fn task(&self) -> Option<TaskId> {
        match self {
            TaskError::Failed { task, .. }
            | TaskError::Panicked { task, .. }
            | TaskError::Abandoned { task } => Some(*task),
            _ => None,
        }
    }
}

/// Snapshot of task pool statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    pub submitted: u64,
    pub completed: u64,
    pub failed: u64,
    pub panicked: u64,
    pub abandoned: u64,
}

impl TaskStats {
    /// Tasks that reached a final outcome
    pub fn finished(&self) -> u64 {
        self.completed + self.failed + self.panicked + self.abandoned
    }
}
