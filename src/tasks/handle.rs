/*!
 * Task Handles
 * One-shot result slots returned by `TaskPool::submit`
 */

use super::types::{TaskError, TaskResult};
use crate::core::types::TaskId;
use flume::{Receiver, RecvError, Sender, TryRecvError};

/// Result slot of one submitted task
///
/// Resolves exactly once: to the task's outcome, or to
/// `TaskError::Abandoned` if the pool dropped the task without running it.
#[derive(Debug)]
#[must_use = "dropping a TaskHandle discards the task outcome"]
pub struct TaskHandle {
    id: TaskId,
    rx: Receiver<TaskResult<()>>,
}

/// Sending half kept with the queued task
pub(super) type ResultSender = Sender<TaskResult<()>>;

impl TaskHandle {
    pub(super) fn channel(id: TaskId) -> (ResultSender, Self) {
        let (tx, rx) = flume::bounded(1);
        (tx, Self { id, rx })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Block until the task finished or was abandoned
    pub fn join(self) -> TaskResult<()> {
        match self.rx.recv() {
            Ok(outcome) => outcome,
            Err(RecvError::Disconnected) => Err(TaskError::Abandoned { task: self.id }),
        }
    }

    /// Outcome if already available
    pub fn try_join(&self) -> Option<TaskResult<()>> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(TaskError::Abandoned { task: self.id })),
        }
    }

    /// Whether `join` would return without blocking
    pub fn is_finished(&self) -> bool {
        !self.rx.is_empty() || self.rx.is_disconnected()
    }
}
