/*!
 * Task Pool
 *
 * Fixed set of worker threads consuming one FIFO queue.
 *
 * # Synchronization
 *
 * The queue, the `stopping` flag and every change of the active-task count
 * are guarded by one mutex. Two condvars hang off it: "work available" wakes
 * idle workers, "drained" wakes callers of `wait()` once the queue is empty
 * and no task is running. Tasks run outside the lock.
 *
 * # Shutdown
 *
 * `stop()` sets `stopping`, wakes every worker and joins them. A worker
 * finishes the task it is running but takes no new one, so tasks still
 * queued are dropped and their handles resolve to `TaskError::Abandoned`.
 * Dropping a running pool without `stop()` stops it and logs a warning.
 */

use super::handle::{ResultSender, TaskHandle};
use super::stats::AtomicTaskStats;
use super::types::{PoolState, TaskError, TaskResult, TaskStats};
use crate::core::config::RuntimeConfig;
use crate::core::limits::MAX_WORKER_THREADS;
use crate::core::types::TaskId;
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

type Job = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

struct Task {
    id: TaskId,
    job: Job,
    result: ResultSender,
}

struct Queue {
    tasks: VecDeque<Task>,
    stopping: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    work_available: Condvar,
    drained: Condvar,
    /// Modified only under the queue lock; read without it by `busy()`
    active: AtomicUsize,
    stats: AtomicTaskStats,
}

/// Worker-thread pool with submit/wait/stop lifecycle
pub struct TaskPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    worker_count: usize,
    state: PoolState,
    next_id: AtomicU64,
}

impl TaskPool {
    /// Create a pool of `workers` threads; none is spawned before `start()`
    pub fn new(workers: usize) -> TaskResult<Self> {
        if workers == 0 || workers > MAX_WORKER_THREADS {
            return Err(TaskError::InvalidWorkerCount {
                requested: workers,
                max: MAX_WORKER_THREADS,
            });
        }

        Ok(Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(Queue {
                    tasks: VecDeque::new(),
                    stopping: false,
                }),
                work_available: Condvar::new(),
                drained: Condvar::new(),
                active: AtomicUsize::new(0),
                stats: AtomicTaskStats::new(),
            }),
            workers: Vec::with_capacity(workers),
            worker_count: workers,
            state: PoolState::Created,
            next_id: AtomicU64::new(0),
        })
    }

    pub fn from_config(config: &RuntimeConfig) -> TaskResult<Self> {
        Self::new(config.workers)
    }

    /// Spawn the worker threads
    pub fn start(&mut self) -> TaskResult<()> {
        if self.state != PoolState::Created {
            return Err(TaskError::InvalidState {
                operation: "start",
                state: self.state,
            });
        }

        for index in 0..self.worker_count {
            let shared = Arc::clone(&self.shared);
            let spawned = thread::Builder::new()
                .name(format!("asset-worker-{index}"))
                .spawn(move || worker_loop(&shared, index));

            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(e) => {
                    warn!(worker = index, error = %e, "Worker spawn failed, stopping pool");
                    self.state = PoolState::Running;
                    self.shutdown();
                    return Err(TaskError::Spawn(e.to_string()));
                }
            }
        }

        self.state = PoolState::Running;
        info!(workers = self.worker_count, "Task pool started");
        Ok(())
    }

    /// Queue a task; it runs on the first idle worker
    pub fn submit<F>(&self, f: F) -> TaskResult<TaskHandle>
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (result, handle) = TaskHandle::channel(id);

        {
            let mut queue = self.shared.queue.lock();
            if queue.stopping {
                return Err(TaskError::Stopped);
            }
            queue.tasks.push_back(Task {
                id,
                job: Box::new(f),
                result,
            });
        }

        self.shared.stats.inc_submitted();
        self.shared.work_available.notify_one();
        trace!(task = id, "Task submitted");
        Ok(handle)
    }

    /// Block until the queue is empty and no task is running
    pub fn wait(&self) -> TaskResult<()> {
        let mut queue = self.shared.queue.lock();
        match self.state {
            PoolState::Created if !queue.tasks.is_empty() => {
                return Err(TaskError::InvalidState {
                    operation: "wait on queued work in",
                    state: self.state,
                });
            }
            PoolState::Running => {}
            _ => return Ok(()),
        }

        while !queue.tasks.is_empty() || self.shared.active.load(Ordering::SeqCst) > 0 {
            self.shared.drained.wait(&mut queue);
        }
        Ok(())
    }

    /// Stop all workers; returns the number of queued tasks abandoned
    pub fn stop(&mut self) -> TaskResult<usize> {
        match self.state {
            PoolState::Created | PoolState::Running => Ok(self.shutdown()),
            state => Err(TaskError::InvalidState {
                operation: "stop",
                state,
            }),
        }
    }

    fn shutdown(&mut self) -> usize {
        self.state = PoolState::Draining;
        self.shared.queue.lock().stopping = true;
        self.shared.work_available.notify_all();

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Worker thread terminated by panic");
            }
        }

        let abandoned: Vec<Task> = self.shared.queue.lock().tasks.drain(..).collect();
        let count = abandoned.len();
        for task in &abandoned {
            trace!(task = task.id, "Task abandoned");
        }
        drop(abandoned);

        self.shared.stats.add_abandoned(count as u64);
        self.state = PoolState::Joined;
        info!(abandoned = count, "Task pool stopped");
        count
    }

    /// Whether any task is queued or running
    pub fn busy(&self) -> bool {
        let queue = self.shared.queue.lock();
        !queue.tasks.is_empty() || self.shared.active.load(Ordering::SeqCst) > 0
    }

    pub fn state(&self) -> PoolState {
        self.state
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Tasks currently executing
    pub fn active(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    pub fn queued(&self) -> usize {
        self.shared.queue.lock().tasks.len()
    }

    pub fn stats(&self) -> TaskStats {
        self.shared.stats.snapshot()
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        if self.state == PoolState::Running {
            warn!(
                workers = self.worker_count,
                "TaskPool dropped without stop(), stopping now"
            );
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for TaskPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskPool")
            .field("state", &self.state)
            .field("workers", &self.worker_count)
            .field("active", &self.active())
            .finish()
    }
}

fn worker_loop(shared: &Shared, index: usize) {
    debug!(worker = index, "Worker started");

    loop {
        let task = {
            let mut queue = shared.queue.lock();
            while queue.tasks.is_empty() && !queue.stopping {
                shared.work_available.wait(&mut queue);
            }
            if queue.stopping {
                break;
            }
            let Some(task) = queue.tasks.pop_front() else {
                continue;
            };
            shared.active.fetch_add(1, Ordering::SeqCst);
            task
        };

        run_task(shared, task);

        let queue = shared.queue.lock();
        let still_active = shared.active.fetch_sub(1, Ordering::SeqCst) - 1;
        if still_active == 0 && queue.tasks.is_empty() {
            shared.drained.notify_all();
        }
    }

    debug!(worker = index, "Worker exiting");
}

fn run_task(shared: &Shared, task: Task) {
    let Task { id, job, result } = task;

    let outcome = match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(Ok(())) => {
            shared.stats.inc_completed();
            Ok(())
        }
        Ok(Err(e)) => {
            shared.stats.inc_failed();
            let message = format!("{e:#}");
            warn!(task = id, error = %message, "Task failed");
            Err(TaskError::Failed { task: id, message })
        }
        Err(payload) => {
            shared.stats.inc_panicked();
            let message = panic_message(payload.as_ref());
            warn!(task = id, panic = %message, "Task panicked");
            Err(TaskError::Panicked { task: id, message })
        }
    };

    // The caller may have dropped the handle
    let _ = result.send(outcome);
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
