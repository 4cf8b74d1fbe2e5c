/*!
 * Task Pool Module
 *
 * Fixed-size worker-thread pool used to parallelize asset loading. Every
 * submission returns a [`TaskHandle`] that resolves to the task's outcome.
 */

mod handle;
mod pool;
mod stats;
mod types;

pub use handle::TaskHandle;
pub use pool::TaskPool;
pub use types::{PoolState, TaskError, TaskResult, TaskStats};
