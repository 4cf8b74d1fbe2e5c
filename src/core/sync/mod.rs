/*!
 * Synchronization Support
 *
 * The runtime itself uses `parking_lot` mutexes and condvars directly. This
 * module adds lock-order instrumentation shared by the thread-safe allocators
 * and the GL-context lock.
 */

mod lock_order;

pub use lock_order::{LockEvent, LockEventKind, LockId, LockInversion, LockOrderLog};
