/*!
 * GL-Context Lock
 *
 * Serializes use of one GL context across threads. A [`GlGuard`] is only
 * handed out after (a) the mutex is acquired and (b) the context is bound to
 * the calling thread. Dropping it (d) unbinds the context and then (e)
 * releases the mutex, also while unwinding.
 *
 * # Owner hand-off
 *
 * The owner thread normally keeps the context bound. Before workers start
 * uploading it calls [`GlLock::detach_owner`], and after `TaskPool::wait`
 * it binds the context again through [`DetachedContext::reattach`].
 */

use super::context::GlContext;
use super::types::GlResult;
use crate::core::sync::{LockId, LockOrderLog};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use tracing::{debug, error, warn};

struct GlShared {
    mutex: Mutex<()>,
    context: Arc<dyn GlContext>,
    order: Option<(Arc<LockOrderLog>, LockId)>,
}

impl GlShared {
    fn acquire(&self) -> MutexGuard<'_, ()> {
        let guard = self.mutex.lock();
        if let Some((log, id)) = &self.order {
            log.acquired(*id);
        }
        guard
    }

    fn release(&self, guard: MutexGuard<'_, ()>) {
        if let Some((log, id)) = &self.order {
            log.released(*id);
        }
        drop(guard);
    }
}

/// Cloneable handle to the shared GL context lock
#[derive(Clone)]
pub struct GlLock {
    shared: Arc<GlShared>,
}

impl GlLock {
    pub fn new(context: Arc<dyn GlContext>) -> Self {
        Self {
            shared: Arc::new(GlShared {
                mutex: Mutex::new(()),
                context,
                order: None,
            }),
        }
    }

    /// Create a lock that reports acquire/release events to `log` under `name`
    pub fn with_lock_order(context: Arc<dyn GlContext>, log: Arc<LockOrderLog>, name: &str) -> Self {
        let id = log.register(name);
        Self {
            shared: Arc::new(GlShared {
                mutex: Mutex::new(()),
                context,
                order: Some((log, id)),
            }),
        }
    }

    /// Acquire the lock and bind the context to the calling thread
    pub fn lock(&self) -> GlResult<GlGuard<'_>> {
        let guard = self.shared.acquire();
        if let Err(e) = self.shared.context.make_current() {
            error!(error = %e, "Failed to bind GL context");
            self.shared.release(guard);
            return Err(e);
        }
        Ok(GlGuard {
            shared: self.shared.as_ref(),
            guard: Some(guard),
        })
    }

    /// Run `f` with the context bound, unbinding before the lock is released
    pub fn with_context<R>(&self, f: impl FnOnce(&dyn GlContext) -> R) -> GlResult<R> {
        let guard = self.lock()?;
        Ok(f(guard.context()))
    }

    /// Bind the context to the calling thread and keep it bound after unlocking
    ///
    /// Used by the owner thread at startup and when reattaching.
    pub fn attach_owner(&self) -> GlResult<()> {
        let guard = self.shared.acquire();
        let bound = self.shared.context.make_current();
        self.shared.release(guard);
        if bound.is_ok() {
            debug!("GL context attached to owner thread");
        }
        bound
    }

    /// Unbind the owner's context so worker threads can bind it
    pub fn detach_owner(&self) -> GlResult<DetachedContext> {
        let guard = self.shared.acquire();
        let released = self.shared.context.release_current();
        self.shared.release(guard);
        released?;

        debug!("GL context detached from owner thread");
        Ok(DetachedContext {
            lock: self.clone(),
            reattached: false,
        })
    }

    /// Lock id in the attached lock-order log, if any
    pub fn lock_id(&self) -> Option<LockId> {
        self.shared.order.as_ref().map(|(_, id)| *id)
    }

    /// Whether another thread currently holds the lock
    pub fn is_locked(&self) -> bool {
        self.shared.mutex.is_locked()
    }
}

impl std::fmt::Debug for GlLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlLock")
            .field("locked", &self.is_locked())
            .field("lock_id", &self.lock_id())
            .finish()
    }
}

/// Exclusive, bound access to the GL context
#[must_use = "the context is unbound as soon as the guard is dropped"]
pub struct GlGuard<'a> {
    shared: &'a GlShared,
    guard: Option<MutexGuard<'a, ()>>,
}

impl GlGuard<'_> {
    pub fn context(&self) -> &(dyn GlContext + 'static) {
        self.shared.context.as_ref()
    }
}

impl std::ops::Deref for GlGuard<'_> {
    type Target = dyn GlContext;

    fn deref(&self) -> &Self::Target {
        self.context()
    }
}

impl Drop for GlGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.shared.context.release_current() {
            error!(error = %e, "Failed to unbind GL context");
        }
        if let Some(guard) = self.guard.take() {
            self.shared.release(guard);
        }
    }
}

/// Token for an owner context unbound by [`GlLock::detach_owner`]
#[must_use = "call reattach() once the workers are done"]
pub struct DetachedContext {
    lock: GlLock,
    reattached: bool,
}

impl DetachedContext {
    /// Bind the context to the calling thread again
    pub fn reattach(mut self) -> GlResult<()> {
        self.reattached = true;
        self.lock.attach_owner()
    }
}

impl Drop for DetachedContext {
    fn drop(&mut self) {
        if !self.reattached {
            warn!("DetachedContext dropped without reattach(), rebinding now");
            if let Err(e) = self.lock.attach_owner() {
                error!(error = %e, "Failed to rebind owner GL context");
            }
        }
    }
}

impl std::fmt::Debug for DetachedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetachedContext")
            .field("reattached", &self.reattached)
            .finish()
    }
}
