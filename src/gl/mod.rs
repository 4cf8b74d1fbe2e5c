/*!
 * GL Module
 *
 * One GL context shared across loading threads, serialized by [`GlLock`].
 * [`HeadlessContext`] implements the context in software for tests and the
 * command-line loader.
 */

mod context;
mod headless;
mod lock;
mod types;

pub use context::GlContext;
pub use headless::{BindViolation, GlCall, GlCallKind, HeadlessContext, TextureInfo};
pub use lock::{DetachedContext, GlGuard, GlLock};
pub use types::{BufferTarget, GlError, GlObjectId, GlResult, TextureDesc, WrapMode};
