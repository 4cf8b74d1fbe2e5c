/*!
 * GL Context Abstraction
 *
 * The minimal surface the loaders need: binding the context to the calling
 * thread and creating the objects an asset load produces. Implementations
 * are called only while the [`GlLock`](super::GlLock) mutex is held.
 */

use super::types::{BufferTarget, GlObjectId, GlResult, TextureDesc};

/// One GL context shared by the owner thread and the loading workers
pub trait GlContext: Send + Sync {
    /// Bind the context to the calling thread
    fn make_current(&self) -> GlResult<()>;

    /// Unbind the context from the calling thread
    fn release_current(&self) -> GlResult<()>;

    /// Create a 2D RGBA8 texture and upload `pixels` (generates mipmaps)
    fn create_texture(&self, desc: &TextureDesc, pixels: &[u8]) -> GlResult<GlObjectId>;

    /// Create a buffer object and upload `data`
    fn create_buffer(&self, target: BufferTarget, data: &[u8]) -> GlResult<GlObjectId>;
}
