/*!
 * GL Types
 * Object ids, upload descriptors and GL errors
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// GL operation result
pub type GlResult<T> = Result<T, GlError>;

/// GL errors; all of them end the load that hit them
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum GlError {
    #[error("GL context lost: {0}")]
    #[diagnostic(
        code(gl::context_lost),
        help("The context cannot be made current any more. Recreate the window surface.")
    )]
    ContextLost(String),

    #[error("{operation} called on a thread where the context is not current")]
    #[diagnostic(
        code(gl::not_current),
        help("Issue GL calls only through a GlGuard from GlLock::lock().")
    )]
    NotCurrent { operation: &'static str },

    #[error("Invalid upload: {0}")]
    #[diagnostic(code(gl::invalid_upload))]
    InvalidUpload(String),
}

/// Name of a GL object (texture or buffer)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GlObjectId(pub u32);

impl fmt::Display for GlObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gl#{}", self.0)
    }
}

/// Texture wrap mode applied to both axes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapMode {
    #[default]
    Repeat,
    MirroredRepeat,
    ClampToEdge,
}

/// Buffer binding target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferTarget {
    Array,
    ElementArray,
}

/// RGBA8 texture upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub wrap: WrapMode,
}

impl TextureDesc {
    /// Bytes of tightly packed RGBA8 pixel data
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}
