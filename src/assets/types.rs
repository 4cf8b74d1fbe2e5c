/*!
 * Asset Types
 * Load results and asset errors
 */

use crate::gl::{GlError, GlObjectId};
use crate::memory::MemoryError;
use crate::tasks::TaskError;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Asset operation result
pub type AssetResult<T> = Result<T, AssetError>;

/// Asset loading errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum AssetError {
    #[error("Failed to read {}: {message}", path.display())]
    #[diagnostic(code(assets::io))]
    Io { path: PathBuf, message: String },

    #[error("Unsupported asset {name}: {reason}")]
    #[diagnostic(
        code(assets::unsupported),
        help("Models must be .gltf files and textures must be .bmp files.")
    )]
    Unsupported { name: String, reason: String },

    #[error("Failed to decode {name}: {message}")]
    #[diagnostic(code(assets::decode))]
    Decode { name: String, message: String },

    #[error("Malformed glTF {name}: {message}")]
    #[diagnostic(code(assets::gltf))]
    Gltf { name: String, message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Gl(#[from] GlError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Task(#[from] TaskError),
}

impl AssetError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        AssetError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub(crate) fn unsupported(name: impl Into<String>, reason: impl Into<String>) -> Self {
        AssetError::Unsupported {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn gltf(name: impl Into<String>, message: impl Into<String>) -> Self {
        AssetError::Gltf {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Memory exhaustion and GL failures end the whole loading session
    pub fn is_fatal(&self) -> bool {
        match self {
            AssetError::Memory(err) => err.is_fatal(),
            AssetError::Gl(_) => true,
            AssetError::Task(err) => err.is_fatal(),
            _ => false,
        }
    }
}

/// Texture resident on the GL side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedTexture {
    pub id: GlObjectId,
    pub width: u32,
    pub height: u32,
}

/// Tally of one top-level glTF section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSummary {
    pub name: String,
    /// Number of entries in the section's array (0 when absent)
    pub count: usize,
    /// Size of the section's JSON kept in the model arena
    pub json_bytes: usize,
}

/// Model with its buffers and textures resident on the GL side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedModel {
    pub path: PathBuf,
    /// Sections in document order
    pub sections: Vec<SectionSummary>,
    pub buffers: Vec<GlObjectId>,
    /// One per glTF image, in image order
    pub textures: Vec<LoadedTexture>,
}

impl LoadedModel {
    pub fn section(&self, name: &str) -> Option<&SectionSummary> {
        self.sections.iter().find(|s| s.name == name)
    }
}

/// Per-asset outcomes of one `AssetLoader::load_all` call, in request order
#[derive(Debug, Default)]
pub struct LoadReport {
    pub textures: Vec<AssetResult<LoadedTexture>>,
    pub models: Vec<AssetResult<LoadedModel>>,
}

impl LoadReport {
    pub fn succeeded(&self) -> usize {
        self.textures.iter().filter(|r| r.is_ok()).count()
            + self.models.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.textures.len() + self.models.len() - self.succeeded()
    }

    /// First fatal error, if any
    pub fn fatal(&self) -> Option<&AssetError> {
        self.textures
            .iter()
            .filter_map(|r| r.as_ref().err())
            .chain(self.models.iter().filter_map(|r| r.as_ref().err()))
            .find(|e| e.is_fatal())
    }
}
