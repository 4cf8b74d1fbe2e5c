/*!
 * Texture Loading
 *
 * A texture load reads the BMP file into the asset's arena, decodes it into
 * RGBA8 pixels kept in the same arena, and uploads them while holding the
 * GL lock. Only the upload touches the GL context.
 */

use super::types::{AssetError, AssetResult, LoadedTexture};
use crate::gl::{GlLock, TextureDesc, WrapMode};
use crate::memory::{Allocation, Allocator, ByteView};
use image::{imageops, ImageFormat};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Where the encoded bitmap comes from
#[derive(Debug, Clone)]
pub enum TextureSource {
    Path(PathBuf),
    /// Encoded bytes with a display name for diagnostics
    Bytes { name: String, data: Arc<[u8]> },
}

/// One texture to load
#[derive(Debug, Clone)]
pub struct TextureRequest {
    pub source: TextureSource,
    /// Flip rows so the first row is the bottom of the image, as GL expects
    pub flip_vertically: bool,
    pub wrap: WrapMode,
}

impl TextureRequest {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            source: TextureSource::Path(path.into()),
            flip_vertically: false,
            wrap: WrapMode::default(),
        }
    }

    pub fn from_bytes(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            source: TextureSource::Bytes {
                name: name.into(),
                data: data.into(),
            },
            flip_vertically: false,
            wrap: WrapMode::default(),
        }
    }

    pub fn flipped(mut self, flip: bool) -> Self {
        self.flip_vertically = flip;
        self
    }

    pub fn with_wrap(mut self, wrap: WrapMode) -> Self {
        self.wrap = wrap;
        self
    }

    /// Name used in logs and errors
    pub fn name(&self) -> String {
        match &self.source {
            TextureSource::Path(path) => path.display().to_string(),
            TextureSource::Bytes { name, .. } => name.clone(),
        }
    }
}

/// Load `request` through `arena` and upload it under `gl`
pub fn load_texture<A>(request: &TextureRequest, arena: &mut A, gl: &GlLock) -> AssetResult<LoadedTexture>
where
    A: Allocator + ByteView,
{
    let name = request.name();
    let encoded = match &request.source {
        TextureSource::Path(path) => {
            if !has_extension(path, "bmp") {
                return Err(AssetError::unsupported(name, "texture is not a .bmp file"));
            }
            read_file_into(arena, path)?
        }
        TextureSource::Bytes { data, .. } => arena.alloc_copy(data)?,
    };

    let (pixels, width, height) = decode_bmp(arena, encoded, &name, request.flip_vertically)?;

    let desc = TextureDesc {
        width,
        height,
        wrap: request.wrap,
    };
    let id = {
        let data = arena.bytes(pixels)?;
        let guard = gl.lock()?;
        guard.create_texture(&desc, data)?
    };

    debug!(texture = %name, %id, width, height, "Texture uploaded");
    Ok(LoadedTexture { id, width, height })
}

/// Decode the bitmap held in `encoded` into RGBA8 pixels stored in `arena`
fn decode_bmp<A>(
    arena: &mut A,
    encoded: Allocation,
    name: &str,
    flip: bool,
) -> AssetResult<(Allocation, u32, u32)>
where
    A: Allocator + ByteView,
{
    let image = image::load_from_memory_with_format(arena.bytes(encoded)?, ImageFormat::Bmp)
        .map_err(|e| AssetError::Decode {
            name: name.to_string(),
            message: e.to_string(),
        })?;

    let mut rgba = image.into_rgba8();
    if flip {
        imageops::flip_vertical_in_place(&mut rgba);
    }
    let (width, height) = rgba.dimensions();

    let pixels = arena.alloc(rgba.as_raw().len(), 1)?;
    arena.bytes_mut(pixels)?.copy_from_slice(rgba.as_raw());
    Ok((pixels, width, height))
}

/// Read a whole file into a fresh allocation of exactly its length
pub(crate) fn read_file_into<A>(arena: &mut A, path: &Path) -> AssetResult<Allocation>
where
    A: Allocator + ByteView,
{
    let mut file = File::open(path).map_err(|e| AssetError::io(path, e))?;
    let len = file.metadata().map_err(|e| AssetError::io(path, e))?.len();
    let len = usize::try_from(len)
        .map_err(|_| AssetError::unsupported(path.display().to_string(), "file too large"))?;

    let allocation = arena.alloc(len, 1)?;
    file.read_exact(arena.bytes_mut(allocation)?)
        .map_err(|e| AssetError::io(path, e))?;
    Ok(allocation)
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case(extension))
}
