/*!
 * Asset Loading
 *
 * Texture and glTF model loads: the producers of work for the task pool.
 * Every asset allocates from its own arena drawn from the allocator pool and
 * uploads to the GL context only while holding the GL lock.
 */

mod loader;
mod model;
mod texture;
mod types;

pub use loader::AssetLoader;
pub use model::{ModelRequest, GLTF_SECTIONS};
pub use texture::{load_texture, TextureRequest, TextureSource};
pub use types::{AssetError, AssetResult, LoadReport, LoadedModel, LoadedTexture, SectionSummary};
