/*!
 * glTF Model Loading
 *
 * 1. The `.gltf` document is read into the model's arena and parsed.
 * 2. Its top-level sections are tallied in parallel on a nested task pool;
 *    each task keeps its section's JSON in a shared scratch arena.
 * 3. Every referenced binary buffer is read into the model's arena and
 *    uploaded under the GL lock.
 * 4. Referenced `.bmp` images load in parallel on a second nested pool,
 *    each into its own arena drawn from the allocator pool.
 */

use super::texture::{has_extension, load_texture, read_file_into, TextureRequest};
use super::types::{AssetError, AssetResult, LoadedModel, LoadedTexture, SectionSummary};
use crate::gl::{BufferTarget, GlLock, GlObjectId};
use crate::memory::{AllocatorPool, Arena, ByteView, SharedAllocator, ThreadSafeArena};
use crate::tasks::{TaskError, TaskPool};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Top-level glTF sections, in the order they are reported
pub const GLTF_SECTIONS: [&str; 9] = [
    "scenes",
    "buffers",
    "bufferViews",
    "accessors",
    "meshes",
    "textures",
    "materials",
    "images",
    "nodes",
];

/// One model to load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    pub path: PathBuf,
}

impl ModelRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GltfBuffer {
    uri: Option<String>,
    byte_length: usize,
}

#[derive(Debug, Deserialize)]
struct GltfImage {
    uri: Option<String>,
}

/// Shared inputs of a model load
pub(crate) struct ModelContext<'a> {
    pub pool: &'a Arc<AllocatorPool<Arena>>,
    pub gl: &'a GlLock,
    pub texture_arena_size: usize,
    pub scratch_size: usize,
    pub workers: usize,
}

/// Load a glTF model using `arena` for the document and its buffers
pub(crate) fn load_model(
    request: &ModelRequest,
    arena: &mut Arena,
    ctx: &ModelContext<'_>,
) -> AssetResult<LoadedModel> {
    let path = &request.path;
    let name = path.display().to_string();
    if !has_extension(path, "gltf") {
        return Err(AssetError::unsupported(name, "model is not a .gltf file"));
    }

    let document = read_file_into(arena, path)?;
    let root: Value = serde_json::from_slice(arena.bytes(document)?)
        .map_err(|e| AssetError::gltf(&name, e.to_string()))?;
    if !root.is_object() {
        return Err(AssetError::gltf(&name, "document root is not an object"));
    }
    let root = Arc::new(root);

    let sections = tally_sections(&root, &name, ctx.scratch_size)?;
    let buffers = upload_buffers(&root, path, arena, ctx.gl)?;
    let textures = load_images(&root, path, ctx)?;

    info!(
        model = %name,
        buffers = buffers.len(),
        textures = textures.len(),
        "Model loaded"
    );
    Ok(LoadedModel {
        path: path.clone(),
        sections,
        buffers,
        textures,
    })
}

/// Count every top-level section in parallel
///
/// The section JSON is kept in a scratch arena starting at `scratch_size`
/// bytes, which grows if the sections need more.
fn tally_sections(
    root: &Arc<Value>,
    name: &str,
    scratch_size: usize,
) -> AssetResult<Vec<SectionSummary>> {
    let scratch = Arc::new(ThreadSafeArena::with_capacity(scratch_size)?);

    let jobs: Vec<_> = GLTF_SECTIONS
        .iter()
        .map(|&section| {
            let root = Arc::clone(root);
            let scratch = Arc::clone(&scratch);
            let name = name.to_string();
            move || -> AssetResult<SectionSummary> {
                let value = root.get(section).unwrap_or(&Value::Null);
                let count = value.as_array().map_or(0, Vec::len);
                let json = serde_json::to_vec(value)
                    .map_err(|e| AssetError::gltf(&name, format!("{section}: {e}")))?;
                let stored = scratch.alloc(json.len(), 1)?;
                scratch.write(stored, &json)?;

                Ok(SectionSummary {
                    name: section.to_string(),
                    count,
                    json_bytes: json.len(),
                })
            }
        })
        .collect();

    let summaries = run_parallel(GLTF_SECTIONS.len(), jobs)?;
    debug!(
        model = name,
        kept_bytes = scratch.with(|arena| arena.stats().used_bytes),
        "Sections tallied"
    );
    Ok(summaries)
}

/// Read each binary buffer into the model arena and upload it
fn upload_buffers(
    root: &Value,
    path: &Path,
    arena: &mut Arena,
    gl: &GlLock,
) -> AssetResult<Vec<GlObjectId>> {
    let name = path.display().to_string();
    let buffers: Vec<GltfBuffer> = section(root, "buffers", &name)?;

    let mut ids = Vec::with_capacity(buffers.len());
    for (index, buffer) in buffers.iter().enumerate() {
        let uri = buffer
            .uri
            .as_deref()
            .ok_or_else(|| AssetError::gltf(&name, format!("buffer {index} has no uri")))?;
        if uri.starts_with("data:") {
            return Err(AssetError::unsupported(&name, "embedded data: buffers"));
        }

        let bin_path = sibling(path, uri);
        let data = read_file_into(arena, &bin_path)?;
        let bytes = arena.bytes(data)?;
        if bytes.len() < buffer.byte_length {
            return Err(AssetError::gltf(
                &name,
                format!(
                    "buffer {index} declares {} bytes but {} holds {}",
                    buffer.byte_length,
                    bin_path.display(),
                    bytes.len()
                ),
            ));
        }

        let guard = gl.lock()?;
        ids.push(guard.create_buffer(BufferTarget::Array, &bytes[..buffer.byte_length])?);
    }
    Ok(ids)
}

/// Load every referenced image as a texture, in parallel
fn load_images(root: &Value, path: &Path, ctx: &ModelContext<'_>) -> AssetResult<Vec<LoadedTexture>> {
    let name = path.display().to_string();
    let images: Vec<GltfImage> = section(root, "images", &name)?;
    if images.is_empty() {
        return Ok(Vec::new());
    }

    let mut requests = Vec::with_capacity(images.len());
    for (index, image) in images.iter().enumerate() {
        let uri = image
            .uri
            .as_deref()
            .ok_or_else(|| AssetError::gltf(&name, format!("image {index} has no uri")))?;
        if !uri.to_ascii_lowercase().ends_with(".bmp") {
            return Err(AssetError::unsupported(uri, "only .bmp textures are supported"));
        }
        requests.push(TextureRequest::from_path(sibling(path, uri)).flipped(true));
    }

    let jobs: Vec<_> = requests
        .into_iter()
        .map(|request| {
            let pool = Arc::clone(ctx.pool);
            let gl = ctx.gl.clone();
            let size = ctx.texture_arena_size;
            move || -> AssetResult<LoadedTexture> {
                let slot = pool.get(size)?;
                let mut arena = slot.lock();
                load_texture(&request, &mut *arena, &gl)
            }
        })
        .collect();

    run_parallel(ctx.workers, jobs)
}

/// Run `jobs` on a nested task pool, returning their results in job order
///
/// The first failed job fails the whole batch; a job that panicked is
/// reported as the task error its handle resolved to.
fn run_parallel<T, F>(workers: usize, jobs: Vec<F>) -> AssetResult<Vec<T>>
where
    T: Send + 'static,
    F: FnOnce() -> AssetResult<T> + Send + 'static,
{
    if jobs.is_empty() {
        return Ok(Vec::new());
    }

    let slots: Arc<Mutex<Vec<Option<AssetResult<T>>>>> =
        Arc::new(Mutex::new((0..jobs.len()).map(|_| None).collect()));
    let mut pool = TaskPool::new(workers.clamp(1, jobs.len()))?;
    pool.start()?;

    let mut handles = Vec::with_capacity(jobs.len());
    for (index, job) in jobs.into_iter().enumerate() {
        let slots = Arc::clone(&slots);
        handles.push(pool.submit(move || {
            let outcome = job();
            let failure = outcome.as_ref().err().cloned();
            slots.lock()[index] = Some(outcome);
            match failure {
                Some(err) => Err(err.into()),
                None => Ok(()),
            }
        })?);
    }

    pool.wait()?;
    pool.stop()?;

    let outcomes = std::mem::take(&mut *slots.lock());
    handles
        .into_iter()
        .zip(outcomes)
        .map(|(handle, outcome)| match outcome {
            Some(result) => result,
            None => {
                let task = handle.id();
                let err = handle.join().err().unwrap_or(TaskError::Abandoned { task });
                Err(AssetError::Task(err))
            }
        })
        .collect()
}

fn section<T: for<'de> Deserialize<'de>>(root: &Value, key: &str, name: &str) -> AssetResult<Vec<T>> {
    match root.get(key) {
        None => Ok(Vec::new()),
        Some(value) => Vec::<T>::deserialize(value)
            .map_err(|e| AssetError::gltf(name, format!("{key}: {e}"))),
    }
}

/// Resolve a glTF-relative uri against the document path
fn sibling(document: &Path, uri: &str) -> PathBuf {
    match document.parent() {
        Some(dir) => dir.join(uri),
        None => PathBuf::from(uri),
    }
}
