/*!
 * Asset Loader Session Tests
 * Real BMP and glTF files on disk, loaded through one parallel session
 */

use asset_runtime::assets::{AssetError, AssetLoader, ModelRequest, TextureRequest};
use asset_runtime::gl::{GlCallKind, GlContext, GlLock, HeadlessContext};
use asset_runtime::memory::MemoryError;
use asset_runtime::RuntimeConfig;
use image::{ImageFormat, Rgba, RgbaImage};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

fn write_bmp(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let image = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 128, 255]));
    image.save_with_format(&path, ImageFormat::Bmp).unwrap();
    path
}

fn write_model(dir: &Path) -> PathBuf {
    write_bmp(dir, "skin.bmp", 8, 8);
    write_bmp(dir, "detail.bmp", 2, 4);
    std::fs::write(dir.join("model.bin"), vec![0xAB; 64]).unwrap();

    let document = json!({
        "asset": { "version": "2.0" },
        "scenes": [{ "nodes": [0] }],
        "nodes": [{ "mesh": 0 }, { "mesh": 1 }, {}],
        "meshes": [{ "primitives": [] }, { "primitives": [] }],
        "buffers": [{ "uri": "model.bin", "byteLength": 48 }],
        "bufferViews": [{ "buffer": 0, "byteLength": 48 }],
        "images": [{ "uri": "skin.bmp" }, { "uri": "detail.bmp" }],
        "textures": [{ "source": 0 }, { "source": 1 }],
    });
    let path = dir.join("model.gltf");
    std::fs::write(&path, serde_json::to_vec_pretty(&document).unwrap()).unwrap();
    path
}

fn loader(config: RuntimeConfig) -> (Arc<HeadlessContext>, AssetLoader) {
    let ctx = Arc::new(HeadlessContext::new());
    let gl = GlLock::new(Arc::clone(&ctx) as Arc<dyn GlContext>);
    gl.attach_owner().unwrap();
    (ctx, AssetLoader::new(config, gl))
}

#[test]
fn test_session_loads_textures_and_models() {
    let dir = TempDir::new().unwrap();
    let textures = vec![
        TextureRequest::from_path(write_bmp(dir.path(), "a.bmp", 4, 4)),
        TextureRequest::from_path(write_bmp(dir.path(), "b.bmp", 16, 2)),
        TextureRequest::from_path(write_bmp(dir.path(), "c.bmp", 64, 64)),
    ];
    let models = vec![ModelRequest::new(write_model(dir.path()))];

    let (ctx, loader) = loader(RuntimeConfig::low_memory());
    let report = loader.load_all(textures, models).unwrap();

    assert_eq!(report.failed(), 0);
    let sizes: Vec<_> = report
        .textures
        .iter()
        .map(|t| t.as_ref().map(|t| (t.width, t.height)).unwrap())
        .collect();
    assert_eq!(sizes, vec![(4, 4), (16, 2), (64, 64)]);

    let model = report.models[0].as_ref().unwrap();
    assert_eq!(model.section("meshes").unwrap().count, 2);
    assert_eq!(model.section("nodes").unwrap().count, 3);
    assert_eq!(model.section("accessors").unwrap().count, 0);
    assert_eq!(model.buffers.len(), 1);
    assert_eq!(ctx.buffer_len(model.buffers[0]), Some(48));
    let image_sizes: Vec<_> = model.textures.iter().map(|t| (t.width, t.height)).collect();
    assert_eq!(image_sizes, vec![(8, 8), (2, 4)]);

    assert_eq!(ctx.texture_count(), 5);
    assert!(ctx.violations().is_empty());
    assert!(ctx.spans_are_serialized());
    assert_eq!(ctx.bound_thread(), Some(thread::current().id()));
    // One arena per texture, per model and per model image
    assert_eq!(loader.pool().len(), 6);
}

#[test]
fn test_bad_assets_fail_individually() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"not an image").unwrap();
    std::fs::write(dir.path().join("fake.bmp"), b"BM but not really").unwrap();
    let textures = vec![
        TextureRequest::from_path(write_bmp(dir.path(), "ok.bmp", 3, 3)),
        TextureRequest::from_path(dir.path().join("notes.txt")),
        TextureRequest::from_path(dir.path().join("missing.bmp")),
        TextureRequest::from_path(dir.path().join("fake.bmp")),
    ];
    let models = vec![ModelRequest::new(dir.path().join("missing.gltf"))];

    let (ctx, loader) = loader(RuntimeConfig::low_memory());
    let report = loader.load_all(textures, models).unwrap();

    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failed(), 4);
    assert!(report.fatal().is_none());
    assert!(matches!(report.textures[1], Err(AssetError::Unsupported { .. })));
    assert!(matches!(report.textures[2], Err(AssetError::Io { .. })));
    assert!(matches!(report.textures[3], Err(AssetError::Decode { .. })));
    assert!(matches!(report.models[0], Err(AssetError::Io { .. })));

    assert_eq!(ctx.texture_count(), 1);
    assert_eq!(ctx.bound_thread(), Some(thread::current().id()));
}

#[test]
fn test_embedded_buffers_are_unsupported() {
    let dir = TempDir::new().unwrap();
    let document = json!({
        "buffers": [{ "uri": "data:application/octet-stream;base64,AAAA", "byteLength": 3 }],
    });
    let path = dir.path().join("inline.gltf");
    std::fs::write(&path, serde_json::to_vec(&document).unwrap()).unwrap();

    let (_ctx, loader) = loader(RuntimeConfig::low_memory());
    let report = loader.load_all(Vec::new(), vec![ModelRequest::new(path)]).unwrap();
    assert!(matches!(report.models[0], Err(AssetError::Unsupported { .. })));
}

#[test]
fn test_pool_exhaustion_is_fatal() {
    let dir = TempDir::new().unwrap();
    let textures = (0..3)
        .map(|i| TextureRequest::from_path(write_bmp(dir.path(), &format!("t{i}.bmp"), 2, 2)))
        .collect();

    let (_ctx, loader) = loader(RuntimeConfig::low_memory().with_pool_capacity(2));
    let report = loader.load_all(textures, Vec::new()).unwrap();

    assert_eq!(report.succeeded(), 2);
    assert_eq!(
        report.fatal(),
        Some(&AssetError::Memory(MemoryError::PoolExhausted { capacity: 2 }))
    );
}

#[test]
fn test_texture_from_memory() {
    let mut encoded = std::io::Cursor::new(Vec::new());
    RgbaImage::from_pixel(5, 3, Rgba([9, 9, 9, 255]))
        .write_to(&mut encoded, ImageFormat::Bmp)
        .unwrap();

    let (ctx, loader) = loader(RuntimeConfig::single_threaded());
    let texture = loader
        .load_texture(&TextureRequest::from_bytes("inline", encoded.into_inner()))
        .unwrap();

    assert_eq!((texture.width, texture.height), (5, 3));
    assert_eq!(ctx.texture(texture.id).map(|t| t.width), Some(5));
    assert_eq!(ctx.bound_thread(), Some(thread::current().id()));
    assert!(ctx.spans_are_serialized());
    assert!(ctx.violations().is_empty());
}

#[test]
fn test_single_loads_keep_owner_bound() {
    let dir = TempDir::new().unwrap();
    let model_path = write_model(dir.path());
    let texture_path = write_bmp(dir.path(), "single.bmp", 6, 2);

    let config = RuntimeConfig::default().with_workers(2).with_scratch_size(16);
    let (ctx, loader) = loader(config);
    let owner = thread::current().id();

    let model = loader.load_model(&ModelRequest::new(model_path)).unwrap();
    assert_eq!(model.textures.len(), 2);
    assert_eq!(model.section("nodes").unwrap().count, 3);
    assert_eq!(ctx.bound_thread(), Some(owner));

    let texture = loader
        .load_texture(&TextureRequest::from_path(texture_path))
        .unwrap();
    assert_eq!((texture.width, texture.height), (6, 2));
    assert_eq!(ctx.bound_thread(), Some(owner));

    // Model image uploads happened on the nested pool's workers
    let uploaders: Vec<_> = ctx
        .calls()
        .into_iter()
        .filter(|call| matches!(call.kind, GlCallKind::CreateTexture { .. }))
        .map(|call| call.thread)
        .collect();
    assert_eq!(uploaders.len(), 3);
    assert!(uploaders[..2].iter().all(|thread| *thread != owner));

    assert!(ctx.violations().is_empty());
    assert!(ctx.spans_are_serialized());
}

#[test]
fn test_failed_single_load_still_reattaches() {
    let (ctx, loader) = loader(RuntimeConfig::single_threaded());
    let err = loader
        .load_texture(&TextureRequest::from_path("missing.bmp"))
        .unwrap_err();

    assert!(matches!(err, AssetError::Io { .. }));
    assert_eq!(ctx.bound_thread(), Some(thread::current().id()));
    assert!(ctx.violations().is_empty());
}
