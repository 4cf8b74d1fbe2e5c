/*!
 * Asset Runtime - Command-Line Loader
 *
 * Loads every `.bmp` and `.gltf` path given on the command line through a
 * headless GL context and prints a summary per asset.
 */

use asset_runtime::{
    init_tracing, AssetLoader, GlLock, HeadlessContext, ModelRequest, RuntimeConfig,
    TextureRequest,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[cfg(all(feature = "jemalloc", not(target_env = "msvc")))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "asset-runtime failed");
            eprintln!("{e:?}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> miette::Result<ExitCode> {
    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("usage: asset-runtime [PATH...]  (.bmp textures, .gltf models)");
        return Ok(ExitCode::from(2));
    }

    let config = RuntimeConfig::from_env()?;
    info!(
        workers = config.workers,
        pool_capacity = config.pool_capacity,
        arena_size = config.arena_size,
        "asset-runtime starting"
    );

    let context = Arc::new(HeadlessContext::new());
    let gl = GlLock::new(context.clone());
    gl.attach_owner()?;

    let mut textures = Vec::new();
    let mut models = Vec::new();
    for path in paths {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("gltf") => models.push(ModelRequest::new(path)),
            Some(ext) if ext.eq_ignore_ascii_case("bmp") => {
                textures.push(TextureRequest::from_path(path).flipped(true))
            }
            _ => warn!(path = %path.display(), "Skipping path with unsupported extension"),
        }
    }

    let loader = AssetLoader::new(config, gl);
    let report = loader.load_all(textures, models)?;

    for texture in &report.textures {
        match texture {
            Ok(t) => println!("texture {}: {}x{}", t.id, t.width, t.height),
            Err(e) => println!("texture failed: {e}"),
        }
    }
    for model in &report.models {
        match model {
            Ok(m) => {
                let counts: Vec<String> = m
                    .sections
                    .iter()
                    .map(|s| format!("{}={}", s.name, s.count))
                    .collect();
                println!(
                    "model {}: {} buffers, {} textures [{}]",
                    m.path.display(),
                    m.buffers.len(),
                    m.textures.len(),
                    counts.join(" ")
                );
            }
            Err(e) => println!("model failed: {e}"),
        }
    }

    let violations = context.violations();
    if !violations.is_empty() {
        error!(count = violations.len(), "GL binding violations recorded");
        return Ok(ExitCode::FAILURE);
    }
    if let Some(fatal) = report.fatal() {
        error!(error = %fatal, "Fatal error while loading");
        return Ok(ExitCode::FAILURE);
    }

    println!(
        "{} loaded, {} failed, {} pool slots used",
        report.succeeded(),
        report.failed(),
        loader.pool().len()
    );
    Ok(if report.failed() == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
