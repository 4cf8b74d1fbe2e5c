/*!
 * Asset Loader
 *
 * Runs one loading session:
 *
 * 1. detach the owner's GL context,
 * 2. start a task pool and submit one task per asset, each drawing its own
 *    arena from the allocator pool,
 * 3. wait for the pool to drain and reattach the owner's context,
 * 4. stop the pool and collect per-asset results.
 */

use super::model::{load_model, ModelContext, ModelRequest};
use super::texture::{load_texture, TextureRequest};
use super::types::{AssetError, AssetResult, LoadReport, LoadedModel, LoadedTexture};
use crate::core::config::RuntimeConfig;
use crate::core::types::RuntimeResult;
use crate::gl::GlLock;
use crate::memory::{AllocatorPool, Arena};
use crate::monitoring::SessionSpan;
use crate::tasks::{TaskError, TaskHandle, TaskPool};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{error, info};

/// Result slot shared between a loading task and the session
type Slot<T> = Arc<Mutex<Option<AssetResult<T>>>>;

/// Owner of the allocator pool and the GL lock for a series of loads
#[derive(Debug)]
pub struct AssetLoader {
    pool: Arc<AllocatorPool<Arena>>,
    gl: GlLock,
    config: RuntimeConfig,
}

impl AssetLoader {
    pub fn new(config: RuntimeConfig, gl: GlLock) -> Self {
        Self {
            pool: Arc::new(AllocatorPool::new(config.pool_capacity)),
            gl,
            config,
        }
    }

    pub fn pool(&self) -> &Arc<AllocatorPool<Arena>> {
        &self.pool
    }

    pub fn gl(&self) -> &GlLock {
        &self.gl
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Load one texture on the calling thread
    ///
    /// Must be called from the thread that owns the GL context; the owner's
    /// binding is handed to the GL lock for the upload and restored after.
    pub fn load_texture(&self, request: &TextureRequest) -> AssetResult<LoadedTexture> {
        self.detached(|arena| load_texture(request, arena, &self.gl))
    }

    /// Load one model on the calling thread; its images still load in parallel
    ///
    /// Must be called from the thread that owns the GL context.
    pub fn load_model(&self, request: &ModelRequest) -> AssetResult<LoadedModel> {
        self.detached(|arena| load_model(request, arena, &self.model_context()))
    }

    /// Run `load` in a fresh pool arena with the owner's context unbound
    fn detached<T>(&self, load: impl FnOnce(&mut Arena) -> AssetResult<T>) -> AssetResult<T> {
        let detached = self.gl.detach_owner()?;
        let loaded = self.in_arena(load);
        detached.reattach()?;
        loaded
    }

    fn in_arena<T>(&self, load: impl FnOnce(&mut Arena) -> AssetResult<T>) -> AssetResult<T> {
        let slot = self.pool.get(self.config.arena_size)?;
        let mut arena = slot.lock();
        load(&mut *arena)
    }

    fn model_context(&self) -> ModelContext<'_> {
        ModelContext {
            pool: &self.pool,
            gl: &self.gl,
            texture_arena_size: self.config.arena_size,
            scratch_size: self.config.scratch_size,
            workers: self.config.workers,
        }
    }

    /// Load every asset in parallel, one task per asset
    ///
    /// Must be called from the thread that owns the GL context. Errors of
    /// individual assets are reported in the returned [`LoadReport`]; the
    /// call itself fails only when the session cannot run.
    pub fn load_all(
        &self,
        textures: Vec<TextureRequest>,
        models: Vec<ModelRequest>,
    ) -> RuntimeResult<LoadReport> {
        let span = SessionSpan::new("load_all");
        let _entered = span.enter();
        span.record_assets(textures.len() + models.len());
        info!(
            textures = textures.len(),
            models = models.len(),
            "Loading session started"
        );

        let detached = self.gl.detach_owner()?;
        let mut pool = TaskPool::from_config(&self.config)?;
        pool.start()?;

        let mut texture_tasks = Vec::with_capacity(textures.len());
        for request in textures {
            let loader = self.task_view();
            texture_tasks.push(submit(&pool, move || {
                let slot = loader.pool.get(loader.config.arena_size)?;
                let mut arena = slot.lock();
                load_texture(&request, &mut *arena, &loader.gl)
            })?);
        }

        let mut model_tasks = Vec::with_capacity(models.len());
        for request in models {
            let loader = self.task_view();
            model_tasks.push(submit(&pool, move || {
                let slot = loader.pool.get(loader.config.arena_size)?;
                let mut arena = slot.lock();
                load_model(&request, &mut arena, &loader.model_context())
            })?);
        }

        pool.wait()?;
        detached.reattach()?;
        pool.stop()?;

        let report = LoadReport {
            textures: texture_tasks.into_iter().map(collect).collect(),
            models: model_tasks.into_iter().map(collect).collect(),
        };

        if let Some(fatal) = report.fatal() {
            error!(error = %fatal, "Loading session hit a fatal error");
        }
        span.record_failed(report.failed());
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            pool_slots = self.pool.len(),
            "Loading session finished"
        );
        Ok(report)
    }

    /// Cheap clone of the shared parts a loading task needs
    fn task_view(&self) -> AssetLoader {
        AssetLoader {
            pool: Arc::clone(&self.pool),
            gl: self.gl.clone(),
            config: self.config.clone(),
        }
    }
}

/// Submit a typed loading job; its outcome lands in the returned slot
fn submit<T, F>(pool: &TaskPool, job: F) -> Result<(Slot<T>, TaskHandle), TaskError>
where
    T: Send + 'static,
    F: FnOnce() -> AssetResult<T> + Send + 'static,
{
    let slot: Slot<T> = Arc::new(Mutex::new(None));
    let result = Arc::clone(&slot);
    let handle = pool.submit(move || {
        let outcome = job();
        let failure = outcome.as_ref().err().cloned();
        *result.lock() = Some(outcome);
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    })?;
    Ok((slot, handle))
}

/// Final outcome of one loading task
fn collect<T>((slot, handle): (Slot<T>, TaskHandle)) -> AssetResult<T> {
    let task = handle.id();
    let joined = handle.join();
    match slot.lock().take() {
        Some(outcome) => outcome,
        None => Err(AssetError::Task(
            joined.err().unwrap_or(TaskError::Abandoned { task }),
        )),
    }
}
