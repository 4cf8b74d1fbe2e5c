/*!
 * Concurrent Loading Scenario
 *
 * A pool of four 1MB arenas hands one arena to a four-worker task pool.
 * Ten tasks decode a bitmap into that shared arena and upload it through
 * the GL lock while the owner thread has its context detached.
 */

use asset_runtime::assets::{load_texture, LoadedTexture, TextureRequest};
use asset_runtime::core::limits::SIZE_1M;
use asset_runtime::core::sync::LockOrderLog;
use asset_runtime::gl::{GlContext, GlLock, HeadlessContext};
use asset_runtime::memory::{AllocatorPool, Arena, Locked, MemoryError, SharedAllocator};
use asset_runtime::tasks::TaskPool;
use image::{ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::io::Cursor;
use std::sync::Arc;
use std::thread;

const TASKS: usize = 10;
const WORKERS: usize = 4;
const POOL_CAPACITY: usize = 4;

fn encode_bmp(width: u32, height: u32, shade: u8) -> Vec<u8> {
    let mut encoded = Cursor::new(Vec::new());
    RgbaImage::from_pixel(width, height, Rgba([shade, shade, shade, 255]))
        .write_to(&mut encoded, ImageFormat::Bmp)
        .unwrap();
    encoded.into_inner()
}

#[test]
fn test_workers_decode_into_shared_pool_arena() {
    let ctx = Arc::new(HeadlessContext::new());
    let gl = GlLock::new(Arc::clone(&ctx) as Arc<dyn GlContext>);
    let owner = thread::current().id();
    gl.attach_owner().unwrap();

    let arenas: AllocatorPool<Arena> = AllocatorPool::new(POOL_CAPACITY);
    let shared = arenas.get(SIZE_1M).unwrap();

    let detached = gl.detach_owner().unwrap();
    let loaded: Arc<Mutex<Vec<(usize, LoadedTexture)>>> = Arc::new(Mutex::new(Vec::new()));
    let mut pool = TaskPool::new(WORKERS).unwrap();
    pool.start().unwrap();

    let handles: Vec<_> = (0..TASKS)
        .map(|task| {
            let arena = Arc::clone(&shared);
            let gl = gl.clone();
            let loaded = Arc::clone(&loaded);
            let request = TextureRequest::from_bytes(
                format!("tile-{task}"),
                encode_bmp(task as u32 + 1, 2, task as u8),
            );
            pool.submit(move || {
                let texture = load_texture(&request, &mut *arena.lock(), &gl)?;
                loaded.lock().push((task, texture));
                Ok(())
            })
            .unwrap()
        })
        .collect();

    pool.wait().unwrap();
    detached.reattach().unwrap();
    assert_eq!(pool.stop().unwrap(), 0);
    for handle in handles {
        handle.join().unwrap();
    }

    let loaded = loaded.lock();
    assert_eq!(loaded.len(), TASKS);
    let ids: HashSet<_> = loaded.iter().map(|(_, texture)| texture.id).collect();
    assert_eq!(ids.len(), TASKS);
    for (task, texture) in loaded.iter() {
        let info = ctx.texture(texture.id).unwrap();
        assert_eq!((info.width, info.height), (*task as u32 + 1, 2));
    }

    assert!(ctx.violations().is_empty());
    assert!(ctx.spans_are_serialized());
    assert_eq!(ctx.bound_thread(), Some(owner));

    // Encoded and decoded bytes of every task stay in the shared arena
    assert_eq!(shared.lock().live_allocations(), 2 * TASKS);

    let rest: Vec<_> = (1..POOL_CAPACITY).map(|_| arenas.get(SIZE_1M).unwrap()).collect();
    assert_eq!(rest.len(), POOL_CAPACITY - 1);
    assert_eq!(
        arenas.get(SIZE_1M).unwrap_err(),
        MemoryError::PoolExhausted {
            capacity: POOL_CAPACITY
        }
    );

    arenas.free_all();
    assert!(shared.lock().is_released());
}

#[test]
fn test_inconsistent_lock_order_is_reported() {
    let log = Arc::new(LockOrderLog::new());
    let gl = GlLock::with_lock_order(
        Arc::new(HeadlessContext::new()) as Arc<dyn GlContext>,
        Arc::clone(&log),
        "gl-context",
    );
    let arena = Arc::new(Locked::with_lock_order(
        Arena::new(SIZE_1M).unwrap(),
        Arc::clone(&log),
        "shared-arena",
    ));
    let mut pool = TaskPool::new(1).unwrap();
    pool.start().unwrap();

    let arena_then_gl = {
        let arena = Arc::clone(&arena);
        let gl = gl.clone();
        pool.submit(move || {
            arena.with(|_| gl.lock().map(drop))?;
            Ok(())
        })
        .unwrap()
    };
    let gl_then_arena = {
        let arena = Arc::clone(&arena);
        let gl = gl.clone();
        pool.submit(move || {
            let _guard = gl.lock()?;
            arena.alloc(8, 1)?;
            Ok(())
        })
        .unwrap()
    };

    pool.wait().unwrap();
    pool.stop().unwrap();
    arena_then_gl.join().unwrap();
    gl_then_arena.join().unwrap();

    let inversions = log.detect_inversions();
    assert_eq!(inversions.len(), 1);
    let mut cycle = inversions[0].cycle.clone();
    cycle.sort();
    assert_eq!(cycle, vec!["gl-context", "shared-arena"]);
    assert!(log.is_balanced());
}
