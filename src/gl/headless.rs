/*!
 * Headless GL Context
 *
 * Software stand-in for a real context. It hands out sequential object ids,
 * keeps a log of every call with the calling thread, and records a
 * violation whenever the binding rules are broken: any bind while the
 * context is already bound (even to the calling thread), or a GL call from
 * a thread that does not have the context bound.
 */

use super::context::GlContext;
use super::types::{BufferTarget, GlError, GlObjectId, GlResult, TextureDesc};
use ahash::HashMap;
use parking_lot::Mutex;
use std::thread::{self, ThreadId};
use tracing::{trace, warn};

/// One recorded GL call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlCallKind {
    MakeCurrent,
    ReleaseCurrent,
    CreateTexture { id: GlObjectId, width: u32, height: u32 },
    CreateBuffer { id: GlObjectId, target: BufferTarget, len: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlCall {
    pub seq: u64,
    pub thread: ThreadId,
    pub kind: GlCallKind,
}

/// Broken binding rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindViolation {
    pub seq: u64,
    pub thread: ThreadId,
    /// Thread the context was bound to at the time, if any
    pub bound_to: Option<ThreadId>,
    pub operation: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureInfo {
    pub width: u32,
    pub height: u32,
    pub checksum: u64,
}

#[derive(Debug, Default)]
struct HeadlessState {
    bound_to: Option<ThreadId>,
    lost: bool,
    next_id: u32,
    next_seq: u64,
    calls: Vec<GlCall>,
    violations: Vec<BindViolation>,
    textures: HashMap<GlObjectId, TextureInfo>,
    buffers: HashMap<GlObjectId, usize>,
}

impl HeadlessState {
    fn record(&mut self, kind: GlCallKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.calls.push(GlCall {
            seq,
            thread: thread::current().id(),
            kind,
        });
    }

    fn violation(&mut self, operation: &'static str) {
        let thread = thread::current().id();
        warn!(operation, ?thread, bound_to = ?self.bound_to, "GL binding violation");
        self.violations.push(BindViolation {
            seq: self.next_seq,
            thread,
            bound_to: self.bound_to,
            operation,
        });
    }

    fn require_current(&mut self, operation: &'static str) -> GlResult<()> {
        if self.bound_to == Some(thread::current().id()) {
            Ok(())
        } else {
            self.violation(operation);
            Err(GlError::NotCurrent { operation })
        }
    }

    fn next_object(&mut self) -> GlObjectId {
        self.next_id += 1;
        GlObjectId(self.next_id)
    }
}

/// In-process GL context that checks the binding protocol
#[derive(Debug, Default)]
pub struct HeadlessContext {
    state: Mutex<HeadlessState>,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later bind fail with `GlError::ContextLost`
    pub fn lose(&self) {
        self.state.lock().lost = true;
    }

    pub fn calls(&self) -> Vec<GlCall> {
        self.state.lock().calls.clone()
    }

    pub fn violations(&self) -> Vec<BindViolation> {
        self.state.lock().violations.clone()
    }

    pub fn bound_thread(&self) -> Option<ThreadId> {
        self.state.lock().bound_to
    }

    pub fn texture_count(&self) -> usize {
        self.state.lock().textures.len()
    }

    pub fn buffer_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn texture(&self, id: GlObjectId) -> Option<TextureInfo> {
        self.state.lock().textures.get(&id).copied()
    }

    pub fn buffer_len(&self, id: GlObjectId) -> Option<usize> {
        self.state.lock().buffers.get(&id).copied()
    }

    /// Check that every bind..unbind span in the call log belongs to one thread
    pub fn spans_are_serialized(&self) -> bool {
        let state = self.state.lock();
        let mut holder: Option<ThreadId> = None;
        for call in &state.calls {
            match (&call.kind, holder) {
                (GlCallKind::MakeCurrent, None) => holder = Some(call.thread),
                (GlCallKind::MakeCurrent, Some(_)) => return false,
                (GlCallKind::ReleaseCurrent, Some(t)) if t == call.thread => holder = None,
                (GlCallKind::ReleaseCurrent, _) => return false,
                (_, Some(t)) if t == call.thread => {}
                _ => return false,
            }
        }
        true
    }
}

impl GlContext for HeadlessContext {
    fn make_current(&self) -> GlResult<()> {
        let mut state = self.state.lock();
        if state.lost {
            return Err(GlError::ContextLost("headless context was lost".into()));
        }

        let thread = thread::current().id();
        if state.bound_to.is_some() {
            state.violation("make_current");
        }
        state.bound_to = Some(thread);
        state.record(GlCallKind::MakeCurrent);
        trace!(?thread, "Headless context bound");
        Ok(())
    }

    fn release_current(&self) -> GlResult<()> {
        let mut state = self.state.lock();
        let thread = thread::current().id();
        match state.bound_to {
            Some(owner) if owner == thread => {
                state.bound_to = None;
                state.record(GlCallKind::ReleaseCurrent);
                Ok(())
            }
            // Unbinding an unbound context is a no-op in GL
            None => Ok(()),
            Some(_) => {
                state.violation("release_current");
                Err(GlError::NotCurrent {
                    operation: "release_current",
                })
            }
        }
    }

    fn create_texture(&self, desc: &TextureDesc, pixels: &[u8]) -> GlResult<GlObjectId> {
        let mut state = self.state.lock();
        state.require_current("create_texture")?;
        if pixels.len() != desc.byte_len() {
            return Err(GlError::InvalidUpload(format!(
                "{}x{} RGBA8 texture needs {} bytes, got {}",
                desc.width,
                desc.height,
                desc.byte_len(),
                pixels.len()
            )));
        }

        let id = state.next_object();
        state.textures.insert(
            id,
            TextureInfo {
                width: desc.width,
                height: desc.height,
                checksum: checksum(pixels),
            },
        );
        state.record(GlCallKind::CreateTexture {
            id,
            width: desc.width,
            height: desc.height,
        });
        Ok(id)
    }

    fn create_buffer(&self, target: BufferTarget, data: &[u8]) -> GlResult<GlObjectId> {
        let mut state = self.state.lock();
        state.require_current("create_buffer")?;

        let id = state.next_object();
        state.buffers.insert(id, data.len());
        state.record(GlCallKind::CreateBuffer {
            id,
            target,
            len: data.len(),
        });
        Ok(id)
    }
}

/// FNV-1a over the uploaded bytes, for comparing uploads in tests
fn checksum(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &b| {
        (hash ^ b as u64).wrapping_mul(0x0100_0000_01b3)
    })
}
