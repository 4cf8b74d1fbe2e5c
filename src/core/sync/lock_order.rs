/*!
 * Lock-Order Log
 *
 * Records acquire/release events of instrumented locks and detects lock-order
 * inversions: two locks taken in opposite orders by different code paths form
 * a cycle in the "held-before" graph, which is a potential deadlock even when
 * no run actually hung.
 *
 * # Graph
 *
 * Each acquire adds an edge `held -> acquired` for every lock the calling
 * thread already holds. A cycle in that graph is reported as a
 * [`LockInversion`] naming the locks involved.
 */

use ahash::{HashMap, HashMapExt, HashSet, HashSetExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::thread::{self, ThreadId};
use tracing::warn;

/// Identifier of one instrumented lock
pub type LockId = u32;

/// Kind of recorded event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockEventKind {
    Acquire,
    Release,
}

/// One recorded lock event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockEvent {
    pub seq: u64,
    pub lock: LockId,
    pub thread: ThreadId,
    pub kind: LockEventKind,
}

/// Cycle of locks acquired in inconsistent order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInversion {
    /// Lock names along the cycle; the first lock is repeated implicitly
    pub cycle: Vec<String>,
}

#[derive(Default)]
struct LogState {
    names: Vec<String>,
    events: Vec<LockEvent>,
    held: HashMap<ThreadId, Vec<LockId>>,
    edges: HashMap<LockId, HashSet<LockId>>,
    next_seq: u64,
}

/// Shared recorder of lock events
///
/// Instrumented locks hold an `Arc<LockOrderLog>` and report through
/// [`LockOrderLog::acquired`] and [`LockOrderLog::released`].
#[derive(Default)]
pub struct LockOrderLog {
    state: Mutex<LogState>,
}

impl LockOrderLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lock under a display name
    pub fn register(&self, name: impl Into<String>) -> LockId {
        let mut state = self.state.lock();
        state.names.push(name.into());
        (state.names.len() - 1) as LockId
    }

    /// Display name of a registered lock
    pub fn name(&self, lock: LockId) -> Option<String> {
        self.state.lock().names.get(lock as usize).cloned()
    }

    /// Record that the current thread now holds `lock`
    pub fn acquired(&self, lock: LockId) {
        let thread = thread::current().id();
        let mut state = self.state.lock();

        let held = state.held.get(&thread).cloned().unwrap_or_default();
        for before in held {
            if before != lock {
                state.edges.entry(before).or_insert_with(HashSet::new).insert(lock);
            }
        }
        state.held.entry(thread).or_insert_with(Vec::new).push(lock);
        state.push_event(lock, thread, LockEventKind::Acquire);
    }

    /// Record that the current thread released `lock`
    pub fn released(&self, lock: LockId) {
        let thread = thread::current().id();
        let mut state = self.state.lock();

        let mut now_empty = false;
        if let Some(held) = state.held.get_mut(&thread) {
            if let Some(pos) = held.iter().rposition(|&l| l == lock) {
                held.remove(pos);
            } else {
                warn!(lock, "Release of a lock not held by this thread");
            }
            now_empty = held.is_empty();
        }
        if now_empty {
            state.held.remove(&thread);
        }
        state.push_event(lock, thread, LockEventKind::Release);
    }

    /// Snapshot of all events in record order
    pub fn events(&self) -> Vec<LockEvent> {
        self.state.lock().events.clone()
    }

    /// Locks currently held by the calling thread, innermost last
    pub fn held_by_current(&self) -> Vec<LockId> {
        let thread = thread::current().id();
        self.state
            .lock()
            .held
            .get(&thread)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether every acquire so far has a matching release
    pub fn is_balanced(&self) -> bool {
        self.state.lock().held.is_empty()
    }

    /// Find every cycle in the held-before graph
    pub fn detect_inversions(&self) -> Vec<LockInversion> {
        let state = self.state.lock();

        let mut nodes: Vec<LockId> = state.edges.keys().copied().collect();
        nodes.sort_unstable();

        let mut color: HashMap<LockId, Color> = HashMap::new();
        let mut stack = Vec::new();
        let mut cycles = Vec::new();

        for node in nodes {
            if !color.contains_key(&node) {
                visit(node, &state.edges, &mut color, &mut stack, &mut cycles);
            }
        }

        cycles
            .into_iter()
            .map(|cycle: Vec<LockId>| LockInversion {
                cycle: cycle
                    .into_iter()
                    .map(|id| {
                        state
                            .names
                            .get(id as usize)
                            .cloned()
                            .unwrap_or_else(|| format!("lock#{id}"))
                    })
                    .collect(),
            })
            .collect()
    }
}

impl LogState {
    fn push_event(&mut self, lock: LockId, thread: ThreadId, kind: LockEventKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(LockEvent {
            seq,
            lock,
            thread,
            kind,
        });
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    InProgress,
    Done,
}

fn visit(
    node: LockId,
    edges: &HashMap<LockId, HashSet<LockId>>,
    color: &mut HashMap<LockId, Color>,
    stack: &mut Vec<LockId>,
    cycles: &mut Vec<Vec<LockId>>,
) {
    color.insert(node, Color::InProgress);
    stack.push(node);

    if let Some(next) = edges.get(&node) {
        let mut next: Vec<LockId> = next.iter().copied().collect();
        next.sort_unstable();
        for target in next {
            match color.get(&target) {
                None => visit(target, edges, color, stack, cycles),
                Some(Color::InProgress) => {
                    if let Some(pos) = stack.iter().position(|&l| l == target) {
                        cycles.push(stack[pos..].to_vec());
                    }
                }
                Some(Color::Done) => {}
            }
        }
    }

    stack.pop();
    color.insert(node, Color::Done);
}

impl std::fmt::Debug for LockOrderLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("LockOrderLog")
            .field("locks", &state.names)
            .field("events", &state.events.len())
            .finish()
    }
}
