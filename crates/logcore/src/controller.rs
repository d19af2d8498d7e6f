//! `LogController` (§4.7) — per-logger composition of a [`MemoryManager`],
//! a [`DispatchQueue`], decorate handlers, and a sinks-interest bitmap.

use crate::dispatch::{DispatchQueue, EnqueueError, LogMessage};
use crate::handle::PayloadHandle;
use crate::memory_manager::MemoryManager;
use crate::selflog::SelfLog;
use crate::spinlock::RwSpinLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// A decorate handler: invoked per-emit to produce an extra disjointed
/// child payload (e.g. the calling thread id, a trace-correlation id).
pub type DecorateHandlerFn = fn(&MemoryManager) -> Option<PayloadHandle>;

const MAX_LEVEL: u8 = 5;

struct ControllerState {
    decorate_handlers: Vec<DecorateHandlerFn>,
    constant_decorators: Vec<PayloadHandle>,
}

/// Owns the per-logger `MemoryManager` + `DispatchQueue` pair and the
/// decorator/level/sink bookkeeping layered on top of them (§4.7).
pub struct LogController {
    memory: MemoryManager,
    queue: DispatchQueue,
    self_log: Arc<SelfLog>,
    min_level: AtomicU32,
    /// Bit `i` set means some sink is interested in level `i`.
    sinks_interest: AtomicU32,
    state: RwSpinLock<ControllerState>,
}

impl LogController {
    pub fn new(memory: MemoryManager, queue: DispatchQueue, self_log: Arc<SelfLog>) -> Self {
        Self {
            memory,
            queue,
            self_log,
            min_level: AtomicU32::new(0),
            sinks_interest: AtomicU32::new((1 << (MAX_LEVEL + 1)) - 1),
            state: RwSpinLock::new(ControllerState {
                decorate_handlers: Vec::new(),
                constant_decorators: Vec::new(),
            }),
        }
    }

    pub fn memory_manager(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn dispatch_queue(&self) -> &DispatchQueue {
        &self.queue
    }

    pub fn min_level(&self) -> u8 {
        self.min_level.load(Ordering::Acquire) as u8
    }

    pub fn set_min_level(&self, level: u8) {
        self.min_level.store(u32::from(level), Ordering::Release);
    }

    pub fn set_sink_interest(&self, level: u8, interested: bool) {
        let bit = 1u32 << level.min(MAX_LEVEL);
        if interested {
            self.sinks_interest.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.sinks_interest.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    /// `true` if some registered sink is interested in `level` and `level`
    /// is at or above the configured minimum.
    pub fn has_sinks_for(&self, level: u8) -> bool {
        if u32::from(level) < self.min_level.load(Ordering::Acquire) {
            return false;
        }
        let bit = 1u32 << level.min(MAX_LEVEL);
        self.sinks_interest.load(Ordering::Acquire) & bit != 0
    }

    /// Enqueues `msg` for later formatting by a sink. Per §4.7, callers
    /// must take the controller's write lock for the duration of any
    /// decorator edit, which this read-lock acquisition is mutually
    /// exclusive with.
    pub fn dispatch_message(&self, msg: LogMessage) -> Result<(), EnqueueError> {
        let _guard = self.state.read();
        self.queue.enqueue_or_drop(msg, &self.memory, &self.self_log)
    }

    /// Begins an exclusive decorator edit, returning the current constant
    /// decorator list for the caller to mutate and hand back to
    /// [`Self::end_decorator_edit`]. While the returned guard is held, no
    /// producer may call [`Self::dispatch_message`].
    pub fn begin_decorator_edit(&self) -> DecoratorEditGuard<'_> {
        let guard = self.state.write();
        DecoratorEditGuard { guard }
    }

    pub fn add_decorate_handler(&self, handler: DecorateHandlerFn) {
        self.state.write().decorate_handlers.push(handler);
    }

    pub fn remove_decorate_handler(&self, handler: DecorateHandlerFn) {
        self.state.write().decorate_handlers.retain(|h| *h != handler);
    }

    /// Runs every registered decorate handler, returning the payload
    /// handles they produced (skipping any that declined to contribute).
    pub fn run_decorate_handlers(&self) -> Vec<PayloadHandle> {
        let state = self.state.read();
        state
            .decorate_handlers
            .iter()
            .filter_map(|handler| handler(&self.memory))
            .collect()
    }

    /// A point-in-time copy of the constant decorator list.
    pub fn snapshot_constant_decorators(&self) -> Vec<PayloadHandle> {
        self.state.read().constant_decorators.clone()
    }
}

/// Held while editing the constant decorator list; blocks
/// [`LogController::dispatch_message`] for its lifetime (§4.7).
pub struct DecoratorEditGuard<'a> {
    guard: crate::spinlock::RwSpinLockWriteGuard<'a, ControllerState>,
}

impl DecoratorEditGuard<'_> {
    pub fn decorators(&self) -> &[PayloadHandle] {
        &self.guard.constant_decorators
    }

    pub fn set_decorators(&mut self, handles: Vec<PayloadHandle>) {
        self.guard.constant_decorators = handles;
    }
}
