//! Process-wide singletons (§9 "Global mutable state"): the
//! [`ContextWriterRegistry`] and the global decorator list, each a flat
//! array plus its own writer lock, never a controller's.

use crate::handle::{BufferId, PayloadHandle};
use crate::registry::ContextWriterRegistry;
use crate::ring::RingBuffer;
use crate::spinlock::{RwSpinLock, SpinLock};
use std::sync::OnceLock;

/// Decorator payloads applied to every message emitted by any logger in
/// the process, backed by their own ring (`BufferId::GlobalDecorator`) so
/// their lifetime is independent of any one [`crate::LogController`]'s
/// `MemoryManager`.
pub struct GlobalDecorators {
    ring: SpinLock<RingBuffer>,
    handles: RwSpinLock<Vec<PayloadHandle>>,
}

impl GlobalDecorators {
    fn new(capacity: usize) -> Self {
        Self {
            ring: SpinLock::new(RingBuffer::new(capacity)),
            handles: RwSpinLock::new(Vec::new()),
        }
    }

    /// Allocates and appends a new constant decorator payload, returning
    /// its handle.
    pub fn add(&self, bytes: &[u8]) -> Option<PayloadHandle> {
        let mut ring = self.ring.lock();
        let alloc = ring.allocate(bytes.len())?;
        // SAFETY: `alloc` was just returned by this same ring's `allocate`.
        unsafe {
            ring.payload_slice_mut(alloc.header_offset, bytes.len()).copy_from_slice(bytes);
        }
        let handle = PayloadHandle::new(BufferId::GlobalDecorator, alloc.header_offset as u32, alloc.version, false);
        self.handles.write().push(handle);
        Some(handle)
    }

    /// Removes `handle` from the decorator list and releases its backing
    /// bytes.
    pub fn remove(&self, handle: PayloadHandle) {
        self.handles.write().retain(|h| *h != handle);
        let mut ring = self.ring.lock();
        // SAFETY: `handle.offset()` was produced by this same ring's `allocate`.
        let header = unsafe { ring.header_at(handle.offset() as usize) };
        if header.version.load(std::sync::atomic::Ordering::Acquire) == handle.version() {
            header.version.store(0, std::sync::atomic::Ordering::Release);
        }
        ring.reclaim();
    }

    /// A point-in-time copy of every currently registered decorator handle.
    pub fn snapshot(&self) -> Vec<PayloadHandle> {
        self.handles.read().clone()
    }

    /// `true` if any decorator is still registered; used by [`shutdown`]'s
    /// leak check.
    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }
}

static GLOBAL_DECORATORS: OnceLock<GlobalDecorators> = OnceLock::new();
static CONTEXT_WRITER_REGISTRY: OnceLock<ContextWriterRegistry> = OnceLock::new();

const GLOBAL_DECORATOR_RING_CAPACITY: usize = 64 * 1024;

/// Initializes the process-wide singletons. Idempotent: later calls are
/// no-ops if already initialized.
pub fn init() {
    GLOBAL_DECORATORS.get_or_init(|| GlobalDecorators::new(GLOBAL_DECORATOR_RING_CAPACITY));
    CONTEXT_WRITER_REGISTRY.get_or_init(ContextWriterRegistry::with_builtins);
}

/// Asserts no decorator handles remain live, per §9's "make `shutdown`
/// assert no live handles".
///
/// # Panics
/// If any global decorator is still registered.
pub fn shutdown() {
    if let Some(decorators) = GLOBAL_DECORATORS.get() {
        assert!(decorators.is_empty(), "shutdown called with live global decorator handles");
    }
}

pub fn global_decorators() -> &'static GlobalDecorators {
    GLOBAL_DECORATORS.get_or_init(|| GlobalDecorators::new(GLOBAL_DECORATOR_RING_CAPACITY))
}

pub fn context_writer_registry() -> &'static ContextWriterRegistry {
    CONTEXT_WRITER_REGISTRY.get_or_init(ContextWriterRegistry::with_builtins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_remove_round_trips() {
        let decorators = GlobalDecorators::new(4096);
        let handle = decorators.add(b"trace-id=abc").unwrap();
        assert_eq!(decorators.snapshot(), vec![handle]);
        decorators.remove(handle);
        assert!(decorators.is_empty());
    }

    #[test]
    fn global_accessors_are_idempotent() {
        let a = global_decorators() as *const _;
        let b = global_decorators() as *const _;
        assert_eq!(a, b);
    }
}
