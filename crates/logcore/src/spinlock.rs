//! Spin-based concurrency primitives (§4.8).
//!
//! Two lock flavors, both unmanaged and stored in a shared memory location:
//! an exclusive [`SpinLock`] and a reader/writer [`RwSpinLock`]. Neither
//! yields the host scheduler beyond [`Backoff`]'s bounded spin-then-yield
//! escalation, and neither supports recursive acquisition. Both hand out a
//! scoped guard that releases on every exit path via `Drop`.

use crate::Backoff;
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// An exclusive (single-writer) spin lock.
///
/// CAS-based test-and-test-and-set with adaptive backoff on contention.
/// Not reentrant: acquiring the lock twice on the same thread deadlocks.
#[repr(C)]
pub struct SpinLock<T> {
    locked: AtomicBool,
    data: UnsafeCell<T>,
}

// Safety: access to `data` is only ever granted through a held `SpinLockGuard`,
// which requires exclusive possession of `locked`.
unsafe impl<T: Send> Send for SpinLock<T> {}
unsafe impl<T: Send> Sync for SpinLock<T> {}

impl<T> SpinLock<T> {
    /// Creates a new unlocked spin lock wrapping `data`.
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquires the lock, spinning (then yielding) until it becomes free.
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let mut backoff = Backoff::new();
        // Test-and-test-and-set: spin on a plain load first to avoid
        // hammering the cache line with failed CAS attempts.
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                backoff.snooze();
            }
        }
        SpinLockGuard { lock: self }
    }

    /// Attempts to acquire the lock without blocking.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|()| SpinLockGuard { lock: self })
    }

    fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

/// Scoped guard that releases the [`SpinLock`] when dropped.
pub struct SpinLockGuard<'a, T> {
    lock: &'a SpinLock<T>,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        // SAFETY: holding the guard is proof of exclusive access.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: holding the guard is proof of exclusive access.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

// ---------------------------------------------------------------------
// Reader-writer spin lock
// ---------------------------------------------------------------------

const WRITER_BIT: usize = 1 << (usize::BITS - 1);

/// A reader/writer spin lock: N concurrent readers, or one exclusive writer.
///
/// Writers set [`WRITER_BIT`] to block new readers, then spin until the
/// readers already in the critical section drain. Readers increment a
/// counter in the low bits; they back off (rather than starve the writer)
/// whenever the writer bit is observed set.
#[repr(C)]
pub struct RwSpinLock<T> {
    state: AtomicUsize,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for RwSpinLock<T> {}
unsafe impl<T: Send + Sync> Sync for RwSpinLock<T> {}

impl<T> RwSpinLock<T> {
    /// Creates a new unlocked reader/writer spin lock wrapping `data`.
    pub const fn new(data: T) -> Self {
        Self {
            state: AtomicUsize::new(0),
            data: UnsafeCell::new(data),
        }
    }

    /// Acquires a shared (read) lock.
    pub fn read(&self) -> RwSpinLockReadGuard<'_, T> {
        let mut backoff = Backoff::new();
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state & WRITER_BIT == 0
                && self
                    .state
                    .compare_exchange_weak(
                        state,
                        state + 1,
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    )
                    .is_ok()
            {
                return RwSpinLockReadGuard { lock: self };
            }
            backoff.snooze();
        }
    }

    /// Acquires the exclusive (write) lock, waiting for active readers to drain.
    pub fn write(&self) -> RwSpinLockWriteGuard<'_, T> {
        let mut backoff = Backoff::new();
        // First claim the writer bit so no new readers can join.
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state & WRITER_BIT == 0
                && self
                    .state
                    .compare_exchange_weak(
                        state,
                        state | WRITER_BIT,
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    )
                    .is_ok()
            {
                break;
            }
            backoff.snooze();
        }
        // Then wait for the readers that were already in the critical section.
        backoff.reset();
        while self.state.load(Ordering::Acquire) & !WRITER_BIT != 0 {
            backoff.snooze();
        }
        RwSpinLockWriteGuard { lock: self }
    }

    fn unlock_read(&self) {
        self.state.fetch_sub(1, Ordering::Release);
    }

    fn unlock_write(&self) {
        self.state.store(0, Ordering::Release);
    }
}

/// Scoped shared-access guard for [`RwSpinLock`].
pub struct RwSpinLockReadGuard<'a, T> {
    lock: &'a RwSpinLock<T>,
}

impl<T> Deref for RwSpinLockReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> Drop for RwSpinLockReadGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock_read();
    }
}

/// Scoped exclusive-access guard for [`RwSpinLock`].
pub struct RwSpinLockWriteGuard<'a, T> {
    lock: &'a RwSpinLock<T>,
}

impl<T> Deref for RwSpinLockWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for RwSpinLockWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for RwSpinLockWriteGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock_write();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn spin_lock_mutual_exclusion() {
        let lock = Arc::new(SpinLock::new(0u64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    *lock.lock() += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.lock(), 8000);
    }

    #[test]
    fn spin_lock_try_lock_contended() {
        let lock = SpinLock::new(0);
        let _guard = lock.lock();
        assert!(lock.try_lock().is_none());
    }

    #[test]
    fn rw_spin_lock_many_readers() {
        let lock = RwSpinLock::new(42);
        let r1 = lock.read();
        let r2 = lock.read();
        assert_eq!(*r1, 42);
        assert_eq!(*r2, 42);
    }

    #[test]
    fn rw_spin_lock_writer_excludes_readers() {
        let lock = Arc::new(RwSpinLock::new(0u64));
        {
            let mut w = lock.write();
            *w = 7;
        }
        assert_eq!(*lock.read(), 7);
    }

    #[test]
    fn rw_spin_lock_concurrent_writers_serialize() {
        let lock = Arc::new(RwSpinLock::new(0u64));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let lock = Arc::clone(&lock);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    *lock.write() += 1;
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*lock.read(), 4000);
    }
}
