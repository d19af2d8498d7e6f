//! Loom-based concurrency tests for the spin-lock protocol.
//!
//! Run with: `cargo test --features loom --test loom_tests --release`
//!
//! `logcore`'s `SpinLock`/`RwSpinLock` are built on `std::sync::atomic`
//! directly, so these tests model the same CAS protocol using loom's own
//! atomics in isolation, with a small state space loom can exhaustively
//! explore, rather than loom-instrumenting the production types.

#![cfg(feature = "loom")]

use loom::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use loom::sync::Arc;
use loom::thread;
use std::cell::UnsafeCell;

struct LoomSpinLock {
    locked: AtomicBool,
    data: UnsafeCell<usize>,
}

unsafe impl Send for LoomSpinLock {}
unsafe impl Sync for LoomSpinLock {}

impl LoomSpinLock {
    fn new(value: usize) -> Self {
        Self {
            locked: AtomicBool::new(false),
            data: UnsafeCell::new(value),
        }
    }

    fn with_lock<R>(&self, f: impl FnOnce(&mut usize) -> R) -> R {
        while self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            thread::yield_now();
        }
        let result = f(unsafe { &mut *self.data.get() });
        self.locked.store(false, Ordering::Release);
        result
    }
}

#[test]
fn spin_lock_serializes_two_threads() {
    loom::model(|| {
        let lock = Arc::new(LoomSpinLock::new(0));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let lock = lock.clone();
                thread::spawn(move || {
                    lock.with_lock(|v| *v += 1);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(lock.with_lock(|v| *v), 2);
    });
}

const WRITER_BIT: usize = 1 << (usize::BITS - 1);

struct LoomRwSpinLock {
    state: AtomicUsize,
    data: UnsafeCell<usize>,
}

unsafe impl Send for LoomRwSpinLock {}
unsafe impl Sync for LoomRwSpinLock {}

impl LoomRwSpinLock {
    fn new(value: usize) -> Self {
        Self {
            state: AtomicUsize::new(0),
            data: UnsafeCell::new(value),
        }
    }

    fn read<R>(&self, f: impl FnOnce(&usize) -> R) -> R {
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state & WRITER_BIT == 0
                && self
                    .state
                    .compare_exchange_weak(state, state + 1, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                let result = f(unsafe { &*self.data.get() });
                self.state.fetch_sub(1, Ordering::Release);
                return result;
            }
            thread::yield_now();
        }
    }

    fn write<R>(&self, f: impl FnOnce(&mut usize) -> R) -> R {
        loop {
            let state = self.state.load(Ordering::Relaxed);
            if state & WRITER_BIT == 0
                && self
                    .state
                    .compare_exchange_weak(state, state | WRITER_BIT, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
            {
                break;
            }
            thread::yield_now();
        }
        while self.state.load(Ordering::Acquire) & !WRITER_BIT != 0 {
            thread::yield_now();
        }
        let result = f(unsafe { &mut *self.data.get() });
        self.state.store(0, Ordering::Release);
        result
    }
}

#[test]
fn rw_spin_lock_write_excludes_concurrent_readers() {
    loom::model(|| {
        let lock = Arc::new(LoomRwSpinLock::new(0));
        let writer = {
            let lock = lock.clone();
            thread::spawn(move || {
                lock.write(|v| *v = 1);
            })
        };
        let reader = {
            let lock = lock.clone();
            thread::spawn(move || {
                lock.read(|v| {
                    assert!(*v == 0 || *v == 1);
                });
            })
        };
        writer.join().unwrap();
        reader.join().unwrap();
    });
}

#[test]
fn rw_spin_lock_two_writers_never_interleave() {
    loom::model(|| {
        let lock = Arc::new(LoomRwSpinLock::new(0));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let lock = lock.clone();
                thread::spawn(move || {
                    lock.write(|v| *v += 1);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(lock.read(|v| *v), 2);
    });
}
