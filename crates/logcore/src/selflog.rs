//! `SelfLog` — the core's own diagnostic channel (§4.9).
//!
//! Deliberately independent of `MemoryManager`/`DispatchQueue` (it exists to
//! report *their* failures) and of any host logging framework: it is built
//! directly on [`crate::RingBuffer`]-adjacent primitives — here, a small
//! fixed-capacity `Vec` behind a [`SpinLock`] — so it can never recurse into
//! the path it is diagnosing.

use crate::error::LogCoreError;
use crate::spinlock::SpinLock;
use std::borrow::Cow;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// How `SelfLog` handles incoming diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SelfLogMode {
    Disabled = 0,
    InMemory = 1,
    InMemoryAndMirrorToHostErrorChannel = 2,
}

impl SelfLogMode {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::InMemory,
            2 => Self::InMemoryAndMirrorToHostErrorChannel,
            _ => Self::Disabled,
        }
    }
}

/// One recorded diagnostic event.
#[derive(Debug, Clone)]
pub struct SelfLogEntry {
    pub code: i32,
    pub message: Cow<'static, str>,
    pub timestamp_ns: i64,
}

const DEFAULT_CAPACITY: usize = 256;

struct Inner {
    entries: Vec<SelfLogEntry>,
    capacity: usize,
    host_channel: Option<Box<dyn Fn(&str) + Send + Sync>>,
}

/// Bounded in-memory channel for the core's own failures.
///
/// Mode changes are atomic (`AtomicU8`); the entry buffer itself is behind a
/// `SpinLock` since writes happen on arbitrary failing producer/consumer
/// threads and must never block on the host scheduler.
pub struct SelfLog {
    mode: AtomicU8,
    inner: SpinLock<Inner>,
}

impl SelfLog {
    pub fn new() -> Self {
        Self {
            mode: AtomicU8::new(SelfLogMode::Disabled as u8),
            inner: SpinLock::new(Inner {
                entries: Vec::with_capacity(DEFAULT_CAPACITY),
                capacity: DEFAULT_CAPACITY,
                host_channel: None,
            }),
        }
    }

    pub fn mode(&self) -> SelfLogMode {
        SelfLogMode::from_u8(self.mode.load(Ordering::Acquire))
    }

    pub fn set_mode(&self, mode: SelfLogMode) {
        self.mode.store(mode as u8, Ordering::Release);
    }

    /// Registers the callback used to mirror entries to the embedding
    /// application's own error channel when in
    /// [`SelfLogMode::InMemoryAndMirrorToHostErrorChannel`].
    pub fn set_host_channel(&self, f: impl Fn(&str) + Send + Sync + 'static) {
        self.inner.lock().host_channel = Some(Box::new(f));
    }

    /// Records a failure. No-op when [`SelfLogMode::Disabled`].
    pub fn report(&self, error: LogCoreError, timestamp_ns: i64) {
        self.report_message(error.code(), error.to_string(), timestamp_ns);
    }

    /// Records a free-form diagnostic (used for messages §7/§4.4/§4.5
    /// specify literally, e.g. "Unknown Type for OutputHandlers. TypeId: …").
    pub fn report_message(&self, code: i32, message: impl Into<Cow<'static, str>>, timestamp_ns: i64) {
        let mode = self.mode();
        if mode == SelfLogMode::Disabled {
            return;
        }
        let message = message.into();
        let mut inner = self.inner.lock();
        if inner.entries.len() >= inner.capacity {
            inner.entries.remove(0);
        }
        if mode == SelfLogMode::InMemoryAndMirrorToHostErrorChannel {
            if let Some(cb) = inner.host_channel.as_deref() {
                cb(&message);
            }
        }
        inner.entries.push(SelfLogEntry {
            code,
            message,
            timestamp_ns,
        });
    }

    /// Returns (and does not clear) a copy of all currently recorded entries.
    pub fn entries(&self) -> Vec<SelfLogEntry> {
        self.inner.lock().entries.clone()
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    /// Opens a testing expectation scope: each call to `expect` records a
    /// predicate that must be satisfied by some entry recorded while the
    /// scope is open. On `Drop`, unmatched expectations panic the test.
    pub fn expect_scope(self: &Arc<Self>) -> ExpectationScope {
        ExpectationScope {
            log: Arc::clone(self),
            baseline: self.inner.lock().entries.len(),
            expectations: Vec::new(),
        }
    }
}

impl Default for SelfLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Testing expectation scope returned by [`SelfLog::expect_scope`].
///
/// Consumes expected messages against entries recorded after the scope was
/// opened; asserts on `Drop` that every expectation was satisfied exactly
/// once, per §4.9 ("an expectation scope that consumes expected messages
/// and asserts on scope close that all expectations were satisfied").
pub struct ExpectationScope {
    log: Arc<SelfLog>,
    baseline: usize,
    expectations: Vec<Box<dyn Fn(&SelfLogEntry) -> bool>>,
}

impl ExpectationScope {
    /// Registers an expectation matched against any entry recorded after
    /// the scope was opened.
    pub fn expect(&mut self, predicate: impl Fn(&SelfLogEntry) -> bool + 'static) {
        self.expectations.push(Box::new(predicate));
    }

    /// Registers an expectation for a specific error code.
    pub fn expect_code(&mut self, code: i32) {
        self.expect(move |e| e.code == code);
    }
}

impl Drop for ExpectationScope {
    fn drop(&mut self) {
        if self.expectations.is_empty() {
            return;
        }
        let entries = self.log.inner.lock().entries.clone();
        let recorded = &entries[self.baseline.min(entries.len())..];
        let mut satisfied = vec![false; self.expectations.len()];
        for entry in recorded {
            for (i, predicate) in self.expectations.iter().enumerate() {
                if !satisfied[i] && predicate(entry) {
                    satisfied[i] = true;
                }
            }
        }
        let unmet = satisfied.iter().filter(|s| !**s).count();
        if unmet > 0 && !std::thread::panicking() {
            panic!("SelfLog expectation scope closed with {unmet} unmet expectation(s)");
        }
    }
}
