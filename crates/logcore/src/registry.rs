//! `ContextWriterRegistry` (§4.4) — a process-wide `TypeId -> writer`
//! table.
//!
//! Grounded in the pack's `TypeId`-keyed dispatch pattern (a
//! `HashMap<TypeId, Box<dyn Any>>` pipeline stage registry for routing
//! typed values to handlers), adapted here to a `HashMap<TypeId, fn(...)>`
//! of plain function pointers behind the crate's own [`RwSpinLock`] rather
//! than a `Mutex`, since registration races with producer threads formatting
//! messages concurrently but never with itself (registration happens off
//! the hot path, per §4.4).

use crate::spinlock::RwSpinLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result of invoking a registered writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Success,
    Failed,
    UnknownType,
}

/// A registered writer: decodes `data` and appends its textual form to `out`.
pub type WriterFn = fn(&mut String, &[u8]) -> WriteOutcome;

/// Opaque deregistration token returned by [`ContextWriterRegistry::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationToken(u64);

struct Inner {
    writers: HashMap<TypeId, WriterFn>,
    tokens: HashMap<u64, TypeId>,
}

/// Process-wide `TypeId -> writer` table used by the [`crate::Formatter`]
/// to render each argument hole.
pub struct ContextWriterRegistry {
    inner: RwSpinLock<Inner>,
    next_token: AtomicU64,
}

impl ContextWriterRegistry {
    /// An empty registry with no writers registered.
    pub fn empty() -> Self {
        Self {
            inner: RwSpinLock::new(Inner {
                writers: HashMap::new(),
                tokens: HashMap::new(),
            }),
            next_token: AtomicU64::new(1),
        }
    }

    /// A registry pre-populated with the built-in primitive writers (§4.4):
    /// bounded integers, `f32`/`f64`, `bool` (`True`/`False`), `char`, and
    /// fixed-capacity UTF-8 strings of {32,64,128,512,4096} bytes.
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        registry.register(TypeId::of::<i8>(), builtins::write_i8);
        registry.register(TypeId::of::<i16>(), builtins::write_i16);
        registry.register(TypeId::of::<i32>(), builtins::write_i32);
        registry.register(TypeId::of::<i64>(), builtins::write_i64);
        registry.register(TypeId::of::<u8>(), builtins::write_u8);
        registry.register(TypeId::of::<u16>(), builtins::write_u16);
        registry.register(TypeId::of::<u32>(), builtins::write_u32);
        registry.register(TypeId::of::<u64>(), builtins::write_u64);
        registry.register(TypeId::of::<f32>(), builtins::write_f32);
        registry.register(TypeId::of::<f64>(), builtins::write_f64);
        registry.register(TypeId::of::<bool>(), builtins::write_bool);
        registry.register(TypeId::of::<char>(), builtins::write_char);
        registry.register(TypeId::of::<builtins::FixedString<32>>(), builtins::write_fixed_string);
        registry.register(TypeId::of::<builtins::FixedString<64>>(), builtins::write_fixed_string);
        registry.register(TypeId::of::<builtins::FixedString<128>>(), builtins::write_fixed_string);
        registry.register(TypeId::of::<builtins::FixedString<512>>(), builtins::write_fixed_string);
        registry.register(TypeId::of::<builtins::FixedString<4096>>(), builtins::write_fixed_string);
        registry
    }

    /// Registers `writer` for `type_id`, replacing any prior registration.
    /// Returns a token usable with [`Self::deregister`].
    pub fn register(&self, type_id: TypeId, writer: WriterFn) -> RegistrationToken {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.write();
        inner.writers.insert(type_id, writer);
        inner.tokens.insert(token, type_id);
        RegistrationToken(token)
    }

    /// Removes the writer registered under `token`, if it is still the
    /// writer that produced that token (a later re-registration of the
    /// same `TypeId` is unaffected).
    pub fn deregister(&self, token: RegistrationToken) {
        let mut inner = self.inner.write();
        if let Some(type_id) = inner.tokens.remove(&token.0) {
            inner.writers.remove(&type_id);
        }
    }

    /// Invokes the writer registered for `type_id`, or returns
    /// [`WriteOutcome::UnknownType`] when none is registered.
    pub fn write(&self, type_id: TypeId, out: &mut String, data: &[u8]) -> WriteOutcome {
        let inner = self.inner.read();
        match inner.writers.get(&type_id) {
            Some(writer) => writer(out, data),
            None => WriteOutcome::UnknownType,
        }
    }
}

impl Default for ContextWriterRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

mod builtins {
    use super::WriteOutcome;
    use std::fmt::Write as _;
    use std::marker::PhantomData;

    macro_rules! numeric_writer {
        ($name:ident, $ty:ty) => {
            pub(super) fn $name(out: &mut String, data: &[u8]) -> WriteOutcome {
                const SIZE: usize = std::mem::size_of::<$ty>();
                let Some(bytes) = data.get(..SIZE) else {
                    return WriteOutcome::Failed;
                };
                let value = <$ty>::from_le_bytes(bytes.try_into().expect("slice has SIZE bytes"));
                match write!(out, "{value}") {
                    Ok(()) => WriteOutcome::Success,
                    Err(_) => WriteOutcome::Failed,
                }
            }
        };
    }

    numeric_writer!(write_i8, i8);
    numeric_writer!(write_i16, i16);
    numeric_writer!(write_i32, i32);
    numeric_writer!(write_i64, i64);
    numeric_writer!(write_u8, u8);
    numeric_writer!(write_u16, u16);
    numeric_writer!(write_u32, u32);
    numeric_writer!(write_u64, u64);
    numeric_writer!(write_f32, f32);
    numeric_writer!(write_f64, f64);

    pub(super) fn write_bool(out: &mut String, data: &[u8]) -> WriteOutcome {
        match data.first() {
            Some(0) => {
                out.push_str("False");
                WriteOutcome::Success
            }
            Some(_) => {
                out.push_str("True");
                WriteOutcome::Success
            }
            None => WriteOutcome::Failed,
        }
    }

    pub(super) fn write_char(out: &mut String, data: &[u8]) -> WriteOutcome {
        match std::str::from_utf8(data).ok().and_then(|s| s.chars().next()) {
            Some(c) => {
                out.push(c);
                WriteOutcome::Success
            }
            None => WriteOutcome::Failed,
        }
    }

    /// Zero-sized marker distinguishing fixed-capacity string slots by
    /// their declared byte budget, purely for `TypeId` registration.
    pub struct FixedString<const N: usize>(PhantomData<[u8; 0]>);

    pub(super) fn write_fixed_string(out: &mut String, data: &[u8]) -> WriteOutcome {
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        match std::str::from_utf8(&data[..end]) {
            Ok(s) => {
                out.push_str(s);
                WriteOutcome::Success
            }
            Err(_) => WriteOutcome::Failed,
        }
    }
}
