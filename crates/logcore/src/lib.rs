//! logcore — a high-throughput, low-allocation structured logging core:
//! ring-buffer-backed memory management, a Serilog-style message-template
//! parser and formatter, and the spin-locked concurrency primitives tying
//! them together.
//!
//! # Example
//!
//! ```
//! use logcore::{ContextWriterRegistry, MemoryManager, MemoryManagerConfig, SelfLog};
//! use std::sync::Arc;
//!
//! let self_log = Arc::new(SelfLog::new());
//! let manager = MemoryManager::new(MemoryManagerConfig::default(), self_log);
//! let handle = manager.allocate_payload_buffer(64);
//! assert!(!handle.is_invalid());
//! manager.release_payload_buffer(handle, false);
//! ```

mod backoff;
mod block;
mod config;
mod controller;
mod dispatch;
mod error;
mod formatter;
mod global;
mod handle;
mod invariants;
mod memory_manager;
mod metrics;
mod registry;
mod ring;
mod selflog;
mod spinlock;
mod template;

pub use backoff::Backoff;
pub use block::PayloadBlockHeader;
pub use config::{MemoryManagerConfig, ResetFields, HIGH_THROUGHPUT_CONFIG, LOW_LATENCY_CONFIG};
pub use controller::{DecorateHandlerFn, DecoratorEditGuard, LogController};
pub use dispatch::{DispatchQueue, EnqueueError, LogMessage};
pub use error::{LogCoreError, ReleaseOutcome};
pub use formatter::{format_disjointed, format_into, ContextArgument};
pub use global::{context_writer_registry, global_decorators, init, shutdown, GlobalDecorators};
pub use handle::{BufferId, PayloadHandle};
pub use memory_manager::MemoryManager;
pub use metrics::{MemoryManagerMetrics, UtilizationWindow};
pub use registry::{ContextWriterRegistry, RegistrationToken, WriteOutcome, WriterFn};
pub use ring::{Allocation, RingBuffer};
pub use selflog::{ExpectationScope, SelfLog, SelfLogEntry, SelfLogMode};
pub use spinlock::{RwSpinLock, RwSpinLockReadGuard, RwSpinLockWriteGuard, SpinLock, SpinLockGuard};
pub use template::{ArgumentInfo, ArgumentRef, Destructuring, Span, TemplateParser, Token};
