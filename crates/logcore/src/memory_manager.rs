//! `MemoryManager` (§4.2) — allocates, locks, releases, and retrieves
//! payload buffers out of two symmetric default [`RingBuffer`]s plus an
//! optional overflow ring, growing or shrinking the active default ring in
//! response to a moving average of utilization.
//!
//! The rings here are the raw storage, `MemoryManager` is the policy layer
//! that decides which ring backs a new allocation and when to resize, and
//! every public entry point takes the manager's own [`RwSpinLock`] exactly
//! as §4.2's "Concurrency" paragraph requires.

use crate::config::{MemoryManagerConfig, MAX_DISJOINTED_PAYLOAD_COUNT, MAX_PAYLOAD_SIZE, MIN_PAYLOAD_SIZE};
use crate::error::{LogCoreError, ReleaseOutcome};
use crate::handle::{BufferId, PayloadHandle};
use crate::invariants::debug_assert_live_version_nonzero;
use crate::metrics::{MemoryManagerMetrics, UtilizationWindow};
use crate::ring::RingBuffer;
use crate::selflog::SelfLog;
use crate::spinlock::RwSpinLock;
use std::sync::atomic::Ordering;
use std::sync::Arc;

struct DefaultRing {
    ring: RingBuffer,
    /// Set once this ring has been switched out for a resize and is only
    /// waiting for its last live payload to be released (§4.2: "the
    /// previous ring is freed when its last payload is released").
    retiring: bool,
}

impl DefaultRing {
    fn new(capacity: usize) -> Self {
        Self {
            ring: RingBuffer::new(capacity),
            retiring: false,
        }
    }
}

struct State {
    rings: [DefaultRing; 2],
    /// Index into `rings` of the ring new allocations go to.
    active: usize,
    overflow: Option<RingBuffer>,
    window: UtilizationWindow,
    overflow_used_this_window: bool,
    config: MemoryManagerConfig,
    metrics: MemoryManagerMetrics,
}

impl State {
    fn active_buffer_id(&self) -> BufferId {
        if self.active == 0 {
            BufferId::RingA
        } else {
            BufferId::RingB
        }
    }

    fn ring_for(&self, id: BufferId) -> Option<&RingBuffer> {
        match id {
            BufferId::RingA => Some(&self.rings[0].ring),
            BufferId::RingB => Some(&self.rings[1].ring),
            BufferId::Overflow => self.overflow.as_ref(),
            BufferId::GlobalDecorator => None,
        }
    }

    fn ring_for_mut(&mut self, id: BufferId) -> Option<&mut RingBuffer> {
        match id {
            BufferId::RingA => Some(&mut self.rings[0].ring),
            BufferId::RingB => Some(&mut self.rings[1].ring),
            BufferId::Overflow => self.overflow.as_mut(),
            BufferId::GlobalDecorator => None,
        }
    }
}

/// Owns the default/overflow rings and implements every §4.2 operation.
pub struct MemoryManager {
    state: RwSpinLock<State>,
    self_log: Arc<SelfLog>,
}

impl MemoryManager {
    pub fn new(config: MemoryManagerConfig, self_log: Arc<SelfLog>) -> Self {
        let (config, _reset) = config.validated();
        let overflow = if config.overflow_enabled() {
            Some(RingBuffer::new(config.overflow_buffer_size))
        } else {
            None
        };
        Self {
            state: RwSpinLock::new(State {
                rings: [
                    DefaultRing::new(config.initial_buffer_capacity),
                    DefaultRing::new(config.initial_buffer_capacity),
                ],
                active: 0,
                overflow,
                window: UtilizationWindow::new(config.buffer_sample_count.max(1)),
                overflow_used_this_window: false,
                config,
                metrics: MemoryManagerMetrics::default(),
            }),
            self_log,
        }
    }

    pub fn metrics(&self) -> MemoryManagerMetrics {
        self.state.read().metrics
    }

    pub fn config(&self) -> MemoryManagerConfig {
        self.state.read().config
    }

    fn validate_size(&self, size: usize) -> Result<(), LogCoreError> {
        if !(MIN_PAYLOAD_SIZE..=MAX_PAYLOAD_SIZE).contains(&size) {
            self.self_log
                .report(LogCoreError::FailedToAllocatePayloadBecauseOfItsSize, 0);
            return Err(LogCoreError::FailedToAllocatePayloadBecauseOfItsSize);
        }
        Ok(())
    }

    /// Allocates `size` bytes from the active default ring, falling back to
    /// the overflow ring on failure.
    pub fn allocate_payload_buffer(&self, size: usize) -> PayloadHandle {
        if self.validate_size(size).is_err() {
            return PayloadHandle::INVALID;
        }
        let mut state = self.state.write();
        let active = state.active;
        let active_id = state.active_buffer_id();
        if let Some(alloc) = state.rings[active].ring.allocate(size) {
            debug_assert_live_version_nonzero!(alloc.version);
            state.metrics.allocations += 1;
            return PayloadHandle::new(active_id, alloc.header_offset as u32, alloc.version, false);
        }
        if let Some(overflow) = state.overflow.as_mut() {
            if let Some(alloc) = overflow.allocate(size) {
                state.metrics.allocations += 1;
                state.metrics.overflow_allocations += 1;
                state.overflow_used_this_window = true;
                return PayloadHandle::new(BufferId::Overflow, alloc.header_offset as u32, alloc.version, false);
            }
        }
        self.self_log
            .report(LogCoreError::FailedToAllocatePayloadBecauseOfItsSize, 0);
        PayloadHandle::INVALID
    }

    /// Allocates a disjointed payload: a head block whose payload is an
    /// array of `sizes.len()` child handles, plus each child.
    pub fn allocate_disjointed_buffer(&self, sizes: &[usize]) -> Result<(PayloadHandle, Vec<PayloadHandle>), LogCoreError> {
        if sizes.is_empty() || sizes.len() > MAX_DISJOINTED_PAYLOAD_COUNT {
            self.self_log.report(LogCoreError::FailedToCreateDisjointedBuffer, 0);
            return Err(LogCoreError::FailedToCreateDisjointedBuffer);
        }
        for &size in sizes {
            self.validate_size(size)?;
        }

        let head_size = sizes.len() * std::mem::size_of::<u64>();
        let head = self.allocate_payload_buffer(head_size.max(MIN_PAYLOAD_SIZE));
        if head.is_invalid() {
            return Err(LogCoreError::FailedToCreateDisjointedBuffer);
        }

        let mut children = Vec::with_capacity(sizes.len());
        for &size in sizes {
            let child = self.allocate_payload_buffer(size);
            if child.is_invalid() {
                for c in &children {
                    self.release_payload_buffer(*c, true);
                }
                self.release_payload_buffer(head, true);
                self.self_log.report(LogCoreError::FailedToCreateDisjointedBuffer, 0);
                return Err(LogCoreError::FailedToCreateDisjointedBuffer);
            }
            children.push(child);
        }

        self.mark_disjointed_head(head);
        self.write_disjointed_children(head, &children);
        Ok((head, children))
    }

    /// Builds a disjointed payload re-using already-allocated handles.
    pub fn create_disjointed_from_existing(&self, handles: &[PayloadHandle]) -> Result<PayloadHandle, LogCoreError> {
        if handles.is_empty() || handles.len() > MAX_DISJOINTED_PAYLOAD_COUNT {
            self.self_log.report(LogCoreError::FailedToCreateDisjointedBuffer, 0);
            return Err(LogCoreError::FailedToCreateDisjointedBuffer);
        }
        for h in handles {
            if h.is_invalid() || h.is_disjointed() {
                self.self_log.report(LogCoreError::FailedToCreateDisjointedBuffer, 0);
                return Err(LogCoreError::FailedToCreateDisjointedBuffer);
            }
        }
        let head_size = handles.len() * std::mem::size_of::<u64>();
        let head = self.allocate_payload_buffer(head_size.max(MIN_PAYLOAD_SIZE));
        if head.is_invalid() {
            return Err(LogCoreError::FailedToCreateDisjointedBuffer);
        }
        self.mark_disjointed_head(head);
        self.write_disjointed_children(head, handles);
        Ok(head)
    }

    fn mark_disjointed_head(&self, head: PayloadHandle) {
        let state = self.state.read();
        if let Some(ring) = state.ring_for(head.buffer_id().expect("valid handle")) {
            // SAFETY: `head` was just allocated by this manager.
            unsafe { ring.header_at(head.offset() as usize) }.mark_disjointed_head();
        }
    }

    fn write_disjointed_children(&self, head: PayloadHandle, children: &[PayloadHandle]) {
        let mut state = self.state.write();
        if let Some(ring) = state.ring_for_mut(head.buffer_id().expect("valid handle")) {
            let bytes_len = children.len() * std::mem::size_of::<u64>();
            // SAFETY: the head block was sized for exactly this payload, and
            // the write lock excludes every other reader/writer of this ring.
            let slice = unsafe { ring.payload_slice_mut(head.offset() as usize, bytes_len) };
            for (i, child) in children.iter().enumerate() {
                slice[i * 8..i * 8 + 8].copy_from_slice(&child.raw().to_le_bytes());
            }
        }
    }

    fn read_disjointed_children(&self, head: PayloadHandle) -> Result<Vec<PayloadHandle>, LogCoreError> {
        let state = self.state.read();
        let ring = state
            .ring_for(head.buffer_id().ok_or(LogCoreError::CorruptedDecorationInfo)?)
            .ok_or(LogCoreError::CorruptedDecorationInfo)?;
        // SAFETY: `head` is validated live by the caller before this is reached.
        let header = unsafe { ring.header_at(head.offset() as usize) };
        if !header.is_disjointed_head() {
            return Err(LogCoreError::CorruptedDecorationInfo);
        }
        let count = header.size as usize / std::mem::size_of::<u64>();
        // SAFETY: see above; length matches what was written at allocation.
        let slice = unsafe { ring.payload_slice(head.offset() as usize, count * 8) };
        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let raw = u64::from_le_bytes(slice[i * 8..i * 8 + 8].try_into().unwrap());
            out.push(PayloadHandle::from_raw(raw));
        }
        Ok(out)
    }

    /// Increments the lock count on `h`, returning a capability token
    /// (the handle itself, with its `locked` bit set).
    pub fn lock_payload_buffer(&self, h: PayloadHandle) -> Result<PayloadHandle, LogCoreError> {
        let state = self.state.read();
        let ring = state
            .ring_for(h.buffer_id().ok_or(LogCoreError::FailedToLockPayloadBuffer)?)
            .ok_or(LogCoreError::FailedToLockPayloadBuffer)?;
        // SAFETY: offset is only ever produced by this manager's `allocate`.
        let header = unsafe { ring.header_at(h.offset() as usize) };
        if header.version.load(Ordering::Acquire) != h.version() {
            return Err(LogCoreError::FailedToLockPayloadBuffer);
        }
        header.lock_count.fetch_add(1, Ordering::AcqRel);
        Ok(h.with_locked(true))
    }

    /// Decrements the lock count on `h`. `ctx` is accepted for symmetry
    /// with callers that carry a lock token but is otherwise unused: the
    /// lock count itself is the sole source of truth.
    pub fn unlock_payload_buffer(&self, h: PayloadHandle, _ctx: ()) -> Result<(), LogCoreError> {
        let state = self.state.read();
        let ring = state
            .ring_for(h.buffer_id().ok_or(LogCoreError::FailedToLockPayloadBuffer)?)
            .ok_or(LogCoreError::FailedToLockPayloadBuffer)?;
        let header = unsafe { ring.header_at(h.offset() as usize) };
        if header.version.load(Ordering::Acquire) != h.version() {
            return Err(LogCoreError::FailedToLockPayloadBuffer);
        }
        header
            .lock_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some(c.saturating_sub(1)))
            .ok();
        Ok(())
    }

    fn handle_is_live(state: &State, h: PayloadHandle) -> bool {
        match h.buffer_id().and_then(|id| state.ring_for(id)) {
            Some(ring) => unsafe { ring.header_at(h.offset() as usize) }
                .version
                .load(Ordering::Acquire)
                == h.version(),
            None => false,
        }
    }

    /// Releases `h`. §4.2's precise precedence: locked-state (unless
    /// `force`) wins over disjointed-child inconsistency.
    pub fn release_payload_buffer(&self, h: PayloadHandle, force: bool) -> ReleaseOutcome {
        if h.is_invalid() {
            return ReleaseOutcome::InvalidHandle;
        }
        let state = self.state.read();
        if !Self::handle_is_live(&state, h) {
            return ReleaseOutcome::InvalidHandle;
        }
        let Some(id) = h.buffer_id() else {
            return ReleaseOutcome::InvalidHandle;
        };
        let ring = state.ring_for(id).expect("validated above");
        let header = unsafe { ring.header_at(h.offset() as usize) };
        let locked = header.lock_count.load(Ordering::Acquire) > 0;
        if locked && !force {
            return ReleaseOutcome::BufferLocked;
        }

        let is_head = header.is_disjointed_head();
        drop(state);

        let mut forced = locked;
        if is_head {
            let children = match self.read_disjointed_children(h) {
                Ok(c) => c,
                Err(_) => return ReleaseOutcome::DisjointedPayloadReleaseFailed,
            };
            let mut all_valid = true;
            {
                let state = self.state.read();
                for child in &children {
                    if !Self::handle_is_live(&state, *child) {
                        all_valid = false;
                    }
                }
            }
            if !all_valid && !force {
                return ReleaseOutcome::DisjointedPayloadReleaseFailed;
            }
            if !all_valid {
                forced = true;
            }
            for child in &children {
                let state = self.state.read();
                if Self::handle_is_live(&state, *child) {
                    drop(state);
                    self.release_one(*child);
                }
            }
        }

        self.release_one(h);
        if forced {
            ReleaseOutcome::ForcedRelease
        } else {
            ReleaseOutcome::Success
        }
    }

    fn release_one(&self, h: PayloadHandle) {
        let mut state = self.state.write();
        if let Some(ring) = h.buffer_id().and_then(|id| state.ring_for(id)) {
            let live = unsafe { ring.header_at(h.offset() as usize) }
                .version
                .load(Ordering::Acquire)
                == h.version();
            if live {
                unsafe { ring.header_at(h.offset() as usize) }
                    .version
                    .store(0, Ordering::Release);
            }
        }
        state.metrics.releases += 1;
    }

    /// Cancellation hook (§5): force-releases every handle in `handles`.
    pub fn force_release_payloads(&self, handles: &[PayloadHandle]) {
        for h in handles {
            self.release_payload_buffer(*h, true);
        }
    }

    /// Copies out the live payload bytes for `h`.
    pub fn retrieve_payload_buffer(&self, h: PayloadHandle) -> Result<Vec<u8>, LogCoreError> {
        let state = self.state.read();
        let id = h.buffer_id().ok_or(LogCoreError::UnableToRetrieveSimpleMessageBuffer)?;
        let ring = state.ring_for(id).ok_or(LogCoreError::UnableToRetrieveSimpleMessageBuffer)?;
        let header = unsafe { ring.header_at(h.offset() as usize) };
        if header.version.load(Ordering::Acquire) != h.version() {
            return Err(LogCoreError::UnableToRetrieveSimpleMessageBuffer);
        }
        let len = header.size as usize;
        Ok(unsafe { ring.payload_slice(h.offset() as usize, len) }.to_vec())
    }

    /// Retrieves the `i`th child of a disjointed payload headed by `head`.
    pub fn retrieve_disjointed_payload_buffer(&self, head: PayloadHandle, i: usize) -> Result<Vec<u8>, LogCoreError> {
        let children = self
            .read_disjointed_children(head)
            .map_err(|_| LogCoreError::UnableToRetrieveDisjointedMessageBuffer)?;
        let child = children
            .get(i)
            .ok_or(LogCoreError::UnableToRetrieveValidContextArgumentIndex)?;
        self.retrieve_payload_buffer(*child)
            .map_err(|_| LogCoreError::UnableToRetrieveValidPayloadsFromDisjointedMessageBuffer)
    }

    /// Reclaims released blocks, samples utilization, and grows/shrinks the
    /// active default ring per §4.2's moving-average policy.
    pub fn update(&self) {
        let mut state = self.state.write();

        for i in 0..2 {
            state.rings[i].ring.reclaim();
        }
        if let Some(overflow) = state.overflow.as_mut() {
            overflow.reclaim();
        }

        if !state.config.resize_enabled() {
            state.overflow_used_this_window = false;
            return;
        }

        let active = state.active;
        let utilization = {
            let ring = &state.rings[active].ring;
            if ring.capacity() == 0 {
                0.0
            } else {
                ring.bytes_allocated() as f64 / ring.capacity() as f64
            }
        };
        state.window.push(utilization);
        let overflow_used = state.overflow_used_this_window;
        state.overflow_used_this_window = false;

        let grow_threshold = state.config.buffer_grow_threshold;
        let shrink_threshold = state.config.buffer_shrink_threshold;
        let should_grow = overflow_used || (state.window.is_full() && state.window.average() > grow_threshold);
        let should_shrink = !overflow_used && shrink_threshold > 0.0 && state.window.is_full() && state.window.average() < shrink_threshold;

        if should_grow || should_shrink {
            let current_capacity = state.rings[active].ring.capacity();
            let new_capacity = if should_grow {
                ((current_capacity as f64) * state.config.buffer_grow_factor) as usize
            } else {
                ((current_capacity as f64) * state.config.buffer_shrink_factor) as usize
            }
            .max(MIN_PAYLOAD_SIZE);

            let inactive = 1 - active;
            if state.rings[inactive].ring.is_empty() {
                state.rings[inactive] = DefaultRing::new(new_capacity);
                state.rings[active].retiring = true;
                state.active = inactive;
                if should_grow {
                    state.metrics.grows += 1;
                } else {
                    state.metrics.shrinks += 1;
                }
            }
        }

        // A retiring ring with nothing left allocated is fully defragmented
        // and can rejoin the pool as an ordinary inactive ring.
        for ring in &mut state.rings {
            if ring.retiring && ring.ring.is_empty() {
                ring.retiring = false;
            }
        }

        let active = state.active;
        state.metrics.current_capacity = state.rings[active].ring.capacity();
        state.metrics.bytes_allocated = state.rings[active].ring.bytes_allocated();
    }
}
