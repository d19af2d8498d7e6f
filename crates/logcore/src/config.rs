//! `MemoryManager` configuration (§4.2), validated field-by-field.
//!
//! A `Copy` struct plus named presets (`LOW_LATENCY_CONFIG`/
//! `HIGH_THROUGHPUT_CONFIG`), but construction never panics: each field is
//! independently clamped or reset to its default by
//! [`MemoryManagerConfig::validated`], since partial recovery from a bad
//! config is required rather than refusing to start.

/// Minimum payload size `MemoryManager` will allocate, in bytes.
pub const MIN_PAYLOAD_SIZE: usize = 8;
/// Maximum payload size `MemoryManager` will allocate, in bytes.
pub const MAX_PAYLOAD_SIZE: usize = 1 << 20;
/// Maximum number of children a disjointed payload may have.
pub const MAX_DISJOINTED_PAYLOAD_COUNT: usize = 256;

const MIN_RING_CAPACITY: usize = 1024;
const MAX_RING_CAPACITY: usize = 1 << 30;
const MAX_SAMPLE_COUNT: usize = 4096;

/// Which fields `validate()` had to reset, for diagnostics/tests.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResetFields {
    pub initial_buffer_capacity: bool,
    pub buffer_sample_count: bool,
    pub buffer_grow_threshold: bool,
    pub buffer_shrink_threshold: bool,
    pub buffer_grow_factor: bool,
    pub buffer_shrink_factor: bool,
    pub overflow_buffer_size: bool,
    pub dispatch_queue_size: bool,
}

impl ResetFields {
    pub fn any(&self) -> bool {
        self.initial_buffer_capacity
            || self.buffer_sample_count
            || self.buffer_grow_threshold
            || self.buffer_shrink_threshold
            || self.buffer_grow_factor
            || self.buffer_shrink_factor
            || self.overflow_buffer_size
            || self.dispatch_queue_size
    }
}

/// Recognized `MemoryManager` configuration (§4.2).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryManagerConfig {
    /// Initial default ring size. Out-of-range resets to
    /// [`Self::default`]'s value.
    pub initial_buffer_capacity: usize,
    /// Moving-average window size. `0` disables automatic resizing.
    pub buffer_sample_count: usize,
    /// Average-utilization grow threshold, `0.0` disables growing.
    pub buffer_grow_threshold: f64,
    /// Average-utilization shrink threshold, `0.0` disables shrinking.
    pub buffer_shrink_threshold: f64,
    /// Growth multiplier, must be `> 1.0`.
    pub buffer_grow_factor: f64,
    /// Shrink multiplier, must be in `(0.0, 1.0)`.
    pub buffer_shrink_factor: f64,
    /// Overflow ring size; `0` disables overflow.
    pub overflow_buffer_size: usize,
    /// Bounded `DispatchQueue` capacity (message slots).
    pub dispatch_queue_size: usize,
}

impl MemoryManagerConfig {
    /// Validates `self` field-by-field, resetting out-of-range fields to
    /// their default and reporting which ones were reset. Valid fields are
    /// preserved untouched.
    pub fn validated(mut self) -> (Self, ResetFields) {
        let default = Self::default();
        let mut reset = ResetFields::default();

        if !(MIN_RING_CAPACITY..=MAX_RING_CAPACITY).contains(&self.initial_buffer_capacity) {
            self.initial_buffer_capacity = default.initial_buffer_capacity;
            reset.initial_buffer_capacity = true;
        }
        if self.buffer_sample_count > MAX_SAMPLE_COUNT {
            self.buffer_sample_count = default.buffer_sample_count;
            reset.buffer_sample_count = true;
        }
        if !(0.0..=1.0).contains(&self.buffer_grow_threshold) || self.buffer_grow_threshold.is_nan() {
            self.buffer_grow_threshold = default.buffer_grow_threshold;
            reset.buffer_grow_threshold = true;
        }
        if !(0.0..=1.0).contains(&self.buffer_shrink_threshold) || self.buffer_shrink_threshold.is_nan() {
            self.buffer_shrink_threshold = default.buffer_shrink_threshold;
            reset.buffer_shrink_threshold = true;
        }
        if !(self.buffer_grow_factor > 1.0) || !self.buffer_grow_factor.is_finite() {
            self.buffer_grow_factor = default.buffer_grow_factor;
            reset.buffer_grow_factor = true;
        }
        if !(self.buffer_shrink_factor > 0.0 && self.buffer_shrink_factor < 1.0) {
            self.buffer_shrink_factor = default.buffer_shrink_factor;
            reset.buffer_shrink_factor = true;
        }
        if self.overflow_buffer_size > MAX_RING_CAPACITY {
            self.overflow_buffer_size = default.overflow_buffer_size;
            reset.overflow_buffer_size = true;
        }
        if self.dispatch_queue_size == 0 || self.dispatch_queue_size > (1 << 20) {
            self.dispatch_queue_size = default.dispatch_queue_size;
            reset.dispatch_queue_size = true;
        }

        // "If both thresholds are 0, buffer_sample_count is forced to 0."
        if self.buffer_grow_threshold == 0.0 && self.buffer_shrink_threshold == 0.0 {
            self.buffer_sample_count = 0;
        }

        (self, reset)
    }

    #[inline]
    pub fn resize_enabled(&self) -> bool {
        self.buffer_sample_count > 0
    }

    #[inline]
    pub fn overflow_enabled(&self) -> bool {
        self.overflow_buffer_size > 0
    }
}

impl Default for MemoryManagerConfig {
    fn default() -> Self {
        Self {
            initial_buffer_capacity: 64 * 1024,
            buffer_sample_count: 16,
            buffer_grow_threshold: 0.8,
            buffer_shrink_threshold: 0.2,
            buffer_grow_factor: 2.0,
            buffer_shrink_factor: 0.5,
            overflow_buffer_size: 0,
            dispatch_queue_size: 4096,
        }
    }
}

/// Tuned for small, latency-sensitive interactive loggers: resize disabled,
/// a small default ring, no overflow.
pub const LOW_LATENCY_CONFIG: MemoryManagerConfig = MemoryManagerConfig {
    initial_buffer_capacity: MIN_RING_CAPACITY * 4,
    buffer_sample_count: 0,
    buffer_grow_threshold: 0.0,
    buffer_shrink_threshold: 0.0,
    buffer_grow_factor: 2.0,
    buffer_shrink_factor: 0.5,
    overflow_buffer_size: 0,
    dispatch_queue_size: 1024,
};

/// Tuned for batch/offline high-volume logging: large default ring,
/// overflow enabled, automatic resizing on.
pub const HIGH_THROUGHPUT_CONFIG: MemoryManagerConfig = MemoryManagerConfig {
    initial_buffer_capacity: 4 * 1024 * 1024,
    buffer_sample_count: 32,
    buffer_grow_threshold: 0.75,
    buffer_shrink_threshold: 0.1,
    buffer_grow_factor: 2.0,
    buffer_shrink_factor: 0.5,
    overflow_buffer_size: 1024 * 1024,
    dispatch_queue_size: 1 << 16,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_fields_reset_independently() {
        let cfg = MemoryManagerConfig {
            initial_buffer_capacity: 4, // too small
            buffer_grow_threshold: 2.0, // out of [0,1]
            ..MemoryManagerConfig::default()
        };
        let (validated, reset) = cfg.validated();
        assert!(reset.initial_buffer_capacity);
        assert!(reset.buffer_grow_threshold);
        assert!(!reset.buffer_shrink_threshold);
        assert_eq!(validated.dispatch_queue_size, cfg.dispatch_queue_size);
    }

    #[test]
    fn both_thresholds_zero_forces_sample_count_zero() {
        let cfg = MemoryManagerConfig {
            buffer_grow_threshold: 0.0,
            buffer_shrink_threshold: 0.0,
            buffer_sample_count: 10,
            ..MemoryManagerConfig::default()
        };
        let (validated, _) = cfg.validated();
        assert_eq!(validated.buffer_sample_count, 0);
        assert!(!validated.resize_enabled());
    }
}
