//! Debug assertion macros checking structural invariants across the crate.
//!
//! Zero overhead in release builds (`#[cfg(debug_assertions)]` only).

/// `0 ≤ tail, head ≤ capacity`.
macro_rules! debug_assert_ring_bounds {
    ($head:expr, $tail:expr, $capacity:expr) => {
        debug_assert!(
            $head <= $capacity && $tail <= $capacity,
            "ring control triple out of bounds: head={} tail={} capacity={}",
            $head,
            $tail,
            $capacity
        )
    };
}

/// A ring with zero bytes allocated must be fully defragmented: head, tail,
/// and fence all describe an empty ring.
macro_rules! debug_assert_empty_ring_defragmented {
    ($bytes_allocated:expr, $head:expr, $tail:expr) => {
        debug_assert!(
            $bytes_allocated != 0 || $head == $tail,
            "empty ring not defragmented: head={} tail={}",
            $head,
            $tail
        )
    };
}

/// A live `PayloadHandle`'s version must never be the reclaim sentinel.
macro_rules! debug_assert_live_version_nonzero {
    ($version:expr) => {
        debug_assert!($version != 0, "handle carries the reclaimed-block sentinel version 0")
    };
}

/// A handle's `offset` must fit the 28-bit budget before being packed.
macro_rules! debug_assert_offset_in_budget {
    ($offset:expr, $mask:expr) => {
        debug_assert!(
            $offset <= $mask,
            "offset {} exceeds PayloadHandle's packed budget (mask {})",
            $offset,
            $mask
        )
    };
}

/// `DispatchQueue`'s tracked length must never exceed its slot count.
macro_rules! debug_assert_queue_len_bounded {
    ($len:expr, $capacity:expr) => {
        debug_assert!(
            $len <= $capacity,
            "dispatch queue length {} exceeds capacity {}",
            $len,
            $capacity
        )
    };
}

pub(crate) use debug_assert_empty_ring_defragmented;
pub(crate) use debug_assert_live_version_nonzero;
pub(crate) use debug_assert_offset_in_budget;
pub(crate) use debug_assert_queue_len_bounded;
pub(crate) use debug_assert_ring_bounds;
