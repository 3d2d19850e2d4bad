//! Index arithmetic for the block ring.
//!
//! Pure functions over ring geometry, called by [`crate::BlockRing`] while it
//! holds its metadata lock:
//! - Advancing a head/tail position by a block length with wraparound
//! - Computing used capacity, with the empty/full `head == tail` aliasing
//!   resolved by an explicit flag
//! - Predicting whether a write will overwrite unread data

/// Advances `current` by `length` slots in a ring of `capacity` slots.
///
/// Returns the new index and whether the advance crossed the end of storage.
/// Reaching `capacity` exactly counts as a wrap: the next index is `0`.
///
/// The caller guarantees `length <= capacity`, so at most one wraparound
/// happens per call.
///
/// # Examples
///
/// ```
/// use lithos_ring::index::next_index;
/// assert_eq!(next_index(0, 2, 10), (2, false));
/// assert_eq!(next_index(7, 3, 10), (0, true));
/// assert_eq!(next_index(7, 5, 10), (2, true));
/// ```
#[inline(always)]
pub fn next_index(current: usize, length: usize, capacity: usize) -> (usize, bool) {
    debug_assert!(length <= capacity, "advance longer than the ring");
    let sum = current + length;
    if sum >= capacity {
        (sum - capacity, true)
    } else {
        (sum, false)
    }
}

/// Number of elements written but not yet read.
///
/// `head == tail` means either "empty" or "completely full"; the indices alone
/// cannot tell which, so the ring carries `is_empty` and passes it in.
///
/// ```text
/// capacity = 10
///
/// head=5, tail=9            → 9 - 5         = 4
/// head=9, tail=1  (wrapped) → 10 - (9 - 1)  = 2
/// head=0, tail=0, !is_empty → 10 - 0        = 10 (full)
/// ```
#[inline(always)]
pub fn used_capacity(is_empty: bool, head: usize, tail: usize, capacity: usize) -> usize {
    if is_empty {
        0
    } else if tail > head {
        tail - head
    } else {
        capacity - (head - tail)
    }
}

/// Returns `true` if writing `write_len` more elements would overwrite
/// unread data.
///
/// ```
/// use lithos_ring::index::will_overwrite;
/// assert!(!will_overwrite(10, 0, 10));
/// assert!(will_overwrite(5, 6, 10));
/// assert!(!will_overwrite(5, 5, 10));
/// ```
#[inline(always)]
pub fn will_overwrite(write_len: usize, used: usize, capacity: usize) -> bool {
    used + write_len > capacity
}
