//! Single-producer, single-consumer block ring with overwrite-on-full.
//!
//! One writer pushes blocks of elements; one reader pulls fixed-size blocks
//! of exactly `threshold` elements once it has been told enough data is
//! available.
//!
//! # Design
//! - **Metadata** (`head`, `tail`, empty flag, threshold, lost-chunk counter)
//!   lives behind one mutex. Every read or write of it takes the lock.
//! - **Storage** is a fixed slice of cells copied *outside* the lock. Each
//!   `put`/`get` captures its copy bounds under the lock, copies, then takes
//!   the lock again to publish the new index.
//! - **Writer** never blocks. A block that does not fit overwrites unread
//!   data and counts one lost chunk per call, however many elements spill.
//! - **Reader** waits on the [`ReadySignal`] returned by
//!   `register_threshold`, then calls `get`.
//!
//! # Thread Safety
//! The unlocked copies are only sound because exactly one thread writes and
//! exactly one thread reads: the writer touches `[tail, tail + len)`, the
//! reader touches `[head, head + threshold)`. [`BlockRing::split`] enforces
//! this by ownership: [`RingWriter`] and [`RingReader`] are not `Clone`, and
//! `put`/`get` take `&mut self`.
//!
//! # Lapping Data Race
//! The disjointness above only holds while the writer stays behind the
//! reader. A `put` that overwrites while a `get` is mid-copy writes the same
//! `UnsafeCell` slots the reader is copying, without synchronisation: a data
//! race, reachable from the safe `put`/`get` pair. The overwrite check runs
//! before the writer copies, but nothing stops that copy from overlapping an
//! in-flight read, so such a `get` can return a partially overwritten block.
//! This is the same unsynchronised read/write exposure a seqlock slot has,
//! minus the retry that would discard the torn copy. Keep elements plain
//! `Copy` data with no invalid bit patterns, and pace the writer (see
//! [`RingStats::used`]) when torn blocks are unacceptable.

use crate::error::RingError;
use crate::index::{next_index, used_capacity, will_overwrite};
use crate::signal::ReadySignal;
use std::cell::UnsafeCell;
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// Point-in-time view of a ring's occupancy and loss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingStats {
    pub capacity: usize,
    pub used: usize,
    pub lost_chunks: u64,
    pub ready: bool,
}

/// Fields guarded by the metadata lock.
#[derive(Debug)]
struct RingState {
    /// Oldest unread element. Meaningless while `is_empty`.
    head: usize,
    /// Next slot to write.
    tail: usize,
    /// Disambiguates `head == tail`: empty vs. completely full.
    is_empty: bool,
    /// Minimum used capacity for the ready signal, and the size of every read.
    threshold: usize,
    /// Set once a threshold has been registered.
    notify: bool,
    /// `put` calls that overwrote unread data.
    lost_chunks: u64,
}

impl RingState {
    fn new() -> Self {
        Self {
            head: 0,
            tail: 0,
            is_empty: true,
            threshold: 0,
            notify: false,
            lost_chunks: 0,
        }
    }

    #[inline(always)]
    fn used(&self, capacity: usize) -> usize {
        used_capacity(self.is_empty, self.head, self.tail, capacity)
    }

    /// Brings the signal in line with occupancy. Called with the lock held.
    fn sync_signal(&self, capacity: usize, ready: &ReadySignal) {
        if !self.notify {
            return;
        }
        if self.used(capacity) >= self.threshold {
            ready.set();
        } else {
            ready.clear();
        }
    }
}

struct Shared<T> {
    storage: Box<[UnsafeCell<T>]>,
    state: Mutex<RingState>,
    ready: ReadySignal,
}

// SAFETY: metadata is behind `state`. Storage cells are written only by the
// single `put` caller and read only by the single `get` caller, each within
// bounds captured under `state`. The one exception is a lapping `put` racing
// an in-flight `get` on the same slots (see "Lapping Data Race" above).
unsafe impl<T: Copy + Send> Sync for Shared<T> {}

impl<T: Copy> Shared<T> {
    #[inline(always)]
    fn capacity(&self) -> usize {
        self.storage.len()
    }

    // Every critical section finishes its field updates before anything that
    // could panic, so a poisoned lock still guards consistent metadata.
    fn lock(&self) -> MutexGuard<'_, RingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stats(&self) -> RingStats {
        let state = self.lock();
        RingStats {
            capacity: self.capacity(),
            used: state.used(self.capacity()),
            lost_chunks: state.lost_chunks,
            ready: self.ready.is_set(),
        }
    }

    fn register_threshold(&self, threshold: usize) -> Result<ReadySignal, RingError> {
        let capacity = self.capacity();
        if threshold == 0 || threshold > capacity {
            return Err(RingError::Threshold { threshold, capacity });
        }

        let mut state = self.lock();
        state.threshold = threshold;
        state.notify = true;
        state.sync_signal(capacity, &self.ready);
        debug!(threshold, capacity, "registered read threshold");
        Ok(self.ready.clone())
    }

    fn put(&self, block: &[T]) -> Result<(), RingError> {
        let capacity = self.capacity();
        let len = block.len();
        if len == 0 || len > capacity {
            return Err(RingError::BlockLength { len, capacity });
        }

        let (start, next_tail, wrapped) = {
            let mut state = self.lock();
            let used = state.used(capacity);
            if will_overwrite(len, used, capacity) {
                state.lost_chunks += 1;
                debug!(
                    used,
                    len,
                    capacity,
                    lost_chunks = state.lost_chunks,
                    "put overwrites unread data"
                );
            }
            let (next_tail, wrapped) = next_index(state.tail, len, capacity);
            (state.tail, next_tail, wrapped)
        };

        // SAFETY: `start < capacity` and `len <= capacity`; the split below
        // keeps both copies inside storage. Only the writer copies in.
        unsafe {
            if wrapped {
                let (front, back) = block.split_at(capacity - start);
                self.write_slots(start, front);
                self.write_slots(0, back);
            } else {
                self.write_slots(start, block);
            }
        }

        let mut state = self.lock();
        state.tail = next_tail;
        state.is_empty = false;
        state.sync_signal(capacity, &self.ready);
        trace!(len, head = state.head, tail = state.tail, "put");
        Ok(())
    }

    fn get(&self) -> Result<Vec<T>, RingError> {
        let capacity = self.capacity();

        let (start, count, next_head, wrapped) = {
            let state = self.lock();
            if !state.notify {
                return Err(RingError::NoThreshold);
            }
            let available = state.used(capacity);
            if available < state.threshold {
                return Err(RingError::NotReady {
                    available,
                    threshold: state.threshold,
                });
            }
            let (next_head, wrapped) = next_index(state.head, state.threshold, capacity);
            (state.head, state.threshold, next_head, wrapped)
        };

        let mut out = Vec::with_capacity(count);
        // SAFETY: `out` has room for `count` elements and both copies stay
        // inside storage. Every slot is initialised (storage is filled at
        // construction), so `set_len` exposes only written values.
        unsafe {
            let dst = out.as_mut_ptr();
            if wrapped {
                let front = capacity - start;
                self.read_slots(start, dst, front);
                self.read_slots(0, dst.add(front), count - front);
            } else {
                self.read_slots(start, dst, count);
            }
            out.set_len(count);
        }

        let mut state = self.lock();
        state.head = next_head;
        state.is_empty = state.head == state.tail;
        state.sync_signal(capacity, &self.ready);
        trace!(count, head = state.head, tail = state.tail, "get");
        Ok(out)
    }

    /// Copies `src` into storage starting at slot `at`.
    ///
    /// # Safety
    /// `at + src.len() <= capacity`, and no other thread is accessing those
    /// slots.
    #[inline(always)]
    unsafe fn write_slots(&self, at: usize, src: &[T]) {
        debug_assert!(at + src.len() <= self.capacity());
        unsafe {
            let dst = UnsafeCell::raw_get(self.storage.as_ptr().add(at));
            ptr::copy_nonoverlapping(src.as_ptr(), dst, src.len());
        }
    }

    /// Copies `count` slots starting at `at` into `dst`.
    ///
    /// # Safety
    /// `at + count <= capacity`, `dst` is valid for `count` writes, and no
    /// other thread is writing those slots.
    #[inline(always)]
    unsafe fn read_slots(&self, at: usize, dst: *mut T, count: usize) {
        debug_assert!(at + count <= self.capacity());
        unsafe {
            let src = UnsafeCell::raw_get(self.storage.as_ptr().add(at));
            ptr::copy_nonoverlapping(src as *const T, dst, count);
        }
    }
}

/// A fixed-capacity block ring, owned by a single thread.
///
/// Use it directly when one thread both writes and reads, or call
/// [`split`](Self::split) to hand the two ends to a producer thread and a
/// consumer thread.
///
/// # Type Parameter
/// - `T`: Element type. `Copy` so blocks are moved with bulk copies.
pub struct BlockRing<T> {
    shared: Arc<Shared<T>>,
}

/// Producer end of a split [`BlockRing`].
pub struct RingWriter<T> {
    shared: Arc<Shared<T>>,
}

/// Consumer end of a split [`BlockRing`].
pub struct RingReader<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Copy + Default> BlockRing<T> {
    /// Creates a ring of `capacity` slots, each filled with `T::default()`.
    ///
    /// Storage is allocated once here and never resized. The ring starts
    /// empty with no threshold registered and the ready signal cleared.
    ///
    /// # Errors
    /// [`RingError::ZeroCapacity`] if `capacity == 0`.
    pub fn new(capacity: usize) -> Result<Self, RingError> {
        if capacity == 0 {
            return Err(RingError::ZeroCapacity);
        }
        let storage = (0..capacity).map(|_| UnsafeCell::new(T::default())).collect();
        Ok(Self {
            shared: Arc::new(Shared {
                storage,
                state: Mutex::new(RingState::new()),
                ready: ReadySignal::new(),
            }),
        })
    }
}

impl<T: Copy> BlockRing<T> {
    /// Splits the ring into its producer and consumer ends.
    pub fn split(self) -> (RingWriter<T>, RingReader<T>) {
        let writer = RingWriter {
            shared: Arc::clone(&self.shared),
        };
        let reader = RingReader {
            shared: self.shared,
        };
        (writer, reader)
    }

    /// Registers the read threshold and returns the ready signal.
    ///
    /// The signal is raised whenever used capacity is at least `threshold`,
    /// and every [`get`](Self::get) returns exactly `threshold` elements.
    /// Registering again replaces the previous threshold.
    ///
    /// # Errors
    /// [`RingError::Threshold`] unless `0 < threshold <= capacity`.
    pub fn register_threshold(&mut self, threshold: usize) -> Result<ReadySignal, RingError> {
        self.shared.register_threshold(threshold)
    }

    /// Appends `block`, overwriting unread data if it does not fit.
    ///
    /// # Errors
    /// [`RingError::BlockLength`] unless `0 < block.len() <= capacity`.
    pub fn put(&mut self, block: &[T]) -> Result<(), RingError> {
        self.shared.put(block)
    }

    /// Removes and returns the oldest `threshold` elements.
    ///
    /// # Errors
    /// - [`RingError::NoThreshold`] if no threshold has been registered
    /// - [`RingError::NotReady`] if fewer than `threshold` elements are stored
    pub fn get(&mut self) -> Result<Vec<T>, RingError> {
        self.shared.get()
    }

    pub fn ready(&self) -> ReadySignal {
        self.shared.ready.clone()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    /// Number of elements written but not yet read.
    pub fn len(&self) -> usize {
        self.stats().used
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().is_empty
    }

    /// Registered read threshold, if any.
    pub fn threshold(&self) -> Option<usize> {
        let state = self.shared.lock();
        state.notify.then_some(state.threshold)
    }

    /// Number of `put` calls that overwrote unread data.
    pub fn lost_chunks(&self) -> u64 {
        self.shared.lock().lost_chunks
    }

    pub fn stats(&self) -> RingStats {
        self.shared.stats()
    }
}

impl<T: Copy> RingWriter<T> {
    /// Appends `block`, overwriting unread data if it does not fit.
    ///
    /// Never blocks. See [`BlockRing::put`].
    pub fn put(&mut self, block: &[T]) -> Result<(), RingError> {
        self.shared.put(block)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    pub fn lost_chunks(&self) -> u64 {
        self.shared.lock().lost_chunks
    }

    pub fn stats(&self) -> RingStats {
        self.shared.stats()
    }
}

impl<T: Copy> RingReader<T> {
    /// See [`BlockRing::register_threshold`].
    pub fn register_threshold(&mut self, threshold: usize) -> Result<ReadySignal, RingError> {
        self.shared.register_threshold(threshold)
    }

    /// See [`BlockRing::get`]. Call only after the ready signal is set.
    pub fn get(&mut self) -> Result<Vec<T>, RingError> {
        self.shared.get()
    }

    pub fn ready(&self) -> ReadySignal {
        self.shared.ready.clone()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    pub fn len(&self) -> usize {
        self.stats().used
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().is_empty
    }

    pub fn lost_chunks(&self) -> u64 {
        self.shared.lock().lost_chunks
    }

    pub fn stats(&self) -> RingStats {
        self.shared.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn ring(capacity: usize, threshold: usize) -> (BlockRing<u32>, ReadySignal) {
        let mut ring = BlockRing::new(capacity).unwrap();
        let ready = ring.register_threshold(threshold).unwrap();
        (ring, ready)
    }

    #[test]
    fn handles_are_send() {
        fn assert_send<T: Send>() {}
        assert_send::<BlockRing<u64>>();
        assert_send::<RingWriter<u64>>();
        assert_send::<RingReader<u64>>();
        assert_send::<ReadySignal>();
    }

    #[test]
    fn new_starts_empty() {
        let ring = BlockRing::<u8>::new(10).unwrap();
        assert_eq!(ring.capacity(), 10);
        assert_eq!(ring.len(), 0);
        assert!(ring.is_empty());
        assert_eq!(ring.threshold(), None);
        assert_eq!(ring.lost_chunks(), 0);
        assert!(!ring.ready().is_set());
    }

    #[test]
    fn zero_capacity_rejected() {
        let err = BlockRing::<u8>::new(0).err().unwrap();
        assert_eq!(err, RingError::ZeroCapacity);
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn put_rejects_empty_and_oversized_blocks() {
        let (mut ring, _) = ring(4, 2);
        let err = ring.put(&[1, 2, 3, 4, 5]).unwrap_err();
        assert_eq!(err, RingError::BlockLength { len: 5, capacity: 4 });
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(ring.put(&[]).is_err());

        // A rejected put leaves the ring untouched.
        assert!(ring.is_empty());
        assert_eq!(ring.lost_chunks(), 0);
    }

    #[test]
    fn threshold_bounds() {
        let mut ring = BlockRing::<u8>::new(4).unwrap();
        assert_eq!(
            ring.register_threshold(0).unwrap_err(),
            RingError::Threshold { threshold: 0, capacity: 4 }
        );
        assert!(ring.register_threshold(5).is_err());
        assert!(ring.register_threshold(4).is_ok());
        assert_eq!(ring.threshold(), Some(4));
    }

    #[test]
    fn get_without_threshold_is_precondition_violation() {
        let mut ring = BlockRing::<u8>::new(4).unwrap();
        ring.put(&[1, 2]).unwrap();
        let err = ring.get().unwrap_err();
        assert_eq!(err, RingError::NoThreshold);
        assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
    }

    #[test]
    fn get_below_threshold_is_precondition_violation() {
        let (mut ring, ready) = ring(10, 4);
        ring.put(&[1, 2, 3]).unwrap();
        assert!(!ready.is_set());

        let err = ring.get().unwrap_err();
        assert_eq!(err, RingError::NotReady { available: 3, threshold: 4 });
        assert_eq!(err.kind(), ErrorKind::PreconditionViolation);
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn end_to_end_scenario() {
        let v: Vec<u32> = (100..110).collect();
        let (mut ring, ready) = ring(10, 4);

        ring.put(&v[0..2]).unwrap();
        assert!(!ready.is_set());

        ring.put(&v[2..4]).unwrap();
        assert!(ready.is_set());

        assert_eq!(ring.get().unwrap(), &v[0..4]);
        assert!(!ready.is_set());

        ring.put(&v[4..10]).unwrap();
        assert!(ready.is_set());

        assert_eq!(ring.get().unwrap(), &v[4..8]);
        assert!(!ready.is_set());
        assert_eq!(ring.len(), 2);
        assert_eq!(ring.lost_chunks(), 0);

        // 2 unread + 9 new > 10: one lost chunk, write still lands.
        ring.put(&[7; 9]).unwrap();
        assert_eq!(ring.lost_chunks(), 1);
        // head stays at 8 while tail moves 0 -> 9, so occupancy reads as 1.
        assert_eq!(ring.len(), 1);
        assert!(!ready.is_set());
    }

    #[test]
    fn lost_chunks_counts_calls_not_elements() {
        let (mut ring, _) = ring(4, 4);
        ring.put(&[1, 2, 3, 4]).unwrap();
        ring.put(&[5, 6, 7, 8]).unwrap();
        ring.put(&[9]).unwrap();
        assert_eq!(ring.lost_chunks(), 2);
    }

    #[test]
    fn round_trip_full_capacity() {
        let data: Vec<u32> = (0..8).collect();
        let (mut ring, ready) = ring(8, 8);

        ring.put(&data).unwrap();
        assert_eq!(ring.len(), 8);
        assert!(!ring.is_empty());
        assert!(ready.is_set());

        assert_eq!(ring.get().unwrap(), data);
        assert!(ring.is_empty());
        assert_eq!(ring.len(), 0);
        assert!(!ready.is_set());
        assert_eq!(ring.lost_chunks(), 0);
    }

    #[test]
    fn reads_split_across_wrap_boundary() {
        let (mut ring, _) = ring(5, 3);
        ring.put(&[1, 2, 3, 4]).unwrap();
        assert_eq!(ring.get().unwrap(), vec![1, 2, 3]);

        // tail wraps: slot 4 then slots 0..2
        ring.put(&[5, 6, 7]).unwrap();
        assert_eq!(ring.get().unwrap(), vec![4, 5, 6]);
        assert_eq!(ring.len(), 1);
        assert_eq!(ring.lost_chunks(), 0);
    }

    #[test]
    fn no_loss_while_within_capacity() {
        let (mut ring, ready) = ring(16, 4);
        let mut expected = Vec::new();
        let mut seen = Vec::new();
        let mut next = 0u32;

        for round in 0..50 {
            let len = 1 + round % 4;
            let block: Vec<u32> = (next..next + len as u32).collect();
            next += len as u32;
            expected.extend_from_slice(&block);
            ring.put(&block).unwrap();

            while ready.is_set() {
                seen.extend(ring.get().unwrap());
            }
        }

        assert_eq!(ring.lost_chunks(), 0);
        assert_eq!(seen, expected[..seen.len()]);
        assert!(expected.len() - seen.len() < 4);
    }

    #[test]
    fn registration_reflects_existing_data() {
        let mut ring = BlockRing::<u32>::new(10).unwrap();
        ring.put(&[1, 2, 3, 4, 5]).unwrap();

        let ready = ring.register_threshold(4).unwrap();
        assert!(ready.is_set());

        ring.register_threshold(6).unwrap();
        assert!(!ready.is_set());
    }

    #[test]
    fn overwriting_put_can_lower_signal() {
        let (mut ring, ready) = ring(10, 4);
        ring.put(&[1; 6]).unwrap();
        assert!(ready.is_set());

        // tail laps head: 6 + 6 wraps to an apparent occupancy of 2.
        ring.put(&[2; 6]).unwrap();
        assert_eq!(ring.lost_chunks(), 1);
        assert_eq!(ring.len(), 2);
        assert!(!ready.is_set());
    }

    #[test]
    fn stats_snapshot() {
        let (mut ring, _) = ring(4, 2);
        ring.put(&[1, 2, 3]).unwrap();
        assert_eq!(
            ring.stats(),
            RingStats {
                capacity: 4,
                used: 3,
                lost_chunks: 0,
                ready: true,
            }
        );
    }

    #[test]
    fn split_ends_share_state() {
        let (mut writer, mut reader) = BlockRing::<u16>::new(6).unwrap().split();
        let ready = reader.register_threshold(2).unwrap();

        writer.put(&[10, 20, 30]).unwrap();
        assert!(ready.is_set());
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.get().unwrap(), vec![10, 20]);
        assert!(!reader.ready().is_set());
        assert_eq!(writer.stats().used, 1);

        writer.put(&[1; 6]).unwrap();
        assert_eq!(reader.lost_chunks(), 1);
        assert_eq!(writer.lost_chunks(), 1);
    }
}
