//! Lock-free ring buffer for audio bytes
//!
//! This implements a single-producer single-consumer (SPSC) circular byte
//! buffer optimized for the real-time playback path: wait-free, allocation
//! happens once at construction, and all wraparound arithmetic is a bitwise
//! AND against a power-of-two capacity.
//!
//! Field ownership is the whole synchronization story. Only the producer
//! advances `unsubmitted_head` (via `write`/`write_silence`) and only the
//! consumer advances `submitted_head` (via `read`); the shared byte counters
//! are atomics updated with a release/acquire handshake so each side observes
//! the other's copies before trusting the space they guard. Multiple
//! concurrent producers or consumers are not supported and must be serialized
//! by the caller.

use crossbeam::utils::CachePadded;
use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Smallest power of two greater than or equal to `min_bytes`.
///
/// Capacities are constrained to powers of two so cursor wraparound can use a
/// mask instead of a modulo on the real-time path.
pub fn capacity_for(min_bytes: usize) -> usize {
    min_bytes.max(1).next_power_of_two()
}

/// SPSC circular byte buffer with power-of-two capacity
///
/// Invariant: `free_bytes + unsubmitted_bytes == capacity` between calls.
/// The region `[submitted_head, submitted_head + unsubmitted_bytes)` modulo
/// capacity holds valid not-yet-consumed audio; the complement is writable.
pub struct RingBuffer {
    data: Box<[UnsafeCell<u8>]>,
    mask: usize,

    // Counters and cursors live on their own cache lines so the producer and
    // the real-time consumer don't false-share.
    free_bytes: CachePadded<AtomicUsize>,
    unsubmitted_bytes: CachePadded<AtomicUsize>,
    /// Read cursor, consumer-owned
    submitted_head: CachePadded<AtomicUsize>,
    /// Write cursor, producer-owned
    unsubmitted_head: CachePadded<AtomicUsize>,
}

// Safety: the SPSC ownership discipline above. Raw byte cells are only
// touched by the single producer (write side) and single consumer (read
// side), each gated by the acquire/release counter handshake.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Create a ring buffer of exactly `capacity` bytes.
    ///
    /// `capacity` must be a non-zero power of two.
    pub fn new(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "ring buffer capacity must be a power of two"
        );

        let data: Vec<UnsafeCell<u8>> = (0..capacity).map(|_| UnsafeCell::new(0)).collect();

        Self {
            data: data.into_boxed_slice(),
            mask: capacity - 1,
            free_bytes: CachePadded::new(AtomicUsize::new(capacity)),
            unsubmitted_bytes: CachePadded::new(AtomicUsize::new(0)),
            submitted_head: CachePadded::new(AtomicUsize::new(0)),
            unsubmitted_head: CachePadded::new(AtomicUsize::new(0)),
        }
    }

    /// Create a ring buffer of at least `min_bytes`, rounded up to the next
    /// power of two
    pub fn with_min_len(min_bytes: usize) -> Self {
        Self::new(capacity_for(min_bytes))
    }

    /// Total capacity in bytes
    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes currently writable by the producer
    #[inline]
    pub fn free_bytes(&self) -> usize {
        self.free_bytes.load(Ordering::Acquire)
    }

    /// Bytes queued and not yet consumed
    #[inline]
    pub fn unsubmitted_bytes(&self) -> usize {
        self.unsubmitted_bytes.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.unsubmitted_bytes() == 0
    }

    /// Occupancy as a fraction of capacity (for monitoring)
    pub fn fill_level(&self) -> f32 {
        self.unsubmitted_bytes() as f32 / self.capacity() as f32
    }

    /// Write up to `src.len()` bytes at the unsubmitted head (producer side).
    ///
    /// Copies `min(src.len(), free_bytes)` in at most two contiguous
    /// segments; anything beyond the free space is not copied. Never blocks.
    /// Returns the number of bytes actually written.
    #[inline]
    pub fn write(&self, src: &[u8]) -> usize {
        let free = self.free_bytes.load(Ordering::Acquire);
        let to_write = src.len().min(free);
        if to_write == 0 {
            return 0;
        }

        let head = self.unsubmitted_head.load(Ordering::Relaxed);
        let first = to_write.min(self.capacity() - head);
        unsafe {
            let base = self.data.as_ptr() as *mut u8;
            ptr::copy_nonoverlapping(src.as_ptr(), base.add(head), first);
            ptr::copy_nonoverlapping(src.as_ptr().add(first), base, to_write - first);
        }

        self.unsubmitted_head
            .store((head + to_write) & self.mask, Ordering::Relaxed);
        self.commit_write(to_write);
        to_write
    }

    /// Write up to `len` bytes of `fill` at the unsubmitted head (producer
    /// side). Same truncation and wraparound behavior as `write`; used for
    /// the silence pre-roll.
    #[inline]
    pub fn write_silence(&self, len: usize, fill: u8) -> usize {
        let free = self.free_bytes.load(Ordering::Acquire);
        let to_write = len.min(free);
        if to_write == 0 {
            return 0;
        }

        let head = self.unsubmitted_head.load(Ordering::Relaxed);
        let first = to_write.min(self.capacity() - head);
        unsafe {
            let base = self.data.as_ptr() as *mut u8;
            ptr::write_bytes(base.add(head), fill, first);
            ptr::write_bytes(base, fill, to_write - first);
        }

        self.unsubmitted_head
            .store((head + to_write) & self.mask, Ordering::Relaxed);
        self.commit_write(to_write);
        to_write
    }

    /// Read up to `dst.len()` bytes from the submitted head (consumer side).
    ///
    /// Copies `min(dst.len(), unsubmitted_bytes)` in at most two contiguous
    /// segments, then returns the consumed span to the free region. Never
    /// blocks; returns 0 immediately when the buffer is empty.
    #[inline]
    pub fn read(&self, dst: &mut [u8]) -> usize {
        let queued = self.unsubmitted_bytes.load(Ordering::Acquire);
        let to_read = dst.len().min(queued);
        if to_read == 0 {
            return 0;
        }

        let head = self.submitted_head.load(Ordering::Relaxed);
        let first = to_read.min(self.capacity() - head);
        unsafe {
            let base = self.data.as_ptr() as *const u8;
            ptr::copy_nonoverlapping(base.add(head), dst.as_mut_ptr(), first);
            ptr::copy_nonoverlapping(base, dst.as_mut_ptr().add(first), to_read - first);
        }

        self.submitted_head
            .store((head + to_read) & self.mask, Ordering::Relaxed);
        self.unsubmitted_bytes.fetch_sub(to_read, Ordering::Relaxed);
        // Release on free_bytes so the producer's acquire sees our copies
        // done before it overwrites the span.
        self.free_bytes.fetch_add(to_read, Ordering::Release);
        to_read
    }

    // Publish `n` written bytes to the consumer. Release on the queued
    // counter so the consumer's acquire load sees the byte copies first.
    #[inline]
    fn commit_write(&self, n: usize) {
        self.free_bytes.fetch_sub(n, Ordering::Relaxed);
        self.unsubmitted_bytes.fetch_add(n, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_capacity_for() {
        assert_eq!(capacity_for(0), 1);
        assert_eq!(capacity_for(1), 1);
        assert_eq!(capacity_for(2), 2);
        assert_eq!(capacity_for(3), 4);
        assert_eq!(capacity_for(1024), 1024);
        assert_eq!(capacity_for(1025), 2048);
        assert_eq!(capacity_for(88200), 131072);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_non_power_of_two_capacity_panics() {
        let _ = RingBuffer::new(12);
    }

    #[test]
    fn test_write_read_basic() {
        let rb = RingBuffer::new(16);
        assert_eq!(rb.capacity(), 16);
        assert_eq!(rb.free_bytes(), 16);

        assert_eq!(rb.write(&[1, 2, 3, 4]), 4);
        assert_eq!(rb.unsubmitted_bytes(), 4);
        assert_eq!(rb.free_bytes(), 12);

        let mut out = [0u8; 4];
        assert_eq!(rb.read(&mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);
        assert_eq!(rb.free_bytes(), 16);
        assert!(rb.is_empty());
    }

    #[test]
    fn test_read_empty_returns_zero() {
        let rb = RingBuffer::new(8);
        let mut out = [0xAAu8; 8];
        assert_eq!(rb.read(&mut out), 0);
        // output untouched
        assert_eq!(out, [0xAAu8; 8]);
    }

    #[test]
    fn test_write_truncates_at_free_space() {
        let rb = RingBuffer::new(8);
        assert_eq!(rb.write(&[0; 6]), 6);
        // only 2 bytes of room left
        assert_eq!(rb.write(&[1, 2, 3, 4]), 2);
        assert_eq!(rb.free_bytes(), 0);
        assert_eq!(rb.write(&[9]), 0);
    }

    #[test]
    fn test_wraparound_crossing_boundary() {
        // Size 8, drive the cursors across the 0/8 seam.
        let rb = RingBuffer::new(8);
        assert_eq!(rb.write(&[1, 2, 3, 4, 5, 6]), 6);

        let mut out = [0u8; 4];
        assert_eq!(rb.read(&mut out), 4);
        assert_eq!(out, [1, 2, 3, 4]);

        // Write 5 bytes: 2 land at offsets 6..8, 3 wrap to 0..3.
        assert_eq!(rb.write(&[7, 8, 9, 10, 11]), 5);
        assert_eq!(rb.unsubmitted_bytes(), 7);

        let mut all = [0u8; 7];
        assert_eq!(rb.read(&mut all), 7);
        assert_eq!(all, [5, 6, 7, 8, 9, 10, 11]);
        assert_eq!(rb.free_bytes(), 8);
    }

    #[test]
    fn test_write_silence_fill_and_truncate() {
        let rb = RingBuffer::new(8);
        assert_eq!(rb.write_silence(5, 0x80), 5);
        let mut out = [0u8; 5];
        assert_eq!(rb.read(&mut out), 5);
        assert_eq!(out, [0x80; 5]);

        // 8 free again; silence wraps across the seam
        assert_eq!(rb.write_silence(6, 0), 6);
        assert_eq!(rb.write_silence(6, 0), 2);
        assert_eq!(rb.free_bytes(), 0);
    }

    #[test]
    fn test_fifo_order_across_many_wraps() {
        let rb = RingBuffer::new(16);
        let mut next_in: u8 = 0;
        let mut next_out: u8 = 0;
        for _ in 0..100 {
            let chunk: Vec<u8> = (0..5).map(|i| next_in.wrapping_add(i)).collect();
            let written = rb.write(&chunk);
            next_in = next_in.wrapping_add(written as u8);

            let mut out = [0u8; 3];
            let read = rb.read(&mut out);
            for &b in &out[..read] {
                assert_eq!(b, next_out);
                next_out = next_out.wrapping_add(1);
            }
        }
    }

    proptest! {
        /// free + unsubmitted == capacity after every operation, and every
        /// write/read moves exactly min(requested, room) bytes.
        #[test]
        fn prop_conservation_invariant(
            capacity_pow in 3usize..10,
            ops in proptest::collection::vec((any::<bool>(), 1usize..64), 1..200),
        ) {
            let capacity = 1usize << capacity_pow;
            let rb = RingBuffer::new(capacity);

            for (is_write, len) in ops {
                if is_write {
                    let free_before = rb.free_bytes();
                    let src = vec![0x5Au8; len];
                    let n = rb.write(&src);
                    prop_assert_eq!(n, len.min(free_before));
                    prop_assert_eq!(rb.free_bytes(), free_before - n);
                } else {
                    let queued_before = rb.unsubmitted_bytes();
                    let mut dst = vec![0u8; len];
                    let n = rb.read(&mut dst);
                    prop_assert_eq!(n, len.min(queued_before));
                }
                prop_assert_eq!(rb.free_bytes() + rb.unsubmitted_bytes(), capacity);
            }
        }

        /// Bytes come out in the exact order they went in, regardless of the
        /// chunking on either side.
        #[test]
        fn prop_fifo_no_reorder(
            writes in proptest::collection::vec(1usize..32, 1..50),
        ) {
            let rb = RingBuffer::new(64);
            let mut written: Vec<u8> = Vec::new();
            let mut read_back: Vec<u8> = Vec::new();
            let mut counter: u8 = 0;

            for len in writes {
                let chunk: Vec<u8> = (0..len).map(|_| {
                    counter = counter.wrapping_add(1);
                    counter
                }).collect();
                let n = rb.write(&chunk);
                written.extend_from_slice(&chunk[..n]);

                let mut out = vec![0u8; 24];
                let n = rb.read(&mut out);
                read_back.extend_from_slice(&out[..n]);
            }

            let mut out = vec![0u8; 64];
            let n = rb.read(&mut out);
            read_back.extend_from_slice(&out[..n]);

            prop_assert_eq!(read_back, written);
        }
    }
}
