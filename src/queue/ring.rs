//! Lock-free bounded MPMC ring queue.
//!
//! The ring is a fixed array of slots indexed by two monotone 64-bit
//! counters: `tail` counts committed enqueues, `head` committed dequeues,
//! and a slot's index is its counter value modulo the capacity. Claiming a
//! counter value and publishing the slot contents are separate steps, so
//! each slot carries its own sequence number (the classic Vyukov bounded
//! queue): a producer that claimed ticket `t` writes the payload and then
//! releases the slot by storing `t + 1`; a consumer that claimed ticket `h`
//! waits for `h + 1`, takes the payload, and recycles the slot by storing
//! `h + capacity`. A reader that observes the released sequence therefore
//! also observes the payload write — the slot is never visible before its
//! contents are.

use super::{Queue, QueueError};
use bytes::Bytes;
use crossbeam_utils::CachePadded;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

struct Slot {
    seq: AtomicU64,
    payload: UnsafeCell<Option<Bytes>>,
}

// The sequence protocol serializes all access to `payload`: a thread only
// touches the cell between winning the counter CAS and releasing `seq`.
unsafe impl Send for Slot {}
unsafe impl Sync for Slot {}

/// Fixed-capacity multi-producer/multi-consumer FIFO of binary payloads.
///
/// All operations are non-blocking: they succeed, fail fast with
/// [`QueueError`], or retry internally when another thread wins a claim
/// race. Capacity is chosen at construction and need not be a power of two.
pub struct RingQueue {
    slots: Box<[Slot]>,
    capacity: u64,
    head: CachePadded<AtomicU64>,
    tail: CachePadded<AtomicU64>,
}

impl RingQueue {
    /// Create a ring with room for `capacity` messages.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: u64) -> Self {
        assert!(capacity > 0, "ring capacity must be positive");
        let slots = (0..capacity)
            .map(|i| Slot {
                seq: AtomicU64::new(i),
                payload: UnsafeCell::new(None),
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            capacity,
            head: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
        }
    }

    /// Maximum number of messages the ring can hold.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    fn slot(&self, ticket: u64) -> &Slot {
        &self.slots[(ticket % self.capacity) as usize]
    }
}

impl Queue for RingQueue {
    fn enqueue(&self, payload: Bytes) -> Result<(), QueueError> {
        loop {
            let head = self.head.load(Ordering::Acquire);
            let tail = self.tail.load(Ordering::Relaxed);
            if tail.wrapping_sub(head) >= self.capacity {
                return Err(QueueError::Full);
            }
            if self
                .tail
                .compare_exchange_weak(tail, tail + 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                let slot = self.slot(tail);
                // The occupancy check above admits us, but the consumer that
                // vacated this slot may still be recycling its sequence.
                while slot.seq.load(Ordering::Acquire) != tail {
                    std::hint::spin_loop();
                }
                unsafe {
                    *slot.payload.get() = Some(payload);
                }
                slot.seq.store(tail + 1, Ordering::Release);
                return Ok(());
            }
        }
    }

    fn dequeue(&self) -> Result<Bytes, QueueError> {
        loop {
            // head before tail, as in enqueue: the later tail load can only
            // be larger, so a non-empty verdict means ticket `head` was
            // really claimed by a producer.
            let head = self.head.load(Ordering::Relaxed);
            let tail = self.tail.load(Ordering::Acquire);
            if head == tail {
                return Err(QueueError::Empty);
            }
            if self
                .head
                .compare_exchange_weak(head, head + 1, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                let slot = self.slot(head);
                // Wait for the producer that claimed this ticket to publish.
                while slot.seq.load(Ordering::Acquire) != head + 1 {
                    std::hint::spin_loop();
                }
                let payload = unsafe { (*slot.payload.get()).take() }
                    .expect("published slot holds a payload");
                slot.seq.store(head + self.capacity, Ordering::Release);
                return Ok(payload);
            }
        }
    }

    fn len(&self) -> u64 {
        // head first: tail can only grow afterwards, so the difference
        // cannot underflow. It can transiently overshoot, hence the clamp.
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        tail.wrapping_sub(head).min(self.capacity)
    }
}
