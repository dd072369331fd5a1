//! The bounded lock-free queue connecting producers to the server workers.

use crossbeam_utils::CachePadded;

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One queue slot. `seq` encodes the slot state relative to the head and tail
/// tickets: the slot is free for the producer whose tail ticket equals `seq`,
/// and holds a value for the consumer whose head ticket is `seq - 1`.
struct Slot<T> {
    seq: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

/// A fixed-capacity FIFO of fixed-size messages.
///
/// Push and pop never block and never discard: a full queue rejects the push
/// and an empty queue returns `None`, leaving backpressure to the caller.
/// Both ends are lock-free and safe for multiple producers and consumers, so
/// the same type serves the many-clients lane and the scanner lane.
///
/// The implementation is the classic bounded queue over per-slot sequence
/// numbers: producers claim a tail ticket with a CAS, write the value, then
/// publish by bumping the slot sequence; consumers mirror this on the head.
/// The slot ring needs at least two entries for the ticket encoding to stay
/// unambiguous, so a capacity-1 queue runs on two slots with occupancy capped
/// at one.
pub struct RingBuffer<T> {
    tail: CachePadded<AtomicUsize>,
    head: CachePadded<AtomicUsize>,
    capacity: usize,
    slots: Box<[Slot<T>]>,
}

unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Create a queue holding at most `capacity` messages.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "a queue needs at least one slot");
        let slots = (0..capacity.max(2))
            .map(|i| Slot {
                seq: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();
        Self {
            tail: CachePadded::new(AtomicUsize::new(0)),
            head: CachePadded::new(AtomicUsize::new(0)),
            capacity,
            slots,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of messages in the queue. Racy under concurrent use; only
    /// meaningful once producers have quiesced (e.g. during shutdown drain).
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::SeqCst);
        let head = self.head.load(Ordering::SeqCst);
        tail.saturating_sub(head)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `value` if there is room, handing it back if the queue is full.
    /// A rejection can be spurious when a pop of the same slot is mid-flight;
    /// producers retry with a short back-off either way.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        let ring = self.slots.len();
        loop {
            let tail = self.tail.load(Ordering::Relaxed);
            let head = self.head.load(Ordering::Relaxed);
            if tail.wrapping_sub(head) >= self.capacity {
                return Err(value);
            }

            let slot = &self.slots[tail % ring];
            let seq = slot.seq.load(Ordering::Acquire);

            if seq == tail {
                // The slot is free for this ticket; try to claim it.
                match self.tail.compare_exchange_weak(
                    tail,
                    tail + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe { (*slot.value.get()).write(value) };
                        slot.seq.store(tail + 1, Ordering::Release);
                        return Ok(());
                    }
                    Err(_) => continue,
                }
            } else if seq < tail {
                // The pop that frees this slot has claimed it but not yet
                // published; report full rather than wait on it.
                return Err(value);
            }
            // Another producer claimed this ticket; reload and retry.
        }
    }

    /// Remove and return the oldest message, or `None` if the queue is empty.
    pub fn try_pop(&self) -> Option<T> {
        let ring = self.slots.len();
        loop {
            let head = self.head.load(Ordering::Relaxed);
            let slot = &self.slots[head % ring];
            let seq = slot.seq.load(Ordering::Acquire);

            if seq == head + 1 {
                // The slot holds the value for this ticket; try to claim it.
                match self.head.compare_exchange_weak(
                    head,
                    head + 1,
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        let value = unsafe { (*slot.value.get()).assume_init_read() };
                        // Free the slot for the producer one lap ahead.
                        slot.seq.store(head + ring, Ordering::Release);
                        return Some(value);
                    }
                    Err(_) => continue,
                }
            } else if seq <= head {
                // Nothing published here yet.
                return None;
            }
            // Another consumer claimed this ticket; reload and retry.
        }
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        // Drop any messages still queued.
        while self.try_pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    extern crate crossbeam;

    use super::*;
    use crate::util::test_util::panic_after;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fills_and_drains_in_order() {
        let queue = RingBuffer::new(4);
        for i in 0..4 {
            assert!(queue.try_push(i).is_ok());
        }
        assert_eq!(queue.try_push(99), Err(99));
        for i in 0..4 {
            assert_eq!(queue.try_pop(), Some(i));
        }
        assert_eq!(queue.try_pop(), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn capacity_one_rejects_second_push() {
        let queue = RingBuffer::new(1);
        assert_eq!(queue.capacity(), 1);
        assert!(queue.try_push(7).is_ok());
        assert_eq!(queue.try_push(8), Err(8));
        assert_eq!(queue.try_pop(), Some(7));
        assert!(queue.try_push(8).is_ok());
        assert_eq!(queue.try_pop(), Some(8));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn wraps_around() {
        let queue = RingBuffer::new(2);
        for lap in 0..100 {
            assert!(queue.try_push(2 * lap).is_ok());
            assert!(queue.try_push(2 * lap + 1).is_ok());
            assert_eq!(queue.try_pop(), Some(2 * lap));
            assert_eq!(queue.try_pop(), Some(2 * lap + 1));
        }
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn single_slot_backpressure() {
        let queue = Arc::new(RingBuffer::new(1));
        let producer_queue = queue.clone();

        panic_after(60_000, move || {
            let producer = thread::spawn(move || {
                for i in 0..1000usize {
                    let mut v = i;
                    while let Err(rejected) = producer_queue.try_push(v) {
                        v = rejected;
                        thread::sleep(Duration::from_nanos(100));
                    }
                }
            });

            // A deliberately slow consumer still observes every message in
            // push order.
            let mut received = 0usize;
            while received < 1000 {
                if let Some(v) = queue.try_pop() {
                    assert_eq!(v, received);
                    received += 1;
                    if received % 100 == 0 {
                        thread::sleep(Duration::from_micros(500));
                    }
                } else {
                    thread::sleep(Duration::from_nanos(100));
                }
            }
            assert!(producer.join().is_ok());
            assert_eq!(queue.try_pop(), None);
        });
    }

    #[test]
    fn multi_producer_loses_nothing() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 250;

        let queue = RingBuffer::new(8);
        let mut seen = [false; PRODUCERS * PER_PRODUCER];

        panic_after(60_000, move || {
            crossbeam::scope(|scope| {
                for p in 0..PRODUCERS {
                    let queue = &queue;
                    scope.spawn(move |_| {
                        for i in 0..PER_PRODUCER {
                            let mut v = p * PER_PRODUCER + i;
                            while let Err(rejected) = queue.try_push(v) {
                                v = rejected;
                                thread::sleep(Duration::from_nanos(100));
                            }
                        }
                    });
                }

                let mut popped = 0;
                while popped < PRODUCERS * PER_PRODUCER {
                    if let Some(v) = queue.try_pop() {
                        assert!(!seen[v], "message {} delivered twice", v);
                        seen[v] = true;
                        popped += 1;
                    } else {
                        thread::sleep(Duration::from_nanos(100));
                    }
                }
            })
            .unwrap();

            assert!(seen.iter().all(|&s| s));
        });
    }

    #[test]
    fn drops_queued_values() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let counter = Arc::new(AtomicUsize::new(0));

        struct CountsDrops(Arc<AtomicUsize>);
        impl Drop for CountsDrops {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let queue = RingBuffer::new(4);
        for _ in 0..3 {
            assert!(queue.try_push(CountsDrops(counter.clone())).is_ok());
        }
        drop(queue.try_pop());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        drop(queue);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }
}
