//! Lock-free single-producer/single-consumer ring buffer
//!
//! Command list identifiers travel between a free ring and an active ring. Both are
//! touched from one submission thread today, but each side only ever needs one producer
//! and one consumer, so the rings are wait-free SPSC queues rather than locked `VecDeque`s.
//!
//! Indices grow monotonically and are reduced modulo `N` on access, which keeps the
//! full/empty distinction without a spare slot.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed-capacity SPSC queue holding at most `N` items.
pub struct RingBuffer<T, const N: usize> {
    slots: [UnsafeCell<MaybeUninit<T>>; N],
    /// Next index to pop (owned by the consumer).
    head: AtomicUsize,
    /// Next index to push (owned by the producer).
    tail: AtomicUsize,
}

// SAFETY: a slot is written only by the producer before `tail` is published with Release,
// and read only by the consumer after observing `tail` with Acquire (and vice versa for
// `head`), so no slot is ever accessed from two threads at once.
unsafe impl<T: Send, const N: usize> Send for RingBuffer<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for RingBuffer<T, N> {}

impl<T, const N: usize> RingBuffer<T, N> {
    /// Create an empty ring.
    pub fn new() -> Self {
        assert!(N > 0, "ring buffer capacity must be non-zero");
        Self {
            slots: std::array::from_fn(|_| UnsafeCell::new(MaybeUninit::uninit())),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Push from the producer side. Hands the value back when the ring is full.
    pub fn push(&self, value: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) == N {
            return Err(value);
        }
        // SAFETY: the slot at `tail` is outside [head, tail) so the consumer cannot touch it.
        unsafe {
            (*self.slots[tail % N].get()).write(value);
        }
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    /// Pop from the consumer side.
    pub fn pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        // SAFETY: the slot at `head` was initialized by a push published through `tail`.
        let value = unsafe { (*self.slots[head % N].get()).assume_init_read() };
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    /// Number of queued items (a snapshot when the other side is active).
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    /// Whether the ring is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of items.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Copy out the queued items in pop order. Needs exclusive access.
    pub fn to_vec(&mut self) -> Vec<T>
    where
        T: Clone,
    {
        let head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        (0..tail.wrapping_sub(head))
            .map(|offset| {
                let index = head.wrapping_add(offset) % N;
                // SAFETY: every slot in [head, tail) is initialized and nobody else can pop.
                unsafe { (*self.slots[index].get()).assume_init_ref().clone() }
            })
            .collect()
    }
}

impl<T, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for RingBuffer<T, N> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

impl<T, const N: usize> std::fmt::Debug for RingBuffer<T, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("len", &self.len())
            .field("capacity", &N)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fifo_order() {
        let ring: RingBuffer<u8, 4> = RingBuffer::new();
        for i in 0..4 {
            ring.push(i).unwrap();
        }
        assert_eq!(ring.len(), 4);
        assert_eq!(ring.push(9), Err(9));
        assert_eq!((0..4).map(|_| ring.pop().unwrap()).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(ring.pop(), None);
    }

    #[test]
    fn test_wraps_around_capacity() {
        let mut ring: RingBuffer<u32, 3> = RingBuffer::new();
        for round in 0..10 {
            ring.push(round).unwrap();
            ring.push(round + 100).unwrap();
            assert_eq!(ring.pop(), Some(round));
            assert_eq!(ring.pop(), Some(round + 100));
        }
        ring.push(7).unwrap();
        assert_eq!(ring.to_vec(), vec![7]);
        assert!(!ring.is_empty());
    }

    #[test]
    fn test_drop_releases_queued_items() {
        let item = Arc::new(());
        {
            let ring: RingBuffer<Arc<()>, 2> = RingBuffer::new();
            ring.push(Arc::clone(&item)).unwrap();
            assert_eq!(Arc::strong_count(&item), 2);
        }
        assert_eq!(Arc::strong_count(&item), 1);
    }

    #[test]
    fn test_producer_consumer_threads() {
        let ring: Arc<RingBuffer<usize, 8>> = Arc::new(RingBuffer::new());
        let producer = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                for i in 0..1000 {
                    let mut value = i;
                    while let Err(back) = ring.push(value) {
                        value = back;
                        std::thread::yield_now();
                    }
                }
            })
        };
        let mut received = Vec::with_capacity(1000);
        while received.len() < 1000 {
            match ring.pop() {
                Some(value) => received.push(value),
                None => std::thread::yield_now(),
            }
        }
        producer.join().unwrap();
        assert_eq!(received, (0..1000).collect::<Vec<_>>());
    }
}
