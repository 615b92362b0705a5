//! Bounded buffer implementation

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tracing::trace;

/// A capacity-bounded FIFO queue for producer/consumer pipelines.
///
/// One mutex guards the queue and the drop counter; two condition variables
/// distinguish "data available" from "space available" so a producer only
/// ever wakes a consumer and vice versa. Elements that cannot be inserted
/// because the buffer is full are counted as drops, giving the consumer
/// side a cheap proxy for the loss rate on the link.
pub struct BoundedBuffer<T> {
    inner: Mutex<Inner<T>>,
    has_element: Condvar,
    has_space: Condvar,
    capacity: usize,
    timeout: Duration,
}

struct Inner<T> {
    queue: VecDeque<T>,
    dropped: u64,
}

impl<T> BoundedBuffer<T> {
    /// Create a buffer holding at most `capacity` elements.
    ///
    /// The timed variants (`push_wait_for`, `pop_wait_for`) use a zero
    /// timeout and therefore behave like the `try_` variants; use
    /// [`BoundedBuffer::with_timeout`] to give them a real deadline.
    pub fn new(capacity: usize) -> Self {
        Self::with_timeout(capacity, Duration::ZERO)
    }

    /// Create a buffer with the timeout used by the `_wait_for` variants.
    pub fn with_timeout(capacity: usize, timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity),
                dropped: 0,
            }),
            has_element: Condvar::new(),
            has_space: Condvar::new(),
            capacity,
            timeout,
        }
    }

    /// Number of elements currently queued.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().queue.is_empty()
    }

    /// Maximum number of elements the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of elements refused because the buffer was full.
    ///
    /// Monotonically non-decreasing for the lifetime of the buffer; `clear`
    /// does not reset it.
    pub fn dropped_elements(&self) -> u64 {
        self.lock().dropped
    }

    /// Discard every queued element, keeping the drop counter intact.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.queue.clear();
        drop(inner);
        self.has_space.notify_all();
    }

    /// Insert `value` if the buffer has space. Never blocks.
    ///
    /// Returns `false` and counts a drop when the buffer is full.
    pub fn try_push(&self, value: T) -> bool {
        let mut inner = self.lock();
        if inner.queue.len() == self.capacity {
            inner.dropped += 1;
            trace!(dropped = inner.dropped, "buffer full, element dropped");
            return false;
        }
        inner.queue.push_back(value);
        drop(inner);
        self.has_element.notify_one();
        true
    }

    /// Remove and return the front element. Never blocks.
    ///
    /// An empty buffer yields `None`; that is the normal "not ready" result,
    /// not an error.
    pub fn try_pop(&self) -> Option<T> {
        let mut inner = self.lock();
        let value = inner.queue.pop_front()?;
        drop(inner);
        self.has_space.notify_one();
        Some(value)
    }

    /// Insert `value`, blocking indefinitely until space is available.
    pub fn push_wait(&self, value: T) {
        let mut inner = self.lock();
        while inner.queue.len() == self.capacity {
            inner = self
                .has_space
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
        inner.queue.push_back(value);
        drop(inner);
        self.has_element.notify_one();
    }

    /// Remove and return the front element, blocking indefinitely until one
    /// is available.
    pub fn pop_wait(&self) -> T {
        let mut inner = self.lock();
        loop {
            if let Some(value) = inner.queue.pop_front() {
                drop(inner);
                self.has_space.notify_one();
                return value;
            }
            inner = self
                .has_element
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Insert `value`, blocking up to the configured timeout.
    ///
    /// Returns `false` and counts a drop if the buffer is still full when
    /// the timeout elapses.
    pub fn push_wait_for(&self, value: T) -> bool {
        let inner = self.lock();
        let (mut inner, _result) = self
            .has_space
            .wait_timeout_while(inner, self.timeout, |i| i.queue.len() == self.capacity)
            .unwrap_or_else(PoisonError::into_inner);
        if inner.queue.len() == self.capacity {
            inner.dropped += 1;
            trace!(dropped = inner.dropped, "timed push expired, element dropped");
            return false;
        }
        inner.queue.push_back(value);
        drop(inner);
        self.has_element.notify_one();
        true
    }

    /// Remove and return the front element, blocking up to the configured
    /// timeout. Returns `None` if no element arrived in time.
    pub fn pop_wait_for(&self) -> Option<T> {
        let inner = self.lock();
        let (mut inner, _result) = self
            .has_element
            .wait_timeout_while(inner, self.timeout, |i| i.queue.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        let value = inner.queue.pop_front()?;
        drop(inner);
        self.has_space.notify_one();
        Some(value)
    }

    /// Insert `value` from the reader thread. Never blocks.
    ///
    /// Defined to behave exactly like [`BoundedBuffer::try_push`]: a full
    /// buffer refuses the element and counts a drop rather than overwriting
    /// the oldest entry, so `dropped_elements` stays an exact loss count.
    pub fn force_push(&self, value: T) -> bool {
        self.try_push(value)
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // A panicked peer must not wedge the other side of the pipeline;
        // every critical section restores invariants before unlocking, so
        // the queue is still usable after poisoning.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> std::fmt::Debug for BoundedBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("BoundedBuffer")
            .field("len", &inner.queue.len())
            .field("capacity", &self.capacity)
            .field("dropped", &inner.dropped)
            .finish()
    }
}
