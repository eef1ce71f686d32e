//! Thread-safe FIFO used to hand messages between threads.
//!
//! [`HandoffQueue`] bridges the reactor thread, which pushes decoded
//! messages, and application threads, which pop them. A single mutex guards
//! the deque and the condition variable waits on that same mutex, so a push
//! landing between a waiter's emptiness check and its sleep is never missed.

use std::{collections::VecDeque, time::Duration};

#[cfg(loom)]
use loom::sync::{Condvar, Mutex, MutexGuard};
#[cfg(not(loom))]
use std::sync::{Condvar, Mutex, MutexGuard};

/// Blocking, multi-producer multi-consumer queue.
///
/// `len` and `is_empty` are snapshots and may be stale by the time the
/// caller acts on them; pop methods return `None` rather than failing when
/// the queue has been drained in the meantime.
///
/// # Examples
///
/// ```
/// use std::{sync::Arc, thread};
///
/// use peerwire::queue::HandoffQueue;
///
/// let queue = Arc::new(HandoffQueue::new());
/// let producer = {
///     let queue = Arc::clone(&queue);
///     thread::spawn(move || queue.push_back(42))
/// };
/// queue.wait();
/// assert_eq!(queue.pop_front(), Some(42));
/// producer.join().expect("producer panicked");
/// ```
#[derive(Debug)]
pub struct HandoffQueue<T> {
    items: Mutex<VecDeque<T>>,
    ready: Condvar,
}

impl<T> Default for HandoffQueue<T> {
    fn default() -> Self { Self::new() }
}

impl<T> HandoffQueue<T> {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.items
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Append `item` and wake one waiter.
    pub fn push_back(&self, item: T) {
        self.lock().push_back(item);
        self.ready.notify_one();
    }

    /// Prepend `item` and wake one waiter.
    pub fn push_front(&self, item: T) {
        self.lock().push_front(item);
        self.ready.notify_one();
    }

    /// Remove and return the oldest item.
    pub fn pop_front(&self) -> Option<T> { self.lock().pop_front() }

    /// Remove and return the newest item.
    pub fn pop_back(&self) -> Option<T> { self.lock().pop_back() }

    /// Number of queued items at the time of the call.
    pub fn len(&self) -> usize { self.lock().len() }

    /// Whether the queue was empty at the time of the call.
    pub fn is_empty(&self) -> bool { self.lock().is_empty() }

    /// Drop every queued item.
    pub fn clear(&self) { self.lock().clear(); }

    /// Block the calling thread until the queue holds at least one item.
    ///
    /// Returns immediately if the queue is already non-empty. Never spins:
    /// the thread sleeps on a condition variable and re-checks after each
    /// wake-up.
    pub fn wait(&self) {
        let mut items = self.lock();
        while items.is_empty() {
            items = self
                .ready
                .wait(items)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Like [`HandoffQueue::wait`], but gives up after `timeout`.
    ///
    /// Returns `true` if the queue became non-empty.
    #[cfg(not(loom))]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let items = self.lock();
        let (items, _) = self
            .ready
            .wait_timeout_while(items, timeout, |items| items.is_empty())
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        !items.is_empty()
    }

    /// Like [`HandoffQueue::wait`], but gives up after `timeout`.
    ///
    /// Returns `true` if the queue became non-empty.
    #[cfg(loom)]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut items = self.lock();
        if items.is_empty() {
            let (guard, _) = self
                .ready
                .wait_timeout(items, timeout)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            items = guard;
        }
        !items.is_empty()
    }
}

impl<T: Clone> HandoffQueue<T> {
    /// Clone of the oldest item, if any.
    pub fn front(&self) -> Option<T> { self.lock().front().cloned() }

    /// Clone of the newest item, if any.
    pub fn back(&self) -> Option<T> { self.lock().back().cloned() }
}
