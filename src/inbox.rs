//! Bounded hand-off between the MQTT connection thread and the session
//!
//! The producer runs inside the MQTT client's event dispatch and must never
//! block there, so a full inbox makes room by evicting instead of waiting:
//! the oldest entry the caller marks as superseded goes first, otherwise the
//! oldest entry overall.

use std::collections::VecDeque;
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct Slots<T> {
    queue: VecDeque<T>,
    closed: bool,
}

pub struct Inbox<T> {
    capacity: usize,
    slots: Mutex<Slots<T>>,
    ready: Condvar,
}

impl<T> Inbox<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            slots: Mutex::new(Slots {
                queue: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots<T>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue `item` without blocking, returns the evicted entry if any
    pub fn push(&self, item: T, superseded: impl Fn(&T) -> bool) -> Option<T> {
        let mut slots = self.lock();
        let evicted = if slots.queue.len() >= self.capacity {
            match slots.queue.iter().position(&superseded) {
                Some(i) => slots.queue.remove(i),
                None => slots.queue.pop_front(),
            }
        } else {
            None
        };
        slots.queue.push_back(item);
        drop(slots);

        self.ready.notify_one();
        evicted
    }

    /// No more items will be pushed, wakes a waiting receiver
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    /// Oldest queued item, waiting at most `timeout` for one to arrive.
    ///
    /// Items queued before [`close`](Self::close) are still handed out.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
        let deadline = Instant::now() + timeout;
        let mut slots = self.lock();
        loop {
            if let Some(item) = slots.queue.pop_front() {
                return Ok(item);
            }
            if slots.closed {
                return Err(RecvTimeoutError::Disconnected);
            }
            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return Err(RecvTimeoutError::Timeout);
            }
            slots = self
                .ready
                .wait_timeout(slots, left)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}
