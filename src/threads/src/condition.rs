use crate::lock::Lock;
use crate::semaphore::Semaphore;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Condition variable tied to a [`Lock`]. Waiters are woken in the order
/// they went to sleep.
///
/// Every operation requires the caller to hold the associated lock.
#[derive(Debug)]
pub struct Condition2 {
    lock: Arc<Lock>,
    waiters: Mutex<VecDeque<Arc<Semaphore>>>,
}

impl Condition2 {
    pub fn new(lock: Arc<Lock>) -> Self {
        Condition2 {
            lock,
            waiters: Mutex::new(VecDeque::new()),
        }
    }

    /// Release the lock, wait to be woken, and reacquire the lock before
    /// returning.
    pub fn sleep(&self) {
        assert!(self.lock.is_held_by_current_thread());
        let waiter = Arc::new(Semaphore::new(0));
        // Queued before the lock is dropped, so a wake issued right after
        // the release still finds us.
        self.waiters.lock().push_back(Arc::clone(&waiter));
        self.lock.release();
        waiter.p();
        self.lock.acquire();
    }

    /// Wake at most one sleeper.
    pub fn wake(&self) {
        assert!(self.lock.is_held_by_current_thread());
        if let Some(waiter) = self.waiters.lock().pop_front() {
            waiter.v();
        }
    }

    pub fn wake_all(&self) {
        assert!(self.lock.is_held_by_current_thread());
        for waiter in self.waiters.lock().drain(..) {
            waiter.v();
        }
    }

    pub fn waiting(&self) -> usize {
        self.waiters.lock().len()
    }
}
