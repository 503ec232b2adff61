use parking_lot::{Condvar, Mutex};

/// Counting semaphore.
#[derive(Debug, Default)]
pub struct Semaphore {
    value: Mutex<u64>,
    available: Condvar,
}

impl Semaphore {
    pub fn new(initial: u64) -> Self {
        Semaphore {
            value: Mutex::new(initial),
            available: Condvar::new(),
        }
    }

    /// Wait until the value is positive, then decrement it.
    pub fn p(&self) {
        let mut value = self.value.lock();
        while *value == 0 {
            self.available.wait(&mut value);
        }
        *value -= 1;
    }

    /// Increment the value, waking one waiter.
    pub fn v(&self) {
        let mut value = self.value.lock();
        *value += 1;
        self.available.notify_one();
    }

    pub fn value(&self) -> u64 {
        *self.value.lock()
    }
}
