use parking_lot::{Condvar, Mutex};
use std::thread::{self, ThreadId};

/// A mutual exclusion lock that remembers its holder, so condition
/// variables can check the caller owns it. Unlike a `Mutex<T>` it guards
/// no data of its own.
#[derive(Debug, Default)]
pub struct Lock {
    holder: Mutex<Option<ThreadId>>,
    released: Condvar,
}

impl Lock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self) {
        let me = thread::current().id();
        let mut holder = self.holder.lock();
        assert!(*holder != Some(me), "lock acquired twice by the same thread");
        while holder.is_some() {
            self.released.wait(&mut holder);
        }
        *holder = Some(me);
    }

    pub fn release(&self) {
        let mut holder = self.holder.lock();
        assert!(
            *holder == Some(thread::current().id()),
            "lock released by a thread that does not hold it"
        );
        *holder = None;
        self.released.notify_one();
    }

    pub fn is_held_by_current_thread(&self) -> bool {
        *self.holder.lock() == Some(thread::current().id())
    }
}
