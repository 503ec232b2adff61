//! Synchronous exchange of 32-bit words between threads.
use crate::condition::Condition2;
use crate::lock::Lock;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Default)]
struct Exchange {
    words: VecDeque<i32>,
    spoken: u64,
    delivered: u64,
}

/// Any number of speakers and listeners may wait at once. Each spoken word
/// reaches exactly one listener, in the order words were spoken, and
/// `speak` returns only after its word has been taken.
#[derive(Debug)]
pub struct Communicator {
    lock: Arc<Lock>,
    listeners: Condition2,
    speakers: Condition2,
    // Only touched while `lock` is held.
    exchange: Mutex<Exchange>,
}

impl Default for Communicator {
    fn default() -> Self {
        Self::new()
    }
}

impl Communicator {
    pub fn new() -> Self {
        let lock = Arc::new(Lock::new());
        Communicator {
            listeners: Condition2::new(Arc::clone(&lock)),
            speakers: Condition2::new(Arc::clone(&lock)),
            lock,
            exchange: Mutex::new(Exchange::default()),
        }
    }

    pub fn speak(&self, word: i32) {
        self.lock.acquire();
        let ticket = {
            let mut exchange = self.exchange.lock();
            exchange.words.push_back(word);
            exchange.spoken += 1;
            exchange.spoken - 1
        };
        self.listeners.wake();
        while self.exchange.lock().delivered <= ticket {
            self.speakers.sleep();
        }
        self.lock.release();
    }

    pub fn listen(&self) -> i32 {
        self.lock.acquire();
        let word = loop {
            let next = {
                let mut exchange = self.exchange.lock();
                let word = exchange.words.pop_front();
                if word.is_some() {
                    exchange.delivered += 1;
                }
                word
            };
            match next {
                Some(word) => break word,
                None => self.listeners.sleep(),
            }
        };
        self.speakers.wake_all();
        self.lock.release();
        word
    }
}
