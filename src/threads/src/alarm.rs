//! Sleeping on the machine timer.
use crate::semaphore::Semaphore;
use machine::Timer;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::trace;

#[derive(Debug)]
struct Sleeper {
    wake_time: u64,
    wakeup: Arc<Semaphore>,
}

#[derive(Debug)]
pub struct Alarm {
    timer: Arc<Timer>,
    sleepers: Mutex<Vec<Sleeper>>,
}

impl Alarm {
    /// Create an alarm and install it as `timer`'s interrupt handler. Only
    /// one alarm per timer works; a second one replaces the first.
    pub fn new(timer: Arc<Timer>) -> Arc<Self> {
        let alarm = Arc::new(Alarm {
            timer: Arc::clone(&timer),
            sleepers: Mutex::new(Vec::new()),
        });
        let weak: Weak<Alarm> = Arc::downgrade(&alarm);
        timer.set_interrupt_handler(Box::new(move || {
            if let Some(alarm) = weak.upgrade() {
                alarm.timer_interrupt();
            }
        }));
        alarm
    }

    /// Wake every sleeper whose time has come.
    pub fn timer_interrupt(&self) {
        let now = self.timer.time();
        let mut sleepers = self.sleepers.lock();
        sleepers.retain(|sleeper| {
            if sleeper.wake_time <= now {
                trace!(target: "threads", wake_time = sleeper.wake_time, now, "alarm fired");
                sleeper.wakeup.v();
                false
            } else {
                true
            }
        });
    }

    /// Put the calling thread to sleep for at least `x` ticks. It is woken
    /// by the first timer interrupt at which `now >= call time + x`.
    pub fn wait_until(&self, x: i64) {
        if x <= 0 {
            return;
        }
        let wakeup = Arc::new(Semaphore::new(0));
        {
            let mut sleepers = self.sleepers.lock();
            let wake_time = self.timer.time() + x as u64;
            sleepers.push(Sleeper {
                wake_time,
                wakeup: Arc::clone(&wakeup),
            });
        }
        wakeup.p();
    }

    pub fn sleeping(&self) -> usize {
        self.sleepers.lock().len()
    }
}
