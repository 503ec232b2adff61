//! Virtual clock. Time only moves when someone calls [`Timer::advance`],
//! either a test driving it by hand or the optional ticker thread.
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::trace;

type InterruptHandler = Arc<dyn Fn() + Send + Sync>;

pub struct Timer {
    ticks: AtomicU64,
    period: u64,
    handler: RwLock<Option<InterruptHandler>>,
    running: AtomicBool,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("ticks", &self.ticks.load(Ordering::Relaxed))
            .field("period", &self.period)
            .field("running", &self.running.load(Ordering::Relaxed))
            .finish()
    }
}

impl Timer {
    pub fn new(period: u64) -> Self {
        Timer {
            ticks: AtomicU64::new(0),
            period: period.max(1),
            handler: RwLock::new(None),
            running: AtomicBool::new(false),
            ticker: Mutex::new(None),
        }
    }

    pub fn time(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    /// Install the routine run on every timer interrupt, replacing any
    /// previous one.
    pub fn set_interrupt_handler(&self, handler: Box<dyn Fn() + Send + Sync>) {
        *self.handler.write() = Some(Arc::from(handler));
    }

    /// Move the clock forward, firing one interrupt for every period
    /// boundary crossed.
    pub fn advance(&self, ticks: u64) {
        let before = self.ticks.fetch_add(ticks, Ordering::SeqCst);
        let after = before + ticks;
        let interrupts = after / self.period - before / self.period;
        if interrupts == 0 {
            return;
        }
        let handler = self.handler.read().clone();
        if let Some(handler) = handler {
            for _ in 0..interrupts {
                handler();
            }
        }
    }

    /// Spawn a host thread that advances the clock by one period every
    /// `interval`. Does nothing when a ticker already runs.
    pub fn start(self: &Arc<Self>, interval: Duration) {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            return;
        }
        self.running.store(true, Ordering::SeqCst);
        let timer = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("timer".into())
            .spawn(move || {
                while timer.running.load(Ordering::SeqCst) {
                    thread::sleep(interval);
                    timer.advance(timer.period);
                }
                trace!(target: "machine", ticks = timer.time(), "ticker stopped");
            });
        match spawned {
            Ok(handle) => *ticker = Some(handle),
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                tracing::error!(target: "machine", "could not spawn ticker: {}", e);
            }
        }
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.ticker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn interrupts_fire_per_period_crossed() {
        let timer = Timer::new(100);
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        timer.set_interrupt_handler(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        timer.advance(50);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        timer.advance(60);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        timer.advance(250);
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert_eq!(timer.time(), 360);
    }

    #[test]
    fn ticker_moves_time() {
        let timer = Arc::new(Timer::new(10));
        timer.start(Duration::from_millis(1));
        while timer.time() < 30 {
            thread::sleep(Duration::from_millis(1));
        }
        timer.stop();
        let stopped_at = timer.time();
        thread::sleep(Duration::from_millis(5));
        assert_eq!(timer.time(), stopped_at);
    }
}
