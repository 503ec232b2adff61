//! Kernel threads. Each `KThread` is backed by a host thread; the handle is
//! cheap to clone and any holder may join it.
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

type Body = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadStatus {
    New,
    Running,
    Finished,
}

struct Inner {
    name: Mutex<String>,
    body: Mutex<Option<Body>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    status: Mutex<ThreadStatus>,
    finished: Condvar,
    panicked: Mutex<bool>,
}

#[derive(Clone)]
pub struct KThread {
    inner: Arc<Inner>,
}

impl fmt::Debug for KThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KThread")
            .field("name", &*self.inner.name.lock())
            .field("status", &*self.inner.status.lock())
            .finish()
    }
}

/// Marks the thread finished however its body ends.
struct FinishGuard(Arc<Inner>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if thread::panicking() {
            *self.0.panicked.lock() = true;
        }
        *self.0.status.lock() = ThreadStatus::Finished;
        self.0.finished.notify_all();
    }
}

impl KThread {
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        KThread {
            inner: Arc::new(Inner {
                name: Mutex::new("(unnamed thread)".to_string()),
                body: Mutex::new(Some(Box::new(body))),
                handle: Mutex::new(None),
                status: Mutex::new(ThreadStatus::New),
                finished: Condvar::new(),
                panicked: Mutex::new(false),
            }),
        }
    }

    pub fn set_name(self, name: &str) -> Self {
        *self.inner.name.lock() = name.to_string();
        self
    }

    pub fn name(&self) -> String {
        self.inner.name.lock().clone()
    }

    pub fn status(&self) -> ThreadStatus {
        *self.inner.status.lock()
    }

    /// Start running the body. A thread can only be forked once.
    pub fn fork(&self) -> std::io::Result<()> {
        let body = self.inner.body.lock().take();
        let body = match body {
            Some(body) => body,
            None => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "thread already forked",
                ))
            }
        };
        let name = self.name();
        *self.inner.status.lock() = ThreadStatus::Running;
        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new().name(name.clone()).spawn(move || {
            let _guard = FinishGuard(inner);
            body();
        });
        match spawned {
            Ok(handle) => {
                debug!(target: "threads", thread = %name, "forked");
                *self.inner.handle.lock() = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.inner.status.lock() = ThreadStatus::Finished;
                self.inner.finished.notify_all();
                Err(e)
            }
        }
    }

    /// Wait for the thread to finish. Returns false when its body panicked.
    /// Joining a thread that was never forked returns at once.
    pub fn join(&self) -> bool {
        assert!(!self.is_current(), "thread cannot join itself");
        {
            let mut status = self.inner.status.lock();
            while *status == ThreadStatus::Running {
                self.inner.finished.wait(&mut status);
            }
        }
        let handle = self.inner.handle.lock().take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(target: "threads", thread = %self.name(), "body panicked");
            }
        }
        !*self.inner.panicked.lock()
    }

    fn is_current(&self) -> bool {
        self.inner
            .handle
            .lock()
            .as_ref()
            .map(|h| h.thread().id() == thread::current().id())
            .unwrap_or(false)
    }

    /// Name of the calling thread.
    pub fn current_name() -> String {
        thread::current().name().unwrap_or("main").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn fork_then_join() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let t = KThread::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
            assert_eq!(KThread::current_name(), "worker");
        })
        .set_name("worker");
        t.fork().unwrap();
        assert!(t.join());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(t.status(), ThreadStatus::Finished);
        assert!(t.fork().is_err());
    }

    #[test]
    fn join_reports_panics() {
        let t = KThread::new(|| panic!("boom")).set_name("faulty");
        t.fork().unwrap();
        assert!(!t.join());
    }
}
