//! State shared by every process of one running kernel.
use crate::cage::Cage;
use machine::Machine;
use once_cell::sync::OnceCell;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;
use threads::KThread;
use tracing::info;

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no program is bound to executable {0}")]
    UnknownProgram(String),

    #[error("cannot start user thread: {0}")]
    Thread(#[from] std::io::Error),
}

/// Starts the user thread of a freshly loaded process. Implemented by the
/// kernel layer that knows how to run programs.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, cage: Arc<Cage>) -> Result<KThread, LaunchError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The last process exited.
    LastExit,
    /// The root process called halt.
    Halt,
}

pub struct KernelState {
    machine: Arc<Machine>,
    launcher: OnceCell<Arc<dyn ProcessLauncher>>,
    root: OnceCell<u64>,
    active: AtomicUsize,
    terminated: Mutex<Option<Termination>>,
    terminated_cv: Condvar,
}

impl fmt::Debug for KernelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelState")
            .field("root", &self.root.get())
            .field("active", &self.active.load(Ordering::SeqCst))
            .field("terminated", &*self.terminated.lock())
            .finish()
    }
}

impl KernelState {
    pub fn new(machine: Arc<Machine>) -> Arc<Self> {
        Arc::new(KernelState {
            machine,
            launcher: OnceCell::new(),
            root: OnceCell::new(),
            active: AtomicUsize::new(0),
            terminated: Mutex::new(None),
            terminated_cv: Condvar::new(),
        })
    }

    pub fn machine(&self) -> &Arc<Machine> {
        &self.machine
    }

    /// Install the launcher. Only the first call has an effect.
    pub fn set_launcher(&self, launcher: Arc<dyn ProcessLauncher>) {
        let _ = self.launcher.set(launcher);
    }

    pub fn launcher(&self) -> Option<&Arc<dyn ProcessLauncher>> {
        self.launcher.get()
    }

    pub fn root_pid(&self) -> Option<u64> {
        self.root.get().copied()
    }

    pub(crate) fn set_root(&self, pid: u64) -> bool {
        self.root.set(pid).is_ok()
    }

    pub fn active_processes(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub(crate) fn process_started(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    /// Returns true when the caller was the last live process.
    pub(crate) fn process_finished(&self) -> bool {
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            == Ok(1)
    }

    /// Stop the kernel. The first reason given wins.
    pub fn terminate(&self, why: Termination) {
        let mut terminated = self.terminated.lock();
        if terminated.is_none() {
            info!(target: "process", reason = ?why, ticks = self.machine.timer().time(), "kernel terminating");
            *terminated = Some(why);
            self.machine.halt();
            self.terminated_cv.notify_all();
        }
    }

    pub fn termination(&self) -> Option<Termination> {
        *self.terminated.lock()
    }

    /// Block until the kernel terminates.
    pub fn wait_for_termination(&self) -> Termination {
        let mut terminated = self.terminated.lock();
        loop {
            if let Some(why) = *terminated {
                return why;
            }
            self.terminated_cv.wait(&mut terminated);
        }
    }

    /// Like [`wait_for_termination`](Self::wait_for_termination) but gives
    /// up after `timeout`.
    pub fn wait_for_termination_timeout(&self, timeout: std::time::Duration) -> Option<Termination> {
        let deadline = std::time::Instant::now() + timeout;
        let mut terminated = self.terminated.lock();
        while terminated.is_none() {
            if self.terminated_cv.wait_until(&mut terminated, deadline).timed_out() {
                break;
            }
        }
        *terminated
    }
}
