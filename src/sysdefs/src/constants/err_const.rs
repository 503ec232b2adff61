//! Error numbers used inside the kernel and the helper every syscall handler
//! uses to report a failure.
//!
//! The user-visible ABI only knows a single failure value (`-1`). The errno
//! is still carried through so logs say *why* a call failed.
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

/// Verbosity requested at boot. `0` silences per-call failure logs,
/// anything higher reports them.
pub static VERBOSE: OnceCell<isize> = OnceCell::new();

/// Value returned to user space for any failed syscall.
pub const SYSCALL_FAILED: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Errno {
    EPERM = 1,
    ENOENT = 2,
    ESRCH = 3,
    EIO = 5,
    E2BIG = 7,
    ENOEXEC = 8,
    EBADF = 9,
    ECHILD = 10,
    ENOMEM = 12,
    EFAULT = 14,
    EEXIST = 17,
    EINVAL = 22,
    EMFILE = 24,
    ENOSYS = 38,
}

impl Errno {
    pub fn as_str(&self) -> &'static str {
        match self {
            Errno::EPERM => "EPERM",
            Errno::ENOENT => "ENOENT",
            Errno::ESRCH => "ESRCH",
            Errno::EIO => "EIO",
            Errno::E2BIG => "E2BIG",
            Errno::ENOEXEC => "ENOEXEC",
            Errno::EBADF => "EBADF",
            Errno::ECHILD => "ECHILD",
            Errno::ENOMEM => "ENOMEM",
            Errno::EFAULT => "EFAULT",
            Errno::EEXIST => "EEXIST",
            Errno::EINVAL => "EINVAL",
            Errno::EMFILE => "EMFILE",
            Errno::ENOSYS => "ENOSYS",
        }
    }
}

pub fn verbose() -> bool {
    VERBOSE.get().copied().unwrap_or(0) > 0
}

/// Record a failed syscall and produce the value handed back to the user.
pub fn syscall_error(e: Errno, syscall: &str, message: &str) -> i32 {
    if verbose() {
        warn!(target: "syscall", errno = e.as_str(), "{}: {}", syscall, message);
    } else {
        debug!(target: "syscall", errno = e.as_str(), "{}: {}", syscall, message);
    }
    SYSCALL_FAILED
}
