//! Syscall numbers as seen by user programs (placed in register V0 before
//! the `syscall` instruction traps into the kernel).

pub const SYSCALL_HALT: u64 = 0;
pub const SYSCALL_EXIT: u64 = 1;
pub const SYSCALL_EXEC: u64 = 2;
pub const SYSCALL_JOIN: u64 = 3;
pub const SYSCALL_CREATE: u64 = 4;
pub const SYSCALL_OPEN: u64 = 5;
pub const SYSCALL_READ: u64 = 6;
pub const SYSCALL_WRITE: u64 = 7;
pub const SYSCALL_CLOSE: u64 = 8;
pub const SYSCALL_UNLINK: u64 = 9;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Status recorded for a process that was killed by an unhandled exception.
pub const EXIT_ABNORMAL: i32 = -1;

/// Human readable syscall name, used in logs.
pub fn syscall_name(num: u64) -> &'static str {
    match num {
        SYSCALL_HALT => "halt",
        SYSCALL_EXIT => "exit",
        SYSCALL_EXEC => "exec",
        SYSCALL_JOIN => "join",
        SYSCALL_CREATE => "creat",
        SYSCALL_OPEN => "open",
        SYSCALL_READ => "read",
        SYSCALL_WRITE => "write",
        SYSCALL_CLOSE => "close",
        SYSCALL_UNLINK => "unlink",
        _ => "unknown",
    }
}

/// Number of argument registers (A0 onwards) a syscall reads. The rest
/// are passed to the handler as unused.
pub fn syscall_arity(num: u64) -> usize {
    match num {
        SYSCALL_HALT => 0,
        SYSCALL_EXIT | SYSCALL_CREATE | SYSCALL_OPEN | SYSCALL_CLOSE | SYSCALL_UNLINK => 1,
        SYSCALL_JOIN => 2,
        SYSCALL_EXEC | SYSCALL_READ | SYSCALL_WRITE => 3,
        _ => 0,
    }
}
