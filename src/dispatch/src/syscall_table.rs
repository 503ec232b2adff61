use super::dispatch::CallFunc;
use sysdefs::constants::sys_const::*;
use syscalls::syscalls::fs_calls::{
    close_syscall, creat_syscall, open_syscall, read_syscall, unlink_syscall, write_syscall,
};
use syscalls::syscalls::sys_calls::{exec_syscall, exit_syscall, halt_syscall, join_syscall};

pub const SYSCALL_TABLE: &[(u64, CallFunc)] = &[
    (SYSCALL_HALT, halt_syscall),
    (SYSCALL_EXIT, exit_syscall),
    (SYSCALL_EXEC, exec_syscall),
    (SYSCALL_JOIN, join_syscall),
    (SYSCALL_CREATE, creat_syscall),
    (SYSCALL_OPEN, open_syscall),
    (SYSCALL_READ, read_syscall),
    (SYSCALL_WRITE, write_syscall),
    (SYSCALL_CLOSE, close_syscall),
    (SYSCALL_UNLINK, unlink_syscall),
];
