//! Kernel-side handlers for every system call a user program can make.
pub mod syscalls;
