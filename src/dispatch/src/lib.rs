//! Routes traps from user programs to the syscall handlers.
pub mod dispatch;
pub mod syscall_table;

pub use dispatch::{handle_exception, make_syscall, syscall_counts, CallFunc, ExceptionOutcome};
