//! The trap path from a user program into the kernel.
//!
//! `handle_exception` is what the processor calls when a user instruction
//! traps. For a `syscall` it decodes the registers and goes through
//! `make_syscall`, which looks the handler up in `SYSCALL_TABLE`. Every
//! other exception kills the process.
use crate::syscall_table::SYSCALL_TABLE;
use cage::get_cage;
use dashmap::DashSet;
use machine::{ExceptionCause, Registers};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use sysdefs::constants::dispatch_const::{EAPIABORTED, ENOPROCESS};
use sysdefs::constants::machine_const::{REG_A0, REG_A1, REG_A2, REG_A3, REG_V0};
use sysdefs::constants::sys_const::{
    syscall_arity, syscall_name, EXIT_ABNORMAL, EXIT_SUCCESS, SYSCALL_EXIT, SYSCALL_HALT,
};
use tracing::{debug, trace, warn};

/// Shape of every syscall handler: the calling cage, then up to four
/// arguments each paired with the cage whose memory it refers to.
pub type CallFunc = fn(
    cageid: u64,
    arg1: u64,
    arg1_cageid: u64,
    arg2: u64,
    arg2_cageid: u64,
    arg3: u64,
    arg3_cageid: u64,
    arg4: u64,
    arg4_cageid: u64,
) -> i32;

/// EXITING_TABLE
/// Cages in the middle of exiting. Calls targeting them are refused until
/// the exit finishes, by which point the cage is gone from the cage table.
static EXITING_TABLE: Lazy<DashSet<u64>> = Lazy::new(DashSet::new);

lazy_static::lazy_static! {
    /// How many times each syscall number went through `make_syscall`.
    static ref SYSCALL_COUNTS: Mutex<HashMap<u64, u64>> = Mutex::new(HashMap::new());
}

/// Snapshot of the per-syscall call counters, sorted by syscall number.
pub fn syscall_counts() -> Vec<(u64, u64)> {
    let mut counts: Vec<(u64, u64)> = SYSCALL_COUNTS.lock().iter().map(|(&k, &v)| (k, v)).collect();
    counts.sort_unstable();
    counts
}

fn lookup(syscall_num: u64) -> Option<CallFunc> {
    SYSCALL_TABLE
        .iter()
        .find(|&&(num, _)| num == syscall_num)
        .map(|&(_, func)| func)
}

/// Invoke syscall `syscall_num` on behalf of `self_cageid` against
/// `target_cageid`.
///
/// Returns the handler's result, `ENOPROCESS` when the target is exiting,
/// gone or its machine has halted, and `EAPIABORTED` for a number with no
/// handler.
pub fn make_syscall(
    self_cageid: u64,
    syscall_num: u64,
    target_cageid: u64,
    arg1: u64,
    arg1_cageid: u64,
    arg2: u64,
    arg2_cageid: u64,
    arg3: u64,
    arg3_cageid: u64,
    arg4: u64,
    arg4_cageid: u64,
) -> i32 {
    if EXITING_TABLE.contains(&target_cageid) {
        return ENOPROCESS;
    }
    let cage = match get_cage(target_cageid) {
        Some(cage) => cage,
        None => return ENOPROCESS,
    };
    if cage.kernel.machine().is_halted() {
        return ENOPROCESS;
    }
    let func = match lookup(syscall_num) {
        Some(func) => func,
        None => {
            warn!(target: "syscall", cage = self_cageid, syscall_num, "unknown syscall");
            return EAPIABORTED;
        }
    };
    *SYSCALL_COUNTS.lock().entry(syscall_num).or_insert(0) += 1;
    trace!(
        target: "syscall",
        cage = self_cageid,
        target_cage = target_cageid,
        "{}({:#x}, {:#x}, {:#x}, {:#x})",
        syscall_name(syscall_num),
        arg1,
        arg2,
        arg3,
        arg4
    );

    if syscall_num == SYSCALL_EXIT {
        EXITING_TABLE.insert(target_cageid);
        let ret = func(target_cageid, arg1, arg1_cageid, arg2, arg2_cageid, arg3, arg3_cageid, arg4, arg4_cageid);
        EXITING_TABLE.remove(&target_cageid);
        return ret;
    }
    func(target_cageid, arg1, arg1_cageid, arg2, arg2_cageid, arg3, arg3_cageid, arg4, arg4_cageid)
}

/// What the user thread does after an exception was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionOutcome {
    /// Continue at the (advanced) PC with the result in V0.
    Resume,
    /// The process is gone; its thread must stop running user code.
    Exited(i32),
}

/// Kill `cageid` after an exception it cannot survive.
fn kill(cageid: u64, why: &str) -> ExceptionOutcome {
    warn!(target: "process", cage = cageid, "killed: {}", why);
    EXITING_TABLE.insert(cageid);
    cage::terminate(cageid, EXIT_ABNORMAL, false);
    EXITING_TABLE.remove(&cageid);
    ExceptionOutcome::Exited(EXIT_ABNORMAL)
}

/// Handle a user exception raised by `cageid`'s thread, whose registers
/// are `regs`.
///
/// A syscall reads its number from V0 and its arguments from A0..A3, leaves
/// the result in V0 and moves the PC past the `syscall` instruction. Any
/// other cause, an unknown syscall, or a call refused because the kernel
/// is going down terminates the process abnormally.
pub fn handle_exception(cageid: u64, regs: &mut Registers, cause: ExceptionCause) -> ExceptionOutcome {
    if cause != ExceptionCause::Syscall {
        return kill(cageid, cause.name());
    }

    let syscall_num = regs.read(REG_V0) as u32 as u64;
    let arity = syscall_arity(syscall_num);
    let mut args = [(0u64, 0u64); 4];
    for (i, reg) in [REG_A0, REG_A1, REG_A2, REG_A3].into_iter().enumerate().take(arity) {
        args[i] = (regs.read(reg) as u32 as u64, cageid);
    }
    let [(a1, c1), (a2, c2), (a3, c3), (a4, c4)] = args;

    let ret = make_syscall(cageid, syscall_num, cageid, a1, c1, a2, c2, a3, c3, a4, c4);
    match (syscall_num, ret) {
        // the process is gone whatever exit returned; a refused exit still
        // has to tear it down
        (SYSCALL_EXIT, ENOPROCESS) => {
            let status = a1 as u32 as i32;
            cage::terminate(cageid, status, true);
            ExceptionOutcome::Exited(status)
        }
        (SYSCALL_EXIT, status) => ExceptionOutcome::Exited(status),
        (_, EAPIABORTED) => kill(cageid, "unknown syscall"),
        (_, ENOPROCESS) => kill(cageid, "kernel is shutting down"),
        (SYSCALL_HALT, 0) => {
            debug!(target: "process", cage = cageid, "halted the machine");
            cage::terminate(cageid, EXIT_SUCCESS, true);
            ExceptionOutcome::Exited(EXIT_SUCCESS)
        }
        (_, ret) => {
            regs.write(REG_V0, ret);
            regs.advance_pc();
            ExceptionOutcome::Resume
        }
    }
}
