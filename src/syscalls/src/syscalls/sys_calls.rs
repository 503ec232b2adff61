//! System syscalls implementation
//!
//! Process control: halting the machine, exiting, starting a child from an
//! executable and joining on it.
use cage::kernel::Termination;
use cage::{get_cage, join_child, spawn_child, terminate, JoinOutcome, LoadError, SpawnError};
use sysdefs::constants::err_const::{syscall_error, Errno};
use sysdefs::constants::fs_const::{EXECUTABLE_SUFFIX, MAX_STRING_LENGTH};
use sysdefs::constants::machine_const::PAGE_SIZE;
use tracing::{debug, info};
use typemap::syscall_conv::*;

/// Reference to Nachos: `halt()`
///
/// Power the machine off. Only the root process may do this; for anyone
/// else the call fails and the machine keeps running.
pub fn halt_syscall(
    cageid: u64,
    arg1: u64,
    arg1_cageid: u64,
    arg2: u64,
    arg2_cageid: u64,
    arg3: u64,
    arg3_cageid: u64,
    arg4: u64,
    arg4_cageid: u64,
) -> i32 {
    if !(sc_unusedarg(arg1, arg1_cageid)
        && sc_unusedarg(arg2, arg2_cageid)
        && sc_unusedarg(arg3, arg3_cageid)
        && sc_unusedarg(arg4, arg4_cageid))
    {
        return syscall_error(Errno::EFAULT, "halt", "Invalid Arguments");
    }
    let cage = match get_cage(cageid) {
        Some(cage) => cage,
        None => return syscall_error(Errno::ESRCH, "halt", "no such cage"),
    };
    if cage.kernel.root_pid() != Some(cageid) {
        return syscall_error(Errno::EPERM, "halt", "only the root process may halt");
    }
    info!(target: "syscall", cage = cageid, "halt");
    cage.kernel.terminate(Termination::Halt);
    0
}

/// Reference to Nachos: `exit(status)`
///
/// Ends the calling process normally. Its files are closed, its memory is
/// freed, its children become orphans and its status is kept for a parent
/// that joins on it. The last process to exit stops the kernel.
pub fn exit_syscall(
    cageid: u64,
    status_arg: u64,
    status_cageid: u64,
    arg2: u64,
    arg2_cageid: u64,
    arg3: u64,
    arg3_cageid: u64,
    arg4: u64,
    arg4_cageid: u64,
) -> i32 {
    let status = sc_convert_sysarg_to_i32(status_arg, status_cageid, cageid);
    if !(sc_unusedarg(arg2, arg2_cageid) && sc_unusedarg(arg3, arg3_cageid) && sc_unusedarg(arg4, arg4_cageid)) {
        return syscall_error(Errno::EFAULT, "exit", "Invalid Arguments");
    }
    match terminate(cageid, status, true) {
        Some(status) => status,
        None => syscall_error(Errno::ESRCH, "exit", "no such cage"),
    }
}

/// Reference to Nachos: `exec(name, argc, argv)`
///
/// Load `name` into a new child of the caller with the `argc` strings
/// pointed to by `argv`, and start it. Returns the child's process id.
pub fn exec_syscall(
    cageid: u64,
    name_arg: u64,
    name_cageid: u64,
    argc_arg: u64,
    argc_cageid: u64,
    argv_arg: u64,
    argv_cageid: u64,
    arg4: u64,
    arg4_cageid: u64,
) -> i32 {
    if !sc_unusedarg(arg4, arg4_cageid) {
        return syscall_error(Errno::EFAULT, "exec", "Invalid Arguments");
    }
    let cage = match get_cage(cageid) {
        Some(cage) => cage,
        None => return syscall_error(Errno::ESRCH, "exec", "no such cage"),
    };
    let argc = match sc_convert_sysarg_to_usize(argc_arg, argc_cageid, cageid) {
        Some(argc) => argc,
        None => return syscall_error(Errno::EINVAL, "exec", "negative argc"),
    };
    // every argument costs at least a pointer and a NUL in the argv page
    if argc > PAGE_SIZE / 5 {
        return syscall_error(Errno::E2BIG, "exec", "argument list too long");
    }
    let name = match sc_convert_addr(name_arg, name_cageid, cageid)
        .and_then(|addr| get_user_string(name_cageid, addr, MAX_STRING_LENGTH))
    {
        Some(name) => name,
        None => return syscall_error(Errno::EFAULT, "exec", "unreadable program name"),
    };
    if !name.ends_with(EXECUTABLE_SUFFIX) {
        return syscall_error(Errno::ENOEXEC, "exec", "not a .coff executable");
    }

    let argv = match sc_convert_addr(argv_arg, argv_cageid, cageid)
        .filter(|&argv| sc_check_user_buffer(argv_cageid, argv, argc * 4, false))
    {
        Some(argv) => argv,
        None => return syscall_error(Errno::EFAULT, "exec", "bad argv address"),
    };
    let mut args = Vec::with_capacity(argc);
    for i in 0..argc {
        let pointer = match copy_from_user(argv_cageid, argv + i * 4, 4) {
            Some(bytes) if bytes.len() == 4 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            _ => return syscall_error(Errno::EFAULT, "exec", "unreadable argv entry"),
        };
        match get_user_string(argv_cageid, pointer as usize, MAX_STRING_LENGTH) {
            Some(arg) => args.push(arg),
            None => return syscall_error(Errno::EFAULT, "exec", "unreadable argument string"),
        }
    }

    match spawn_child(&cage, &name, &args) {
        Ok(child) => {
            debug!(target: "syscall", cage = cageid, child = child.cageid, program = %name, "exec");
            child.cageid as i32
        }
        Err(SpawnError::Load(LoadError::NotFound(_))) => syscall_error(Errno::ENOENT, "exec", "no such executable"),
        Err(SpawnError::Load(LoadError::InsufficientMemory { .. }))
        | Err(SpawnError::Load(LoadError::OutOfFrames { .. }))
        | Err(SpawnError::TableFull) => syscall_error(Errno::ENOMEM, "exec", "out of memory"),
        Err(SpawnError::Load(LoadError::ArgumentsTooLong(_))) => syscall_error(Errno::E2BIG, "exec", "argument list too long"),
        Err(e) => syscall_error(Errno::ENOEXEC, "exec", &e.to_string()),
    }
}

/// Reference to Nachos: `join(pid, status)`
///
/// Wait for child `pid` to exit and store its exit status at `status`
/// (skipped when the pointer is null). Returns 1 if the child exited
/// normally, 0 if it was killed by an unhandled exception, and -1 if `pid`
/// is not an unjoined child of the caller.
pub fn join_syscall(
    cageid: u64,
    pid_arg: u64,
    pid_cageid: u64,
    status_arg: u64,
    status_cageid: u64,
    arg3: u64,
    arg3_cageid: u64,
    arg4: u64,
    arg4_cageid: u64,
) -> i32 {
    if !(sc_unusedarg(arg3, arg3_cageid) && sc_unusedarg(arg4, arg4_cageid)) {
        return syscall_error(Errno::EFAULT, "join", "Invalid Arguments");
    }
    let cage = match get_cage(cageid) {
        Some(cage) => cage,
        None => return syscall_error(Errno::ESRCH, "join", "no such cage"),
    };
    let pid = match sc_convert_to_pid(pid_arg, pid_cageid, cageid) {
        Some(pid) => pid,
        None => return syscall_error(Errno::ECHILD, "join", "invalid process id"),
    };
    let status_addr = match sc_convert_addr(status_arg, status_cageid, cageid) {
        Some(addr) => addr,
        None => return syscall_error(Errno::EFAULT, "join", "bad status address"),
    };

    let zombie = match join_child(&cage, pid) {
        JoinOutcome::Exited(zombie) => zombie,
        JoinOutcome::NotChild => return syscall_error(Errno::ECHILD, "join", "not a child of the caller"),
    };
    debug!(target: "syscall", cage = cageid, child = pid, status = zombie.exit_code, normal = zombie.normal, "join");

    if status_addr != 0 && copy_to_user(status_cageid, status_addr, &zombie.exit_code.to_le_bytes()) != 4 {
        return syscall_error(Errno::EFAULT, "join", "status pointer not writable");
    }
    if zombie.normal {
        1
    } else {
        0
    }
}
