//! File system syscalls implementation
//!
//! Files live in the machine's flat file system. Descriptors index the
//! calling cage's `FdTable`; 0 and 1 are the console.
use cage::get_cage;
use sysdefs::constants::err_const::{syscall_error, Errno};
use sysdefs::constants::fs_const::MAX_STRING_LENGTH;
use tracing::trace;
use typemap::syscall_conv::*;

/// Shared body of `creat` and `open`.
fn open_common(cageid: u64, name_arg: u64, name_cageid: u64, create: bool, syscall: &str) -> i32 {
    let cage = match get_cage(cageid) {
        Some(cage) => cage,
        None => return syscall_error(Errno::ESRCH, syscall, "no such cage"),
    };
    let name = match sc_convert_addr(name_arg, name_cageid, cageid)
        .and_then(|addr| get_user_string(name_cageid, addr, MAX_STRING_LENGTH))
    {
        Some(name) => name,
        None => return syscall_error(Errno::EFAULT, syscall, "unreadable file name"),
    };

    let file = match cage.kernel.machine().file_system().open(&name, create) {
        Some(file) => file,
        None if create => return syscall_error(Errno::EINVAL, syscall, "cannot create file"),
        None => return syscall_error(Errno::ENOENT, syscall, "no such file"),
    };

    let fd = cage.fdtable.lock().get_unused_fd(file);
    match fd {
        Some(fd) => {
            trace!(target: "syscall", cage = cageid, file = %name, fd, "{}", syscall);
            fd as i32
        }
        None => syscall_error(Errno::EMFILE, syscall, "too many files open"),
    }
}

/// Open `name`, creating it empty if it does not exist. Returns the new
/// descriptor.
pub fn creat_syscall(
    cageid: u64,
    name_arg: u64,
    name_cageid: u64,
    arg2: u64,
    arg2_cageid: u64,
    arg3: u64,
    arg3_cageid: u64,
    arg4: u64,
    arg4_cageid: u64,
) -> i32 {
    if !(sc_unusedarg(arg2, arg2_cageid) && sc_unusedarg(arg3, arg3_cageid) && sc_unusedarg(arg4, arg4_cageid)) {
        return syscall_error(Errno::EFAULT, "creat", "Invalid Arguments");
    }
    open_common(cageid, name_arg, name_cageid, true, "creat")
}

/// Open an existing file. Returns the new descriptor.
pub fn open_syscall(
    cageid: u64,
    name_arg: u64,
    name_cageid: u64,
    arg2: u64,
    arg2_cageid: u64,
    arg3: u64,
    arg3_cageid: u64,
    arg4: u64,
    arg4_cageid: u64,
) -> i32 {
    if !(sc_unusedarg(arg2, arg2_cageid) && sc_unusedarg(arg3, arg3_cageid) && sc_unusedarg(arg4, arg4_cageid)) {
        return syscall_error(Errno::EFAULT, "open", "Invalid Arguments");
    }
    open_common(cageid, name_arg, name_cageid, false, "open")
}

/// Read up to `count` bytes from `fd` into the user buffer. The whole buffer
/// must be writable; only the bytes actually read are copied out.
pub fn read_syscall(
    cageid: u64,
    fd_arg: u64,
    fd_cageid: u64,
    buf_arg: u64,
    buf_cageid: u64,
    count_arg: u64,
    count_cageid: u64,
    arg4: u64,
    arg4_cageid: u64,
) -> i32 {
    if !sc_unusedarg(arg4, arg4_cageid) {
        return syscall_error(Errno::EFAULT, "read", "Invalid Arguments");
    }
    let cage = match get_cage(cageid) {
        Some(cage) => cage,
        None => return syscall_error(Errno::ESRCH, "read", "no such cage"),
    };
    let file = match sc_convert_to_fd(fd_arg, fd_cageid, cageid).and_then(|fd| cage.fdtable.lock().translate(fd)) {
        Some(file) => file,
        None => return syscall_error(Errno::EBADF, "read", "Bad File Descriptor"),
    };
    let count = match sc_convert_sysarg_to_usize(count_arg, count_cageid, cageid) {
        Some(count) => count,
        None => return syscall_error(Errno::EINVAL, "read", "negative count"),
    };
    let addr = match sc_convert_addr(buf_arg, buf_cageid, cageid) {
        Some(addr) => addr,
        None => return syscall_error(Errno::EFAULT, "read", "bad buffer address"),
    };
    if count == 0 {
        return 0;
    }
    if !sc_check_user_buffer(buf_cageid, addr, count, true) {
        return syscall_error(Errno::EFAULT, "read", "buffer access violation or invalid address");
    }

    let mut buf = vec![0u8; count];
    let read = file.read(&mut buf);
    if read < 0 {
        return syscall_error(Errno::EIO, "read", "device read failed");
    }
    let read = read as usize;
    if copy_to_user(buf_cageid, addr, &buf[..read]) != read {
        return syscall_error(Errno::EFAULT, "read", "buffer access violation or invalid address");
    }
    read as i32
}

/// Write `count` bytes from the user buffer to `fd`. Returns `count`.
pub fn write_syscall(
    cageid: u64,
    fd_arg: u64,
    fd_cageid: u64,
    buf_arg: u64,
    buf_cageid: u64,
    count_arg: u64,
    count_cageid: u64,
    arg4: u64,
    arg4_cageid: u64,
) -> i32 {
    if !sc_unusedarg(arg4, arg4_cageid) {
        return syscall_error(Errno::EFAULT, "write", "Invalid Arguments");
    }
    let cage = match get_cage(cageid) {
        Some(cage) => cage,
        None => return syscall_error(Errno::ESRCH, "write", "no such cage"),
    };
    let file = match sc_convert_to_fd(fd_arg, fd_cageid, cageid).and_then(|fd| cage.fdtable.lock().translate(fd)) {
        Some(file) => file,
        None => return syscall_error(Errno::EBADF, "write", "Bad File Descriptor"),
    };
    let count = match sc_convert_sysarg_to_usize(count_arg, count_cageid, cageid) {
        Some(count) => count,
        None => return syscall_error(Errno::EINVAL, "write", "negative count"),
    };
    if count == 0 {
        return 0;
    }

    let buf = match sc_convert_addr(buf_arg, buf_cageid, cageid)
        .filter(|&addr| sc_check_user_buffer(buf_cageid, addr, count, false))
        .and_then(|addr| copy_from_user(buf_cageid, addr, count))
    {
        Some(buf) if buf.len() == count => buf,
        _ => return syscall_error(Errno::EFAULT, "write", "buffer access violation or invalid address"),
    };
    let written = file.write(&buf);
    if written < 0 || written as usize != count {
        return syscall_error(Errno::EIO, "write", "device write failed");
    }
    written
}

pub fn close_syscall(
    cageid: u64,
    fd_arg: u64,
    fd_cageid: u64,
    arg2: u64,
    arg2_cageid: u64,
    arg3: u64,
    arg3_cageid: u64,
    arg4: u64,
    arg4_cageid: u64,
) -> i32 {
    if !(sc_unusedarg(arg2, arg2_cageid) && sc_unusedarg(arg3, arg3_cageid) && sc_unusedarg(arg4, arg4_cageid)) {
        return syscall_error(Errno::EFAULT, "close", "Invalid Arguments");
    }
    let cage = match get_cage(cageid) {
        Some(cage) => cage,
        None => return syscall_error(Errno::ESRCH, "close", "no such cage"),
    };
    match sc_convert_to_fd(fd_arg, fd_cageid, cageid) {
        Some(fd) if cage.fdtable.lock().close(fd) => 0,
        _ => syscall_error(Errno::EBADF, "close", "Bad File Descriptor"),
    }
}

/// Remove `name` from the file system. Handles already open on it keep
/// working until they are closed.
pub fn unlink_syscall(
    cageid: u64,
    name_arg: u64,
    name_cageid: u64,
    arg2: u64,
    arg2_cageid: u64,
    arg3: u64,
    arg3_cageid: u64,
    arg4: u64,
    arg4_cageid: u64,
) -> i32 {
    if !(sc_unusedarg(arg2, arg2_cageid) && sc_unusedarg(arg3, arg3_cageid) && sc_unusedarg(arg4, arg4_cageid)) {
        return syscall_error(Errno::EFAULT, "unlink", "Invalid Arguments");
    }
    let cage = match get_cage(cageid) {
        Some(cage) => cage,
        None => return syscall_error(Errno::ESRCH, "unlink", "no such cage"),
    };
    let name = match sc_convert_addr(name_arg, name_cageid, cageid)
        .and_then(|addr| get_user_string(name_cageid, addr, MAX_STRING_LENGTH))
    {
        Some(name) => name,
        None => return syscall_error(Errno::EFAULT, "unlink", "unreadable file name"),
    };
    if cage.kernel.machine().file_system().remove(&name) {
        0
    } else {
        syscall_error(Errno::ENOENT, "unlink", "no such file")
    }
}
