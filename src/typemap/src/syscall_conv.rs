//! Top level type conversion API used by the handlers under
//! `syscalls::syscalls`.
//!
//! Every syscall argument arrives as a `u64` plus the id of the cage it
//! belongs to. Integers are carried in the low 32 bits exactly as the user
//! register held them. Pointers are virtual addresses in the address space
//! of that argument's cage.
use cage::get_cage;
use sysdefs::constants::fs_const::MAX_OPEN_FILES;
use tracing::trace;

/// Largest user virtual address plus one.
const USER_ADDRESS_LIMIT: u64 = 1 << 32;

/// Reinterpret the low 32 bits of `arg` as a signed register value.
pub fn sc_convert_sysarg_to_i32(arg: u64, _arg_cageid: u64, _cageid: u64) -> i32 {
    arg as u32 as i32
}

/// A user virtual address. `None` if `arg` cannot be one.
pub fn sc_convert_addr(arg: u64, _arg_cageid: u64, _cageid: u64) -> Option<usize> {
    if arg >= USER_ADDRESS_LIMIT {
        return None;
    }
    Some(arg as usize)
}

/// A byte count. Negative counts are rejected.
pub fn sc_convert_sysarg_to_usize(arg: u64, arg_cageid: u64, cageid: u64) -> Option<usize> {
    let count = sc_convert_sysarg_to_i32(arg, arg_cageid, cageid);
    usize::try_from(count).ok()
}

/// A file descriptor index. `None` if it cannot name a slot of the table.
pub fn sc_convert_to_fd(arg: u64, arg_cageid: u64, cageid: u64) -> Option<usize> {
    sc_convert_sysarg_to_usize(arg, arg_cageid, cageid).filter(|&fd| fd < MAX_OPEN_FILES)
}

/// A process id as passed to join.
pub fn sc_convert_to_pid(arg: u64, arg_cageid: u64, cageid: u64) -> Option<u64> {
    let pid = sc_convert_sysarg_to_i32(arg, arg_cageid, cageid);
    u64::try_from(pid).ok()
}

/// Check that an argument slot the call does not use was left empty.
/// Always true in fast builds.
#[cfg(not(feature = "secure"))]
pub fn sc_unusedarg(_arg: u64, _arg_cageid: u64) -> bool {
    true
}

#[cfg(feature = "secure")]
pub fn sc_unusedarg(arg: u64, arg_cageid: u64) -> bool {
    arg == 0 && arg_cageid == 0
}

/// Read a NUL-terminated string of at most `max_length` bytes from the
/// memory of `arg_cageid`.
pub fn get_user_string(arg_cageid: u64, addr: usize, max_length: usize) -> Option<String> {
    let cage = get_cage(arg_cageid)?;
    let string = cage.read_virtual_memory_string(addr, max_length);
    trace!(target: "syscall", cage = arg_cageid, addr, found = string.is_some(), "string from user");
    string
}

/// Check that the user buffer `[addr, addr + len)` of `arg_cageid` is
/// mapped, and writable when `writable`.
pub fn sc_check_user_buffer(arg_cageid: u64, addr: usize, len: usize, writable: bool) -> bool {
    match get_cage(arg_cageid) {
        Some(cage) => cage.is_accessible(addr, len, writable),
        None => false,
    }
}

/// Copy up to `len` bytes out of the memory of `arg_cageid`. The result is
/// short when the range runs into an unmapped page.
pub fn copy_from_user(arg_cageid: u64, addr: usize, len: usize) -> Option<Vec<u8>> {
    let cage = get_cage(arg_cageid)?;
    let mut buf = vec![0u8; len];
    let copied = cage.read_virtual_memory(addr, &mut buf);
    buf.truncate(copied);
    Some(buf)
}

/// Copy `data` into the memory of `arg_cageid`. Returns bytes copied.
pub fn copy_to_user(arg_cageid: u64, addr: usize, data: &[u8]) -> usize {
    match get_cage(arg_cageid) {
        Some(cage) => cage.write_virtual_memory(addr, data),
        None => 0,
    }
}
