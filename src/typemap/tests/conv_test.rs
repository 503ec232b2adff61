use cage::{add_cage, remove_cage, Cage, KernelState};
use machine::{Machine, MachineConfig, TranslationEntry};
use std::sync::Arc;
use sysdefs::constants::machine_const::PAGE_SIZE;
use typemap::syscall_conv::*;

/// Helper: register a cage under `cageid` with `pages` writable pages of
/// memory mapped from address 0.
fn simple_init_cage(cageid: u64, pages: usize) -> Arc<Cage> {
    let machine = Machine::new(MachineConfig::default());
    let kernel = KernelState::new(machine);
    let cage = Cage::new(cageid, "conv.coff", None, Arc::clone(&kernel));
    {
        let frames = kernel.machine().memory().allocate_frames(pages).unwrap();
        let mut vmmap = cage.vmmap.lock();
        vmmap.page_table = frames
            .iter()
            .enumerate()
            .map(|(vpn, &ppn)| TranslationEntry::new(vpn, ppn, false))
            .collect();
    }
    add_cage(cage).unwrap()
}

#[test]
fn test_user_strings() {
    let cageid = 901;
    let cage = simple_init_cage(cageid, 2);
    cage.write_virtual_memory(PAGE_SIZE - 3, b"test\0");
    assert_eq!(get_user_string(cageid, PAGE_SIZE - 3, 256), Some("test".to_string()));
    // no terminator within the limit
    assert_eq!(get_user_string(cageid, PAGE_SIZE - 3, 2), None);
    // runs off the end of the mapped memory
    cage.write_virtual_memory(2 * PAGE_SIZE - 2, b"ab");
    assert_eq!(get_user_string(cageid, 2 * PAGE_SIZE - 2, 256), None);
    // unknown cage
    assert_eq!(get_user_string(999, 0, 256), None);
    remove_cage(cageid);
}

#[test]
fn test_user_buffers() {
    let cageid = 902;
    simple_init_cage(cageid, 1);
    assert_eq!(copy_to_user(cageid, 10, b"hello"), 5);
    assert_eq!(copy_from_user(cageid, 10, 5), Some(b"hello".to_vec()));
    // a copy that crosses into unmapped memory comes back short
    assert_eq!(copy_to_user(cageid, PAGE_SIZE - 2, b"wxyz"), 2);
    assert_eq!(copy_from_user(cageid, PAGE_SIZE - 2, 4), Some(b"wx".to_vec()));
    assert_eq!(copy_from_user(998, 0, 4), None);
    assert_eq!(copy_to_user(998, 0, b"x"), 0);
    remove_cage(cageid);
}

#[test]
fn test_user_buffer_checks() {
    let cageid = 903;
    let cage = simple_init_cage(cageid, 2);
    cage.vmmap.lock().page_table[1].read_only = true;
    assert!(sc_check_user_buffer(cageid, 0, 2 * PAGE_SIZE, false));
    assert!(!sc_check_user_buffer(cageid, 0, 2 * PAGE_SIZE, true));
    assert!(sc_check_user_buffer(cageid, PAGE_SIZE - 8, 8, true));
    assert!(!sc_check_user_buffer(cageid, PAGE_SIZE - 8, 9, true));
    assert!(!sc_check_user_buffer(cageid, 0, 0x7FFF_FFFF, false));
    assert!(!sc_check_user_buffer(997, 0, 1, false));
    remove_cage(cageid);
}
