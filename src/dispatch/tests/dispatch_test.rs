use cage::{add_cage, get_cage, join_child, Cage, JoinOutcome, KernelState, Zombie};
use dispatch::{handle_exception, make_syscall, syscall_counts, ExceptionOutcome};
use machine::{ExceptionCause, Machine, MachineConfig, Registers, TranslationEntry};
use std::sync::Arc;
use sysdefs::constants::dispatch_const::{EAPIABORTED, ENOPROCESS};
use sysdefs::constants::machine_const::*;
use sysdefs::constants::sys_const::*;

/// Helper functions:
/// Create a test cage with two writable pages. Cages sharing `kernel` share
/// a machine.
fn simple_init_cage(cageid: u64, parent: Option<u64>, kernel: &Arc<KernelState>) -> Arc<Cage> {
    let cage = Cage::new(cageid, "dispatch_test.coff", parent, Arc::clone(kernel));
    {
        let frames = kernel.machine().memory().allocate_frames(2).unwrap();
        cage.vmmap.lock().page_table = frames
            .iter()
            .enumerate()
            .map(|(vpn, &ppn)| TranslationEntry::new(vpn, ppn, false))
            .collect();
    }
    let cage = add_cage(cage).unwrap();
    if let Some(parent) = parent.and_then(get_cage) {
        parent.children.write().push(cageid);
    }
    cage
}

fn new_kernel() -> Arc<KernelState> {
    KernelState::new(Machine::new(MachineConfig::default()))
}

fn trap(syscall: u64, args: &[i32]) -> Registers {
    let mut regs = Registers::new();
    regs.write(REG_PC, 0x40);
    regs.write(REG_V0, syscall as i32);
    for (reg, &value) in [REG_A0, REG_A1, REG_A2, REG_A3].iter().zip(args) {
        regs.write(*reg, value);
    }
    regs
}

#[test]
fn test_syscall_result_lands_in_v0() {
    let kernel = new_kernel();
    let cageid = 701;
    let cage = simple_init_cage(cageid, None, &kernel);
    cage.write_virtual_memory(0x10, b"hello\n");

    let mut regs = trap(SYSCALL_WRITE, &[1, 0x10, 6, 0x7777]);
    assert_eq!(handle_exception(cageid, &mut regs, ExceptionCause::Syscall), ExceptionOutcome::Resume);
    assert_eq!(regs.read(REG_V0), 6);
    assert_eq!(regs.read(REG_PC), 0x44);
    assert_eq!(kernel.machine().console().output_string(), "hello\n");

    // failures come back as -1 and execution continues
    let mut regs = trap(SYSCALL_CLOSE, &[9]);
    assert_eq!(handle_exception(cageid, &mut regs, ExceptionCause::Syscall), ExceptionOutcome::Resume);
    assert_eq!(regs.read(REG_V0), -1);
    assert_eq!(regs.read(REG_PC), 0x44);

    let counts = syscall_counts();
    assert!(counts.iter().any(|&(num, n)| num == SYSCALL_WRITE && n >= 1));
    assert!(counts.iter().any(|&(num, n)| num == SYSCALL_CLOSE && n >= 1));
}

#[test]
fn test_exit_through_trap() {
    let kernel = new_kernel();
    let parent = 702;
    let child = 703;
    let parent_cage = simple_init_cage(parent, None, &kernel);
    simple_init_cage(child, Some(parent), &kernel);

    let mut regs = trap(SYSCALL_EXIT, &[5]);
    assert_eq!(handle_exception(child, &mut regs, ExceptionCause::Syscall), ExceptionOutcome::Exited(5));
    assert!(get_cage(child).is_none());
    assert_eq!(
        join_child(&parent_cage, child),
        JoinOutcome::Exited(Zombie {
            cageid: child,
            exit_code: 5,
            normal: true
        })
    );
    // nothing can call into the dead cage any more
    assert_eq!(make_syscall(child, SYSCALL_CLOSE, child, 2, child, 0, 0, 0, 0, 0, 0), ENOPROCESS);
}

#[test]
fn test_faults_and_unknown_calls_kill_the_process() {
    let kernel = new_kernel();
    let parent = 704;
    let faulty = 705;
    let unknown = 706;
    let parent_cage = simple_init_cage(parent, None, &kernel);
    simple_init_cage(faulty, Some(parent), &kernel);
    simple_init_cage(unknown, Some(parent), &kernel);

    let mut regs = trap(SYSCALL_WRITE, &[]);
    assert_eq!(
        handle_exception(faulty, &mut regs, ExceptionCause::AddressError),
        ExceptionOutcome::Exited(EXIT_ABNORMAL)
    );
    let mut regs = trap(42, &[]);
    assert_eq!(
        handle_exception(unknown, &mut regs, ExceptionCause::Syscall),
        ExceptionOutcome::Exited(EXIT_ABNORMAL)
    );
    assert_eq!(make_syscall(parent, 42, parent, 0, 0, 0, 0, 0, 0, 0, 0), EAPIABORTED);

    for pid in [faulty, unknown] {
        assert!(get_cage(pid).is_none());
        assert_eq!(
            join_child(&parent_cage, pid),
            JoinOutcome::Exited(Zombie {
                cageid: pid,
                exit_code: EXIT_ABNORMAL,
                normal: false
            })
        );
    }
}

#[test]
fn test_halt_stops_every_process() {
    let kernel = new_kernel();
    let root = 707;
    let other = 708;
    simple_init_cage(root, None, &kernel);
    simple_init_cage(other, None, &kernel);
    // no root process was started, so nobody may halt
    let mut regs = trap(SYSCALL_HALT, &[]);
    assert_eq!(handle_exception(other, &mut regs, ExceptionCause::Syscall), ExceptionOutcome::Resume);
    assert_eq!(regs.read(REG_V0), -1);
    assert!(!kernel.machine().is_halted());

    kernel.terminate(cage::kernel::Termination::Halt);
    // once the machine is down every call kills the caller
    let mut regs = trap(SYSCALL_CLOSE, &[0]);
    assert_eq!(
        handle_exception(other, &mut regs, ExceptionCause::Syscall),
        ExceptionOutcome::Exited(EXIT_ABNORMAL)
    );
    assert!(get_cage(other).is_none());
    // an exit while the machine is down still removes the process
    let mut regs = trap(SYSCALL_EXIT, &[0]);
    assert_eq!(handle_exception(root, &mut regs, ExceptionCause::Syscall), ExceptionOutcome::Exited(0));
    assert!(get_cage(root).is_none());
}
