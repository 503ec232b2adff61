use cage::{add_cage, Cage, KernelState};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use dispatch::{handle_exception, make_syscall};
use machine::{ExceptionCause, Machine, MachineConfig, Registers, TranslationEntry};
use std::sync::Arc;
use sysdefs::constants::machine_const::*;
use sysdefs::constants::sys_const::{SYSCALL_CLOSE, SYSCALL_WRITE};

fn bench_cage(cageid: u64) -> Arc<Cage> {
    let kernel = KernelState::new(Machine::new(MachineConfig::default()));
    let cage = Cage::new(cageid, "bench.coff", None, Arc::clone(&kernel));
    {
        let frames = kernel.machine().memory().allocate_frames(1).unwrap();
        cage.vmmap.lock().page_table = vec![TranslationEntry::new(0, frames[0], false)];
    }
    let cage = add_cage(cage).unwrap();
    cage.write_virtual_memory(0, &[b'x'; 64]);
    cage
}

fn syscall_benchmark(c: &mut Criterion) {
    let cage = bench_cage(1);
    let cageid = cage.cageid;

    c.bench_function("make_syscall close(bad fd)", |b| {
        b.iter(|| make_syscall(cageid, SYSCALL_CLOSE, cageid, black_box(9), cageid, 0, 0, 0, 0, 0, 0))
    });

    c.bench_function("trap write 64 bytes to console", |b| {
        b.iter(|| {
            let mut regs = Registers::new();
            regs.write(REG_V0, SYSCALL_WRITE as i32);
            regs.write(REG_A0, 1);
            regs.write(REG_A1, 0);
            regs.write(REG_A2, 64);
            handle_exception(cageid, &mut regs, ExceptionCause::Syscall);
            cage.kernel.machine().console().drain_output();
            regs
        })
    });
}

criterion_group!(benches, syscall_benchmark);
criterion_main!(benches);
