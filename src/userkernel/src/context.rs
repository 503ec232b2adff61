//! The user side of the syscall ABI.
//!
//! A `UserContext` is what a user program holds while it runs: its
//! register file and a view of its own address space. Each call puts its
//! number in V0 and arguments in A0..A3 and traps through
//! `dispatch::handle_exception`, exactly as the `syscall` instruction would.
//! Strings and buffers are first copied onto the program's stack, below the
//! initial stack pointer, so the kernel only ever sees user addresses.
use crate::launcher::ProcessExit;
use cage::Cage;
use dispatch::{handle_exception, ExceptionOutcome};
use machine::{ExceptionCause, Registers};
use std::fmt;
use std::sync::Arc;
use sysdefs::constants::fs_const::STDOUT_FILENO;
use sysdefs::constants::machine_const::*;
use sysdefs::constants::sys_const::*;

pub struct UserContext {
    cage: Arc<Cage>,
    regs: Registers,
    /// Lowest address currently holding staged data.
    stack_top: usize,
    /// Bottom of the stack region; staging below it is a stack overflow.
    stack_floor: usize,
    argc: usize,
    argv: usize,
}

impl fmt::Debug for UserContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserContext")
            .field("pid", &self.cage.cageid)
            .field("program", &self.cage.name)
            .field("pc", &self.regs.read(REG_PC))
            .finish()
    }
}

impl UserContext {
    pub fn new(cage: Arc<Cage>) -> Self {
        let regs = cage.initial_registers();
        let stack_top = regs.read(REG_SP) as u32 as usize;
        UserContext {
            argc: regs.read(REG_A0).max(0) as usize,
            argv: regs.read(REG_A1) as u32 as usize,
            stack_floor: stack_top.saturating_sub(STACK_PAGES * PAGE_SIZE),
            stack_top,
            regs,
            cage,
        }
    }

    pub fn pid(&self) -> u64 {
        self.cage.cageid
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    /// The program's argv, read back out of its address space.
    pub fn args(&self) -> Vec<String> {
        (0..self.argc)
            .filter_map(|i| {
                let mut pointer = [0u8; 4];
                if self.cage.read_virtual_memory(self.argv + 4 * i, &mut pointer) != 4 {
                    return None;
                }
                self.cage
                    .read_virtual_memory_string(u32::from_le_bytes(pointer) as usize, PAGE_SIZE)
            })
            .collect()
    }

    /// Trap into the kernel with the current registers.
    fn trap(&mut self, cause: ExceptionCause) -> i32 {
        match handle_exception(self.cage.cageid, &mut self.regs, cause) {
            ExceptionOutcome::Resume => self.regs.read(REG_V0),
            ExceptionOutcome::Exited(status) => std::panic::resume_unwind(Box::new(ProcessExit(status))),
        }
    }

    fn syscall(&mut self, num: u64, args: &[i32]) -> i32 {
        self.regs.write(REG_V0, num as i32);
        for (&reg, &value) in [REG_A0, REG_A1, REG_A2, REG_A3].iter().zip(args) {
            self.regs.write(reg, value);
        }
        self.trap(ExceptionCause::Syscall)
    }

    /// Reserve `len` bytes on the stack (word aligned) and return their
    /// address. Running off the stack kills the process.
    fn reserve(&mut self, len: usize) -> usize {
        let size = (len + 3) & !3;
        if self.stack_top < self.stack_floor + size {
            self.raise(ExceptionCause::AddressError);
        }
        self.stack_top -= size;
        self.stack_top
    }

    fn stage(&mut self, bytes: &[u8]) -> usize {
        let addr = self.reserve(bytes.len());
        if self.cage.write_virtual_memory(addr, bytes) != bytes.len() {
            self.raise(ExceptionCause::PageFault);
        }
        addr
    }

    fn stage_string(&mut self, s: &str) -> usize {
        let mut bytes = Vec::with_capacity(s.len() + 1);
        bytes.extend_from_slice(s.as_bytes());
        bytes.push(0);
        self.stage(&bytes)
    }

    /// Run `f` with staging space that is released afterwards.
    fn with_frame<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let mark = self.stack_top;
        let result = f(self);
        self.stack_top = mark;
        result
    }

    /// Deliver a non-syscall exception. The kernel kills the process, so
    /// this never returns.
    pub fn raise(&mut self, cause: ExceptionCause) -> ! {
        self.trap(cause);
        std::panic::resume_unwind(Box::new(ProcessExit(EXIT_ABNORMAL)))
    }

    /// Power the machine off. Returns -1 if the caller is not allowed to.
    pub fn halt(&mut self) -> i32 {
        self.syscall(SYSCALL_HALT, &[])
    }

    pub fn exit(&mut self, status: i32) -> ! {
        self.syscall(SYSCALL_EXIT, &[status]);
        std::panic::resume_unwind(Box::new(ProcessExit(status)))
    }

    /// Start `name` as a child with `args` as its argv. Returns the child's
    /// pid or -1.
    pub fn exec(&mut self, name: &str, args: &[&str]) -> i32 {
        self.with_frame(|ctx| {
            let name = ctx.stage_string(name) as i32;
            let argv = if args.is_empty() {
                0
            } else {
                let pointers: Vec<u8> = args
                    .iter()
                    .flat_map(|arg| (ctx.stage_string(arg) as u32).to_le_bytes())
                    .collect();
                ctx.stage(&pointers) as i32
            };
            ctx.syscall(SYSCALL_EXEC, &[name, args.len() as i32, argv])
        })
    }

    /// Wait for child `pid`, storing its exit status in `status`. Returns 1
    /// for a normal exit, 0 for an abnormal one and -1 if `pid` is not a
    /// child to join.
    pub fn join(&mut self, pid: i32, status: &mut i32) -> i32 {
        self.with_frame(|ctx| {
            let addr = ctx.stage(&status.to_le_bytes());
            let ret = ctx.syscall(SYSCALL_JOIN, &[pid, addr as i32]);
            let mut bytes = [0u8; 4];
            if ctx.cage.read_virtual_memory(addr, &mut bytes) == 4 {
                *status = i32::from_le_bytes(bytes);
            }
            ret
        })
    }

    pub fn creat(&mut self, name: &str) -> i32 {
        self.with_frame(|ctx| {
            let name = ctx.stage_string(name) as i32;
            ctx.syscall(SYSCALL_CREATE, &[name])
        })
    }

    pub fn open(&mut self, name: &str) -> i32 {
        self.with_frame(|ctx| {
            let name = ctx.stage_string(name) as i32;
            ctx.syscall(SYSCALL_OPEN, &[name])
        })
    }

    pub fn read(&mut self, fd: i32, buf: &mut [u8]) -> i32 {
        self.with_frame(|ctx| {
            let addr = ctx.reserve(buf.len());
            let ret = ctx.syscall(SYSCALL_READ, &[fd, addr as i32, buf.len() as i32]);
            if ret > 0 {
                let copied = ctx.cage.read_virtual_memory(addr, &mut buf[..ret as usize]);
                debug_assert_eq!(copied, ret as usize);
            }
            ret
        })
    }

    pub fn write(&mut self, fd: i32, data: &[u8]) -> i32 {
        self.with_frame(|ctx| {
            let addr = ctx.stage(data) as i32;
            ctx.syscall(SYSCALL_WRITE, &[fd, addr, data.len() as i32])
        })
    }

    pub fn close(&mut self, fd: i32) -> i32 {
        self.syscall(SYSCALL_CLOSE, &[fd])
    }

    pub fn unlink(&mut self, name: &str) -> i32 {
        self.with_frame(|ctx| {
            let name = ctx.stage_string(name) as i32;
            ctx.syscall(SYSCALL_UNLINK, &[name])
        })
    }

    /// Print one formatted line on the console with a single write.
    pub fn println(&mut self, args: fmt::Arguments<'_>) -> i32 {
        let line = format!("{}\n", args);
        self.write(STDOUT_FILENO as i32, line.as_bytes())
    }
}
