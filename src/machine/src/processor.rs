//! The user-visible part of the processor: a register file and the
//! exceptions that hand control to the kernel.
use std::fmt;
use sysdefs::constants::machine_const::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionCause {
    Syscall,
    PageFault,
    TlbMiss,
    ReadOnly,
    BusError,
    AddressError,
    Overflow,
    IllegalInstruction,
}

impl ExceptionCause {
    pub fn name(&self) -> &'static str {
        match self {
            ExceptionCause::Syscall => "syscall",
            ExceptionCause::PageFault => "page fault",
            ExceptionCause::TlbMiss => "TLB miss",
            ExceptionCause::ReadOnly => "read-only",
            ExceptionCause::BusError => "bus error",
            ExceptionCause::AddressError => "address error",
            ExceptionCause::Overflow => "overflow",
            ExceptionCause::IllegalInstruction => "illegal instruction",
        }
    }
}

impl fmt::Display for ExceptionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Saved user registers of one user thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    regs: [i32; NUM_USER_REGISTERS],
}

impl Default for Registers {
    fn default() -> Self {
        Registers {
            regs: [0; NUM_USER_REGISTERS],
        }
    }
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self, reg: usize) -> i32 {
        self.regs[reg]
    }

    pub fn write(&mut self, reg: usize, value: i32) {
        self.regs[reg] = value;
        if reg == REG_PC {
            self.regs[REG_NEXT_PC] = value.wrapping_add(4);
        }
    }

    /// Step past the instruction that raised the current exception.
    pub fn advance_pc(&mut self) {
        let next = self.regs[REG_NEXT_PC];
        self.regs[REG_PC] = next;
        self.regs[REG_NEXT_PC] = next.wrapping_add(4);
    }
}
