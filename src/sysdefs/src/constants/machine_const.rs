//! Geometry of the simulated MIPS machine.

/// Bytes per page, and per physical frame.
pub const PAGE_SIZE: usize = 0x400;

/// Physical frames when the configuration does not say otherwise.
pub const DEFAULT_NUM_PHYS_PAGES: usize = 64;

/// Pages reserved for the user stack of every process.
pub const STACK_PAGES: usize = 8;

/// Ticks between two timer interrupts.
pub const DEFAULT_INTERRUPT_PERIOD: u64 = 500;

// Register file layout. Only the registers the kernel touches are named.
pub const REG_V0: usize = 2;
pub const REG_V1: usize = 3;
pub const REG_A0: usize = 4;
pub const REG_A1: usize = 5;
pub const REG_A2: usize = 6;
pub const REG_A3: usize = 7;
pub const REG_SP: usize = 29;
pub const REG_RA: usize = 31;
pub const REG_HI: usize = 32;
pub const REG_LO: usize = 33;
pub const REG_PC: usize = 34;
pub const REG_NEXT_PC: usize = 35;
pub const REG_CAUSE: usize = 36;
pub const REG_BAD_VADDR: usize = 37;

pub const NUM_USER_REGISTERS: usize = 38;

/// Magic number at the head of every executable image.
pub const COFF_MAGIC: u16 = 0x0162;
