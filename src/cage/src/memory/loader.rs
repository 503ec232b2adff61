//! Builds an address space from a COFF executable in the file system.
//!
//! Layout of a loaded process, in virtual pages:
//!
//! ```text
//! [ sections ... ][ stack: STACK_PAGES ][ argv page ]
//! 0                                     ^ initial SP
//! ```
use super::vmmap::AddressSpace;
use machine::{Coff, CoffError, Machine, TranslationEntry};
use sysdefs::constants::machine_const::{PAGE_SIZE, STACK_PAGES};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("executable {0} not found")]
    NotFound(String),

    #[error("coff load failed: {0}")]
    Coff(#[from] CoffError),

    #[error("fragmented executable: section {section} starts at page {found}, expected {expected}")]
    Fragmented {
        section: String,
        expected: usize,
        found: usize,
    },

    #[error("arguments too long: {0} bytes do not fit in one page")]
    ArgumentsTooLong(usize),

    #[error("insufficient physical memory: {needed} pages needed, machine has {total}")]
    InsufficientMemory { needed: usize, total: usize },

    #[error("not enough free frames: {needed} needed, {free} free")]
    OutOfFrames { needed: usize, free: usize },

    #[error("could not copy arguments into the new address space")]
    ArgumentCopy,
}

fn read_executable(machine: &Machine, name: &str) -> Result<Vec<u8>, LoadError> {
    let file = machine
        .file_system()
        .open(name, false)
        .ok_or_else(|| LoadError::NotFound(name.to_string()))?;
    let mut image = Vec::with_capacity(file.length().max(0) as usize);
    let mut chunk = [0u8; PAGE_SIZE];
    loop {
        let n = file.read(&mut chunk);
        if n <= 0 {
            break;
        }
        image.extend_from_slice(&chunk[..n as usize]);
    }
    file.close();
    Ok(image)
}

/// Load `name` and lay out `args` for it. On failure no frames stay
/// allocated.
pub fn load(machine: &Machine, name: &str, args: &[String]) -> Result<AddressSpace, LoadError> {
    debug!(target: "process", program = name, "load");

    let coff = Coff::parse(&read_executable(machine, name)?)?;

    // sections must be contiguous and start at page 0
    let mut num_pages = 0;
    for section in coff.sections() {
        if section.first_vpn() != num_pages {
            return Err(LoadError::Fragmented {
                section: section.name().to_string(),
                expected: num_pages,
                found: section.first_vpn(),
            });
        }
        num_pages += section.num_pages();
    }

    // 4 bytes for each argv[] pointer, then the string and its NUL
    let args_size: usize = args.iter().map(|arg| 4 + arg.len() + 1).sum();
    if args_size > PAGE_SIZE {
        return Err(LoadError::ArgumentsTooLong(args_size));
    }

    num_pages += STACK_PAGES;
    let initial_sp = num_pages * PAGE_SIZE;
    num_pages += 1;

    let memory = machine.memory();
    if num_pages > memory.num_pages() {
        return Err(LoadError::InsufficientMemory {
            needed: num_pages,
            total: memory.num_pages(),
        });
    }
    let frames = memory
        .allocate_frames(num_pages)
        .ok_or_else(|| LoadError::OutOfFrames {
            needed: num_pages,
            free: memory.free_frame_count(),
        })?;

    let mut space = AddressSpace {
        page_table: frames
            .iter()
            .enumerate()
            .map(|(vpn, &ppn)| {
                memory.clear_frame(ppn);
                TranslationEntry::new(vpn, ppn, false)
            })
            .collect(),
        initial_pc: coff.entry_point(),
        initial_sp: initial_sp as u32,
        argc: args.len() as u32,
        argv: 0,
    };

    for section in coff.sections() {
        debug!(
            target: "process",
            "\tinitializing {} section ({} pages)",
            section.name(),
            section.num_pages()
        );
        for spn in 0..section.num_pages() {
            let entry = &mut space.page_table[section.first_vpn() + spn];
            entry.read_only = section.is_read_only();
            if !section.is_bss() {
                memory.write(entry.ppn * PAGE_SIZE, &section.page_bytes(spn));
            }
        }
    }

    // argv pointers at the start of the last page, strings right after
    let mut entry_offset = (num_pages - 1) * PAGE_SIZE;
    let mut string_offset = entry_offset + args.len() * 4;
    space.argv = entry_offset as u32;
    for arg in args {
        let pointer = (string_offset as u32).to_le_bytes();
        let mut string = arg.as_bytes().to_vec();
        string.push(0);
        if space.write_virtual_memory(memory, entry_offset, &pointer) != 4
            || space.write_virtual_memory(memory, string_offset, &string) != string.len()
        {
            memory.release_frames(&space.clear());
            return Err(LoadError::ArgumentCopy);
        }
        entry_offset += 4;
        string_offset += string.len();
    }

    Ok(space)
}
