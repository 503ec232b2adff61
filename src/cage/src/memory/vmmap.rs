//! A process address space: its page table and where execution starts.
//!
//! Transfers between kernel buffers and user memory go page by page through
//! the page table. A transfer stops at the first page that is not mapped
//! (or, for writes, is read-only) and reports how many bytes made it.
use machine::memory::{offset_from_address, page_from_address};
use machine::{PhysicalMemory, TranslationEntry};
use sysdefs::constants::machine_const::PAGE_SIZE;

#[derive(Debug, Clone, Default)]
pub struct AddressSpace {
    pub page_table: Vec<TranslationEntry>,
    pub initial_pc: u32,
    pub initial_sp: u32,
    pub argc: u32,
    pub argv: u32,
}

impl AddressSpace {
    pub fn num_pages(&self) -> usize {
        self.page_table.len()
    }

    /// Frames currently owned by this address space.
    pub fn frames(&self) -> Vec<usize> {
        self.page_table
            .iter()
            .filter(|entry| entry.valid)
            .map(|entry| entry.ppn)
            .collect()
    }

    /// Forget every mapping and hand back the frames that were mapped.
    pub fn clear(&mut self) -> Vec<usize> {
        let frames = self.frames();
        for (vpn, entry) in self.page_table.iter_mut().enumerate() {
            *entry = TranslationEntry::invalid(vpn);
        }
        frames
    }

    fn translate(&self, vaddr: usize, writing: bool) -> Option<usize> {
        let entry = self.page_table.get(page_from_address(vaddr))?;
        if !entry.valid || (writing && entry.read_only) {
            return None;
        }
        Some(entry.ppn * PAGE_SIZE + offset_from_address(vaddr))
    }

    fn mark(&mut self, vaddr: usize, writing: bool) {
        if let Some(entry) = self.page_table.get_mut(page_from_address(vaddr)) {
            entry.used = true;
            if writing {
                entry.dirty = true;
            }
        }
    }

    /// Whether every byte of `[vaddr, vaddr + len)` is mapped, and writable
    /// when `writing`.
    pub fn is_accessible(&self, vaddr: usize, len: usize, writing: bool) -> bool {
        let end = match vaddr.checked_add(len) {
            Some(end) => end,
            None => return false,
        };
        let mut at = vaddr;
        while at < end {
            if self.translate(at, writing).is_none() {
                return false;
            }
            at += PAGE_SIZE - offset_from_address(at);
        }
        true
    }

    pub fn read_virtual_memory(&mut self, memory: &PhysicalMemory, vaddr: usize, data: &mut [u8]) -> usize {
        let mut done = 0;
        while done < data.len() {
            let at = vaddr + done;
            let paddr = match self.translate(at, false) {
                Some(paddr) => paddr,
                None => break,
            };
            let chunk = (data.len() - done).min(PAGE_SIZE - offset_from_address(at));
            let copied = memory.read(paddr, &mut data[done..done + chunk]);
            self.mark(at, false);
            done += copied;
            if copied < chunk {
                break;
            }
        }
        done
    }

    pub fn write_virtual_memory(&mut self, memory: &PhysicalMemory, vaddr: usize, data: &[u8]) -> usize {
        let mut done = 0;
        while done < data.len() {
            let at = vaddr + done;
            let paddr = match self.translate(at, true) {
                Some(paddr) => paddr,
                None => break,
            };
            let chunk = (data.len() - done).min(PAGE_SIZE - offset_from_address(at));
            let copied = memory.write(paddr, &data[done..done + chunk]);
            self.mark(at, true);
            done += copied;
            if copied < chunk {
                break;
            }
        }
        done
    }
}
