//! Physical memory and the frame free list.
use parking_lot::{Mutex, RwLock};
use sysdefs::constants::machine_const::PAGE_SIZE;
use tracing::trace;

/// One row of a process page table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslationEntry {
    pub vpn: usize,
    pub ppn: usize,
    pub valid: bool,
    pub read_only: bool,
    pub used: bool,
    pub dirty: bool,
}

impl TranslationEntry {
    pub fn new(vpn: usize, ppn: usize, read_only: bool) -> Self {
        TranslationEntry {
            vpn,
            ppn,
            valid: true,
            read_only,
            used: false,
            dirty: false,
        }
    }

    /// A row that maps nothing.
    pub fn invalid(vpn: usize) -> Self {
        TranslationEntry {
            vpn,
            ppn: 0,
            valid: false,
            read_only: false,
            used: false,
            dirty: false,
        }
    }
}

pub fn page_from_address(vaddr: usize) -> usize {
    vaddr / PAGE_SIZE
}

pub fn offset_from_address(vaddr: usize) -> usize {
    vaddr % PAGE_SIZE
}

pub fn make_address(page: usize, offset: usize) -> usize {
    page * PAGE_SIZE + offset
}

/// Main memory plus the list of frames not owned by any process.
///
/// Frames are handed out from the back of the free list and returned to
/// the back, so a freshly released frame is the next one reused.
#[derive(Debug)]
pub struct PhysicalMemory {
    bytes: RwLock<Vec<u8>>,
    num_pages: usize,
    free_frames: Mutex<Vec<usize>>,
}

impl PhysicalMemory {
    pub fn new(num_pages: usize) -> Self {
        PhysicalMemory {
            bytes: RwLock::new(vec![0u8; num_pages * PAGE_SIZE]),
            num_pages,
            free_frames: Mutex::new((0..num_pages).collect()),
        }
    }

    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    pub fn len(&self) -> usize {
        self.num_pages * PAGE_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.num_pages == 0
    }

    /// Copy out of memory starting at `paddr`. Returns the number of bytes
    /// copied, clamped to the end of memory.
    pub fn read(&self, paddr: usize, buf: &mut [u8]) -> usize {
        let memory = self.bytes.read();
        if paddr >= memory.len() {
            return 0;
        }
        let amount = buf.len().min(memory.len() - paddr);
        buf[..amount].copy_from_slice(&memory[paddr..paddr + amount]);
        amount
    }

    /// Copy into memory starting at `paddr`, clamped like [`read`](Self::read).
    pub fn write(&self, paddr: usize, data: &[u8]) -> usize {
        let mut memory = self.bytes.write();
        if paddr >= memory.len() {
            return 0;
        }
        let amount = data.len().min(memory.len() - paddr);
        memory[paddr..paddr + amount].copy_from_slice(&data[..amount]);
        amount
    }

    /// Zero a whole frame.
    pub fn clear_frame(&self, ppn: usize) {
        let start = ppn * PAGE_SIZE;
        let mut memory = self.bytes.write();
        if start + PAGE_SIZE <= memory.len() {
            memory[start..start + PAGE_SIZE].fill(0);
        }
    }

    /// Take `count` frames at once, or none at all.
    pub fn allocate_frames(&self, count: usize) -> Option<Vec<usize>> {
        let mut free = self.free_frames.lock();
        if count > free.len() {
            trace!(target: "machine", wanted = count, free = free.len(), "frame allocation refused");
            return None;
        }
        let at = free.len() - count;
        let mut frames = free.split_off(at);
        frames.reverse();
        Some(frames)
    }

    pub fn release_frames(&self, frames: &[usize]) {
        let mut free = self.free_frames.lock();
        for &ppn in frames {
            assert!(ppn < self.num_pages, "released frame {} out of range", ppn);
            assert!(!free.contains(&ppn), "frame {} released twice", ppn);
            free.push(ppn);
        }
    }

    pub fn free_frame_count(&self) -> usize {
        self.free_frames.lock().len()
    }
}
