//! Per-process file descriptor table.
use machine::{Console, OpenFile};
use std::sync::Arc;
use sysdefs::constants::fs_const::{MAX_OPEN_FILES, STDIN_FILENO, STDOUT_FILENO};
use tracing::trace;

pub type FileHandle = Arc<dyn OpenFile>;

#[derive(Debug)]
pub struct FdTable {
    slots: Vec<Option<FileHandle>>,
}

impl Default for FdTable {
    fn default() -> Self {
        FdTable {
            slots: vec![None; MAX_OPEN_FILES],
        }
    }
}

impl FdTable {
    /// A table with console input on fd 0 and console output on fd 1.
    pub fn with_console(console: &Console) -> Self {
        let mut table = FdTable::default();
        table.slots[STDIN_FILENO] = Some(Arc::from(console.open_for_reading()));
        table.slots[STDOUT_FILENO] = Some(Arc::from(console.open_for_writing()));
        table
    }

    /// Install `file` in the lowest free slot. `None` when the table is full;
    /// the file is then closed.
    pub fn get_unused_fd(&mut self, file: Box<dyn OpenFile>) -> Option<usize> {
        match self.slots.iter().position(|slot| slot.is_none()) {
            Some(fd) => {
                trace!(target: "process", fd, file = file.name(), "fd allocated");
                self.slots[fd] = Some(Arc::from(file));
                Some(fd)
            }
            None => {
                file.close();
                None
            }
        }
    }

    pub fn translate(&self, fd: usize) -> Option<FileHandle> {
        self.slots.get(fd)?.clone()
    }

    /// Free a slot. Returns false when `fd` was not open.
    pub fn close(&mut self, fd: usize) -> bool {
        match self.slots.get_mut(fd).and_then(|slot| slot.take()) {
            Some(file) => {
                file.close();
                true
            }
            None => false,
        }
    }

    pub fn close_all(&mut self) {
        for slot in self.slots.iter_mut() {
            if let Some(file) = slot.take() {
                file.close();
            }
        }
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_open(&self, name: &str) -> bool {
        self.slots.iter().flatten().any(|file| file.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use machine::StubFileSystem;

    #[test]
    fn lowest_free_slot_is_reused() {
        let console = Console::new(false);
        let fs = StubFileSystem::new();
        let mut table = FdTable::with_console(&console);
        assert_eq!(table.open_count(), 2);
        assert_eq!(table.get_unused_fd(fs.open("a", true).unwrap()), Some(2));
        assert_eq!(table.get_unused_fd(fs.open("b", true).unwrap()), Some(3));
        assert!(table.close(2));
        assert!(!table.close(2));
        assert_eq!(table.get_unused_fd(fs.open("c", true).unwrap()), Some(2));
        assert!(table.is_open("c"));
        assert!(!table.is_open("a"));
    }

    #[test]
    fn table_fills_up() {
        let fs = StubFileSystem::new();
        let mut table = FdTable::default();
        for fd in 0..MAX_OPEN_FILES {
            assert_eq!(table.get_unused_fd(fs.open("f", true).unwrap()), Some(fd));
        }
        assert_eq!(table.get_unused_fd(fs.open("f", true).unwrap()), None);
        table.close_all();
        assert_eq!(table.open_count(), 0);
        assert!(!table.close(MAX_OPEN_FILES + 3));
    }
}
