//! The `Cage` structure, which holds the kernel-side state of one user
//! process, and the global table that maps process ids to cages.
use crate::fdtables::FdTable;
use crate::kernel::KernelState;
use crate::memory::vmmap::AddressSpace;
use machine::Registers;
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use sysdefs::constants::machine_const::{REG_A0, REG_A1, REG_PC, REG_SP};
use threads::{Condition2, KThread, Lock};

/// Exit record a child leaves behind for its parent to join on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Zombie {
    pub cageid: u64,
    pub exit_code: i32,
    /// False when the child was killed by an unhandled exception.
    pub normal: bool,
}

pub struct Cage {
    pub cageid: u64,
    /// Executable the cage runs.
    pub name: String,
    pub kernel: Arc<KernelState>,
    /// `None` for the root process and for orphans whose parent exited.
    pub parent: RwLock<Option<u64>>,
    /// Live children not yet joined.
    pub children: RwLock<Vec<u64>>,
    pub fdtable: Mutex<FdTable>,
    pub vmmap: Mutex<AddressSpace>,
    /// Exit records of children, consumed by join.
    pub zombies: Mutex<Vec<Zombie>>,
    pub thread: Mutex<Option<KThread>>,
    child_lock: Arc<Lock>,
    child_exited: Condition2,
    exiting: AtomicBool,
}

impl fmt::Debug for Cage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cage")
            .field("cageid", &self.cageid)
            .field("name", &self.name)
            .field("parent", &*self.parent.read())
            .field("children", &*self.children.read())
            .finish()
    }
}

impl Cage {
    pub fn new(cageid: u64, name: &str, parent: Option<u64>, kernel: Arc<KernelState>) -> Self {
        let fdtable = FdTable::with_console(kernel.machine().console());
        let child_lock = Arc::new(Lock::new());
        Cage {
            cageid,
            name: name.to_string(),
            parent: RwLock::new(parent),
            children: RwLock::new(Vec::new()),
            fdtable: Mutex::new(fdtable),
            vmmap: Mutex::new(AddressSpace::default()),
            zombies: Mutex::new(Vec::new()),
            thread: Mutex::new(None),
            child_exited: Condition2::new(Arc::clone(&child_lock)),
            child_lock,
            exiting: AtomicBool::new(false),
            kernel,
        }
    }

    /// Copy user memory at `vaddr` into `data`. Returns bytes copied.
    pub fn read_virtual_memory(&self, vaddr: usize, data: &mut [u8]) -> usize {
        let memory = self.kernel.machine().memory();
        self.vmmap.lock().read_virtual_memory(memory, vaddr, data)
    }

    /// Copy `data` into user memory at `vaddr`. Returns bytes copied.
    pub fn write_virtual_memory(&self, vaddr: usize, data: &[u8]) -> usize {
        let memory = self.kernel.machine().memory();
        self.vmmap.lock().write_virtual_memory(memory, vaddr, data)
    }

    /// Whether `len` bytes at `vaddr` can be read, or written when `writing`.
    pub fn is_accessible(&self, vaddr: usize, len: usize, writing: bool) -> bool {
        self.vmmap.lock().is_accessible(vaddr, len, writing)
    }

    /// Read a NUL-terminated string of at most `max_length` characters.
    /// `None` when no terminator is found in range.
    pub fn read_virtual_memory_string(&self, vaddr: usize, max_length: usize) -> Option<String> {
        let mut bytes = vec![0u8; max_length + 1];
        let read = self.read_virtual_memory(vaddr, &mut bytes);
        let end = bytes[..read].iter().position(|&b| b == 0)?;
        Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    /// Registers a user thread of this cage starts with: everything zero
    /// except PC, SP and the argc/argv argument registers.
    pub fn initial_registers(&self) -> Registers {
        let vmmap = self.vmmap.lock();
        let mut regs = Registers::new();
        regs.write(REG_PC, vmmap.initial_pc as i32);
        regs.write(REG_SP, vmmap.initial_sp as i32);
        regs.write(REG_A0, vmmap.argc as i32);
        regs.write(REG_A1, vmmap.argv as i32);
        regs
    }

    pub fn is_exiting(&self) -> bool {
        self.exiting.load(Ordering::SeqCst)
    }

    /// Flag the cage as exiting. Only the first caller gets `true`.
    pub(crate) fn begin_exit(&self) -> bool {
        !self.exiting.swap(true, Ordering::SeqCst)
    }

    /// True for a child that is still running or has exited but not been
    /// joined yet.
    pub(crate) fn is_joinable(&self, pid: u64) -> bool {
        self.children.read().contains(&pid) || self.zombies.lock().iter().any(|z| z.cageid == pid)
    }

    /// Record a child's exit and wake anyone joining on it.
    pub(crate) fn bury_child(&self, zombie: Zombie) {
        self.child_lock.acquire();
        self.children.write().retain(|&pid| pid != zombie.cageid);
        self.zombies.lock().push(zombie);
        self.child_exited.wake_all();
        self.child_lock.release();
    }

    /// Block until `pid` has left an exit record, then take it.
    pub(crate) fn wait_for_zombie(&self, pid: u64) -> Zombie {
        self.child_lock.acquire();
        let zombie = loop {
            let found = {
                let mut zombies = self.zombies.lock();
                zombies
                    .iter()
                    .position(|z| z.cageid == pid)
                    .map(|index| zombies.remove(index))
            };
            match found {
                Some(zombie) => break zombie,
                None => self.child_exited.sleep(),
            }
        };
        self.child_lock.release();
        zombie
    }
}

/// Highest process id plus one. Ids are slots in [`CAGE_MAP`].
pub const MAX_CAGEID: usize = 1024;

/// Direct-indexed process table: a cage id is its slot, and removal leaves
/// `None` behind.
pub static CAGE_MAP: Lazy<RwLock<Vec<Option<Arc<Cage>>>>> = Lazy::new(|| {
    let mut vec = Vec::with_capacity(MAX_CAGEID);
    vec.resize_with(MAX_CAGEID, || None);
    RwLock::new(vec)
});

/// Where the next id search starts; ids are handed out round-robin so a
/// freshly freed id is not reused at once.
static NEXT_CAGEID: AtomicU64 = AtomicU64::new(1);

/// Add a cage under its own id. Returns `None` when the id is out of range
/// or taken.
pub fn add_cage(cage: Cage) -> Option<Arc<Cage>> {
    let mut list = CAGE_MAP.write();
    let slot = list.get_mut(cage.cageid as usize)?;
    if slot.is_some() {
        return None;
    }
    let cage = Arc::new(cage);
    *slot = Some(Arc::clone(&cage));
    Some(cage)
}

/// Pick a free id, build the cage for it and insert it, all under one
/// table lock. `None` when the table is full.
pub fn allocate_cage(build: impl FnOnce(u64) -> Cage) -> Option<Arc<Cage>> {
    let mut list = CAGE_MAP.write();
    let start = NEXT_CAGEID.load(Ordering::Relaxed) as usize;
    let cageid = (0..MAX_CAGEID - 1)
        .map(|step| 1 + (start - 1 + step) % (MAX_CAGEID - 1))
        .find(|&id| list[id].is_none())?;
    NEXT_CAGEID.store((cageid % (MAX_CAGEID - 1) + 1) as u64, Ordering::Relaxed);
    let cage = Arc::new(build(cageid as u64));
    list[cageid] = Some(Arc::clone(&cage));
    Some(cage)
}

pub fn remove_cage(cageid: u64) -> Option<Arc<Cage>> {
    let mut list = CAGE_MAP.write();
    list.get_mut(cageid as usize).and_then(|slot| slot.take())
}

pub fn get_cage(cageid: u64) -> Option<Arc<Cage>> {
    let list = CAGE_MAP.read();
    list.get(cageid as usize).cloned().flatten()
}

/// Drop every cage that belongs to `kernel` from the table, returning them.
/// Cages of other kernels sharing the process are left alone.
pub fn cagetable_clear(kernel: &Arc<KernelState>) -> Vec<Arc<Cage>> {
    let mut list = CAGE_MAP.write();
    list.iter_mut()
        .filter(|slot| matches!(slot, Some(cage) if Arc::ptr_eq(&cage.kernel, kernel)))
        .filter_map(|slot| slot.take())
        .collect()
}
