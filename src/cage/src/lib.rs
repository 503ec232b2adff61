//! User processes ("cages"): their address spaces, file tables and the
//! global table that maps process ids to them.
pub mod cage;
pub mod fdtables;
pub mod kernel;
pub mod memory;
pub mod process;

pub use crate::cage::{add_cage, cagetable_clear, get_cage, remove_cage, Cage, Zombie, MAX_CAGEID};
pub use crate::kernel::{KernelState, LaunchError, ProcessLauncher};
pub use crate::memory::loader::LoadError;
pub use crate::memory::vmmap::AddressSpace;
pub use crate::process::{join_child, spawn_child, spawn_root, terminate, JoinOutcome, SpawnError};
