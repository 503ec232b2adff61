//! Process lifecycle: creation from an executable, exit, and join.
use crate::cage::{allocate_cage, get_cage, remove_cage, Cage, Zombie};
use crate::kernel::{KernelState, LaunchError, Termination};
use crate::memory::loader::{self, LoadError};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("process table is full")]
    TableFull,

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("no process launcher installed")]
    NoLauncher,

    #[error("kernel already has a root process")]
    RootExists,

    #[error("kernel has terminated")]
    Terminated,
}

fn spawn(
    kernel: &Arc<KernelState>,
    name: &str,
    args: &[String],
    parent: Option<&Arc<Cage>>,
) -> Result<Arc<Cage>, SpawnError> {
    if kernel.termination().is_some() {
        return Err(SpawnError::Terminated);
    }
    let launcher = kernel.launcher().cloned().ok_or(SpawnError::NoLauncher)?;
    let memory = kernel.machine().memory();

    let space = loader::load(kernel.machine(), name, args)?;
    let parent_id = parent.map(|p| p.cageid);
    let cage = match allocate_cage(|pid| Cage::new(pid, name, parent_id, Arc::clone(kernel))) {
        Some(cage) => cage,
        None => {
            let mut space = space;
            memory.release_frames(&space.clear());
            return Err(SpawnError::TableFull);
        }
    };
    *cage.vmmap.lock() = space;
    kernel.process_started();
    if let Some(parent) = parent {
        parent.children.write().push(cage.cageid);
    }

    match launcher.launch(Arc::clone(&cage)) {
        Ok(thread) => {
            *cage.thread.lock() = Some(thread);
            info!(target: "process", pid = cage.cageid, parent = ?parent_id, program = name, "process started");
            Ok(cage)
        }
        Err(e) => {
            warn!(target: "process", program = name, "launch failed: {}", e);
            if let Some(parent) = parent {
                parent.children.write().retain(|&pid| pid != cage.cageid);
            }
            remove_cage(cage.cageid);
            memory.release_frames(&cage.vmmap.lock().clear());
            kernel.process_finished();
            Err(e.into())
        }
    }
}

/// Start the first process of a kernel.
pub fn spawn_root(kernel: &Arc<KernelState>, name: &str, args: &[String]) -> Result<Arc<Cage>, SpawnError> {
    if kernel.root_pid().is_some() {
        return Err(SpawnError::RootExists);
    }
    let cage = spawn(kernel, name, args, None)?;
    if !kernel.set_root(cage.cageid) {
        warn!(target: "process", pid = cage.cageid, "lost race for root process");
    }
    Ok(cage)
}

/// Start a child of `parent` running `name`.
pub fn spawn_child(parent: &Arc<Cage>, name: &str, args: &[String]) -> Result<Arc<Cage>, SpawnError> {
    spawn(&parent.kernel, name, args, Some(parent))
}

/// Tear down a process: close its files, orphan its children, free its
/// memory, leave an exit record for its parent and, if it was the last
/// live process, stop the kernel.
///
/// Returns `None` if the cage does not exist or is already exiting.
pub fn terminate(cageid: u64, status: i32, normal: bool) -> Option<i32> {
    let cage = get_cage(cageid)?;
    if !cage.begin_exit() {
        return None;
    }
    debug!(target: "process", pid = cageid, status, normal, "exit");

    cage.fdtable.lock().close_all();

    let children: Vec<u64> = cage.children.write().drain(..).collect();
    for child in children {
        if let Some(child) = get_cage(child) {
            *child.parent.write() = None;
        }
    }
    cage.zombies.lock().clear();

    let frames = cage.vmmap.lock().clear();
    cage.kernel.machine().memory().release_frames(&frames);
    remove_cage(cageid);

    let parent = *cage.parent.read();
    if let Some(parent) = parent.and_then(get_cage) {
        parent.bury_child(Zombie {
            cageid,
            exit_code: status,
            normal,
        });
    }

    if cage.kernel.process_finished() {
        cage.kernel.terminate(Termination::LastExit);
    }
    Some(status)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// `pid` is not a child of the caller, or was already joined.
    NotChild,
    Exited(Zombie),
}

/// Wait for child `pid` of `cage` to exit and collect its exit record.
pub fn join_child(cage: &Cage, pid: u64) -> JoinOutcome {
    if !cage.is_joinable(pid) {
        return JoinOutcome::NotChild;
    }
    JoinOutcome::Exited(cage.wait_for_zombie(pid))
}
