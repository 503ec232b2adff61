//! Binding executables to the routines that run them, and starting a user
//! thread for each new process.
use crate::context::UserContext;
use cage::{Cage, LaunchError, ProcessLauncher};
use machine::ExceptionCause;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use threads::KThread;
use tracing::{debug, warn};

/// Entry point of a user program. The return value is its exit status.
pub type Program = fn(&mut UserContext) -> i32;

/// Unwinding payload that ends a user program once its process is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessExit(pub i32);

/// Executable name to program, e.g. `"write.coff"` to the write test.
#[derive(Clone, Default)]
pub struct ProgramRegistry {
    programs: BTreeMap<String, Program>,
}

impl fmt::Debug for ProgramRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, program: Program) -> &mut Self {
        self.programs.insert(name.to_string(), program);
        self
    }

    pub fn get(&self, name: &str) -> Option<Program> {
        self.programs.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.programs.keys().map(String::as_str)
    }
}

#[derive(Debug)]
pub struct UserLauncher {
    registry: Arc<ProgramRegistry>,
}

impl UserLauncher {
    pub fn new(registry: Arc<ProgramRegistry>) -> Self {
        UserLauncher { registry }
    }
}

impl ProcessLauncher for UserLauncher {
    fn launch(&self, cage: Arc<Cage>) -> Result<KThread, LaunchError> {
        let program = self
            .registry
            .get(&cage.name)
            .ok_or_else(|| LaunchError::UnknownProgram(cage.name.clone()))?;
        let name = format!("{}#{}", cage.name, cage.cageid);
        let thread = KThread::new(move || run_user_thread(cage, program)).set_name(&name);
        thread.fork()?;
        Ok(thread)
    }
}

/// Body of every user thread: run the program, then exit with what it
/// returned. A program that panics has hit an exception the kernel does
/// not handle and is killed.
fn run_user_thread(cage: Arc<Cage>, program: Program) {
    let pid = cage.cageid;
    let mut ctx = UserContext::new(cage);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let status = program(&mut ctx);
        ctx.exit(status);
    }));
    let payload = match outcome {
        Ok(()) => return,
        Err(payload) => payload,
    };
    match payload.downcast::<ProcessExit>() {
        Ok(exit) => debug!(target: "process", pid, status = exit.0, "user thread done"),
        Err(_) => {
            warn!(target: "process", pid, "user program crashed");
            // the kill unwinds again with a `ProcessExit`
            let _ = panic::catch_unwind(AssertUnwindSafe(|| ctx.raise(ExceptionCause::IllegalInstruction)));
        }
    }
}
