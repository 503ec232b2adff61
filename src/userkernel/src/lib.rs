//! A kernel that runs user programs: it boots the simulated machine,
//! starts the first program and serves every syscall made from there on.
//!
//! ```no_run
//! use machine::MachineConfig;
//! use userkernel::UserKernel;
//!
//! let mut config = MachineConfig::default();
//! config.kernel.shell = "exec.coff".to_string();
//! let report = UserKernel::initialize(config)?.run()?;
//! print!("{}", report.output);
//! # Ok::<(), userkernel::KernelError>(())
//! ```
pub mod context;
pub mod kernel;
pub mod launcher;
pub mod programs;

pub use context::UserContext;
pub use kernel::{KernelError, RunReport, UserKernel};
pub use launcher::{ProcessExit, Program, ProgramRegistry, UserLauncher};
