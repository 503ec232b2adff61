//! Booting the kernel and running the first user program.
use crate::launcher::{ProgramRegistry, UserLauncher};
use crate::programs;
use cage::kernel::Termination;
use cage::{cagetable_clear, spawn_root, KernelState, SpawnError};
use machine::{ConfigError, Machine, MachineConfig};
use std::sync::Arc;
use sysdefs::constants::sys_const::syscall_name;
use sysdefs::constants::VERBOSE;
use thiserror::Error;
use threads::Alarm;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum KernelError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: SpawnError,
    },
}

/// What a finished run left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub termination: Termination,
    /// Everything user programs wrote to the console.
    pub output: String,
    pub ticks: u64,
}

#[derive(Debug)]
pub struct UserKernel {
    kernel: Arc<KernelState>,
    registry: Arc<ProgramRegistry>,
    alarm: Arc<Alarm>,
}

impl UserKernel {
    /// Boot with the builtin programs.
    pub fn initialize(config: MachineConfig) -> Result<Self, KernelError> {
        Self::with_programs(config, programs::builtin())
    }

    /// Boot with `registry` as the set of runnable programs. Each one is
    /// installed in the file system as an executable of the same name.
    pub fn with_programs(config: MachineConfig, registry: ProgramRegistry) -> Result<Self, KernelError> {
        config.validate()?;
        let _ = VERBOSE.set(config.verbosity);

        let machine = Machine::new(config);
        for name in registry.names() {
            machine.file_system().install(name, programs::executable_image(name));
        }
        let alarm = Alarm::new(Arc::clone(machine.timer()));
        let kernel = KernelState::new(machine);
        let registry = Arc::new(registry);
        kernel.set_launcher(Arc::new(UserLauncher::new(Arc::clone(&registry))));
        debug!(target: "process", programs = ?registry, "kernel initialized");

        Ok(UserKernel {
            kernel,
            registry,
            alarm,
        })
    }

    pub fn machine(&self) -> &Arc<Machine> {
        self.kernel.machine()
    }

    pub fn kernel(&self) -> &Arc<KernelState> {
        &self.kernel
    }

    pub fn registry(&self) -> &ProgramRegistry {
        &self.registry
    }

    pub fn alarm(&self) -> &Arc<Alarm> {
        &self.alarm
    }

    /// Run the configured shell program as the root process and wait for
    /// the kernel to stop, either because every process exited or because
    /// the root halted. The shell gets its own name as `argv[0]`.
    pub fn run(&self) -> Result<RunReport, KernelError> {
        let config = self.machine().config();
        let program = config.kernel.shell.clone();
        let args: Vec<String> = std::iter::once(program.clone())
            .chain(config.kernel.shell_args.iter().cloned())
            .collect();

        info!(target: "process", program = %program, "starting root process");
        spawn_root(&self.kernel, &program, &args).map_err(|source| KernelError::Spawn { program, source })?;
        let termination = self.kernel.wait_for_termination();

        let leftover = cagetable_clear(&self.kernel);
        if !leftover.is_empty() {
            debug!(target: "process", count = leftover.len(), "processes still alive at shutdown");
        }
        for (num, count) in dispatch::syscall_counts() {
            debug!(target: "syscall", "{}: {} calls", syscall_name(num), count);
        }

        Ok(RunReport {
            termination,
            output: self.machine().console().output_string(),
            ticks: self.machine().timer().time(),
        })
    }
}
