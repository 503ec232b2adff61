//! The simulated hardware the kernel runs on: physical memory, a register
//! file, a timer, a console and a flat in-memory file system that holds
//! COFF executables and user files.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

pub mod coff;
pub mod config;
pub mod console;
pub mod filesys;
pub mod memory;
pub mod processor;
pub mod timer;

pub use coff::{Coff, CoffBuilder, CoffError, CoffSection};
pub use config::{ConfigError, MachineConfig};
pub use console::Console;
pub use filesys::{OpenFile, StubFileSystem};
pub use memory::{PhysicalMemory, TranslationEntry};
pub use processor::{ExceptionCause, Registers};
pub use timer::Timer;

#[derive(Debug)]
pub struct Machine {
    config: MachineConfig,
    memory: PhysicalMemory,
    timer: Arc<Timer>,
    console: Console,
    fs: StubFileSystem,
    halted: AtomicBool,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Arc<Self> {
        let memory = PhysicalMemory::new(config.num_phys_pages);
        let timer = Arc::new(Timer::new(config.timer.interrupt_period));
        let console = Console::new(config.console.echo);
        if let Some(input) = &config.console.input {
            console.push_input(input.as_bytes());
        }
        if let Some(us) = config.timer.tick_interval_us {
            timer.start(std::time::Duration::from_micros(us));
        }
        info!(
            target: "machine",
            pages = config.num_phys_pages,
            period = config.timer.interrupt_period,
            "machine powered on"
        );
        Arc::new(Machine {
            config,
            memory,
            timer,
            console,
            fs: StubFileSystem::new(),
            halted: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn memory(&self) -> &PhysicalMemory {
        &self.memory
    }

    pub fn timer(&self) -> &Arc<Timer> {
        &self.timer
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn file_system(&self) -> &StubFileSystem {
        &self.fs
    }

    /// Power the machine off. Idempotent.
    pub fn halt(&self) {
        if !self.halted.swap(true, Ordering::SeqCst) {
            self.timer.stop();
            info!(target: "machine", ticks = self.timer.time(), "machine halting");
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }
}

impl Drop for Machine {
    fn drop(&mut self) {
        self.timer.stop();
    }
}
