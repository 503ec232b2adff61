//! Machine and kernel configuration, read from YAML.
//!
//! ```yaml
//! num_phys_pages: 64
//! verbosity: 1
//! timer:
//!   interrupt_period: 500
//!   tick_interval_us: 100
//! console:
//!   echo: true
//! kernel:
//!   shell: exec.coff
//!   shell_args: []
//! ```
use serde::{Deserialize, Serialize};
use std::path::Path;
use sysdefs::constants::machine_const::{DEFAULT_INTERRUPT_PERIOD, DEFAULT_NUM_PHYS_PAGES};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub num_phys_pages: usize,
    pub verbosity: isize,
    pub timer: TimerConfig,
    pub console: ConsoleConfig,
    pub kernel: KernelConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    pub interrupt_period: u64,
    /// Host microseconds per period. Without it the clock only moves when
    /// driven explicitly.
    pub tick_interval_us: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub echo: bool,
    /// Bytes queued on console input at power-on.
    pub input: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// First program run by the kernel.
    pub shell: String,
    pub shell_args: Vec<String>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        MachineConfig {
            num_phys_pages: DEFAULT_NUM_PHYS_PAGES,
            verbosity: 0,
            timer: TimerConfig::default(),
            console: ConsoleConfig::default(),
            kernel: KernelConfig::default(),
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        TimerConfig {
            interrupt_period: DEFAULT_INTERRUPT_PERIOD,
            tick_interval_us: None,
        }
    }
}

impl Default for KernelConfig {
    fn default() -> Self {
        KernelConfig {
            shell: "halt.coff".to_string(),
            shell_args: Vec::new(),
        }
    }
}

impl MachineConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let config: MachineConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_phys_pages == 0 {
            return Err(ConfigError::Invalid("num_phys_pages must be positive".into()));
        }
        if self.timer.interrupt_period == 0 {
            return Err(ConfigError::Invalid(
                "timer.interrupt_period must be positive".into(),
            ));
        }
        if self.kernel.shell.is_empty() {
            return Err(ConfigError::Invalid("kernel.shell must name a program".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let config = MachineConfig::from_yaml("num_phys_pages: 16\n").unwrap();
        assert_eq!(config.num_phys_pages, 16);
        assert_eq!(config.timer.interrupt_period, DEFAULT_INTERRUPT_PERIOD);
        assert_eq!(config.kernel.shell, "halt.coff");
        assert!(!config.console.echo);
    }

    #[test]
    fn nested_sections() {
        let yaml = "kernel:\n  shell: exec.coff\n  shell_args: [a, b]\nconsole:\n  echo: true\n";
        let config = MachineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.kernel.shell, "exec.coff");
        assert_eq!(config.kernel.shell_args, vec!["a", "b"]);
        assert!(config.console.echo);
    }

    #[test]
    fn zero_pages_is_rejected() {
        assert!(matches!(
            MachineConfig::from_yaml("num_phys_pages: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            MachineConfig::from_yaml("num_phys_pages: [1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
