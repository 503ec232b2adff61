use anyhow::{Context, Result};
use clap::Parser;
use machine::config::ConsoleConfig;
use machine::MachineConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use userkernel::UserKernel;

#[derive(Parser)]
#[command(name = "nachos")]
#[command(about = "Run user programs on the simulated machine", long_about = None)]
#[command(version)]
struct Cli {
    /// Program to run as the first process (default: the configured shell)
    #[arg(short = 'x', long)]
    program: Option<String>,

    /// Path to a YAML machine configuration
    #[arg(short, long)]
    config: Option<String>,

    /// Enable verbose logging (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Arguments passed to the program after its name
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

impl Cli {
    /// Apply the program, its arguments and the verbosity given on the
    /// command line over `config`.
    fn apply(&self, config: &mut MachineConfig) {
        if let Some(program) = &self.program {
            config.kernel.shell = program.clone();
            config.kernel.shell_args = self.args.clone();
        } else if !self.args.is_empty() {
            config.kernel.shell_args = self.args.clone();
        }
        config.verbosity = config.verbosity.max(self.verbose as isize);
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > verbose flag > default (warn)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match cli.verbose {
            0 => EnvFilter::new("warn"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let mut config = match &cli.config {
        Some(path) => MachineConfig::load(path).with_context(|| format!("loading {}", path))?,
        None => MachineConfig {
            console: ConsoleConfig {
                echo: true,
                ..Default::default()
            },
            ..Default::default()
        },
    };
    cli.apply(&mut config);

    let kernel = UserKernel::initialize(config)?;
    let report = kernel.run()?;
    tracing::info!(
        reason = ?report.termination,
        ticks = report.ticks,
        "machine halted"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(argv: &[&str]) -> MachineConfig {
        let mut config = MachineConfig::default();
        config.kernel.shell = "join.coff".to_string();
        config.kernel.shell_args = vec!["echo.coff".to_string()];
        Cli::try_parse_from(argv).unwrap().apply(&mut config);
        config
    }

    #[test]
    fn program_replaces_shell_and_arguments() {
        let config = applied(&["nachos", "-x", "cat.coff", "poem.txt"]);
        assert_eq!(config.kernel.shell, "cat.coff");
        assert_eq!(config.kernel.shell_args, vec!["poem.txt"]);

        let config = applied(&["nachos", "-x", "halt.coff"]);
        assert!(config.kernel.shell_args.is_empty());
    }

    #[test]
    fn trailing_arguments_go_to_the_configured_shell() {
        let config = applied(&["nachos", "-vv", "cat.coff", "hello"]);
        assert_eq!(config.kernel.shell, "join.coff");
        assert_eq!(config.kernel.shell_args, vec!["cat.coff", "hello"]);
        assert_eq!(config.verbosity, 2);

        let config = applied(&["nachos"]);
        assert_eq!(config.kernel.shell_args, vec!["echo.coff"]);
    }
}
