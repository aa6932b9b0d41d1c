use crate::monitor::surface::BatteryProperty;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "battmon",
    about = "Battery monitor and charge controller for Linux power_supply devices",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output as JSON instead of formatted tables
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of the system and user files
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Resolve sysfs paths under this directory instead of /
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the monitor loop until interrupted
    Run {
        /// Throttle charging to the SIOP current
        #[arg(long)]
        siop: bool,

        /// Error-test mode: 1 full, 2 freeze, 3 overheat, 4 over-voltage, 5 battery absent
        #[arg(long, value_name = "MODE", value_parser = clap::value_parser!(i64).range(0..=5))]
        inject: Option<i64>,

        /// Stop after this many cycles
        #[arg(long, value_name = "N")]
        cycles: Option<u32>,
    },

    /// Run one monitor cycle and show the resulting state
    Status {
        /// Show a single property
        #[arg(long, value_enum)]
        property: Option<BatteryProperty>,
    },

    /// Replay a TOML scenario against mock hardware
    Simulate {
        /// Scenario file with [[step]] tables
        scenario: PathBuf,
    },

    /// Ask the fuel gauge to re-estimate its state of charge
    ResetSoc,

    /// Print the effective configuration as TOML
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (auto-detected if omitted)
        shell: Option<Shell>,
    },
}

/// Print shell completions to stdout.
pub fn print_completions(shell: Option<Shell>) {
    let shell = shell.or_else(Shell::from_env).unwrap_or_else(|| {
        eprintln!(
            "Could not detect shell. Specify one: battmon completions bash|zsh|fish|elvish|powershell"
        );
        std::process::exit(1);
    });
    clap_complete::generate(shell, &mut Cli::command(), "battmon", &mut std::io::stdout());
}
