use anyhow::{Context, Result};
use battmon::cli::{Cli, Command};
use battmon::config::BattmonConfig;
use battmon::error::Error;
use battmon::monitor::surface::BatteryProperty;
use battmon::monitor::{Battery, Hardware, scheduler};
use battmon::output::{self, StatusReport};
use battmon::simulate::{self, Scenario};
use battmon::sysfs::SysfsRoot;
use clap::Parser;
use colored::Colorize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Globals {
        json: cli.json,
        config: cli.config,
        root: cli.root,
    };

    match cli.command {
        Command::Run {
            siop,
            inject,
            cycles,
        } => cmd_run(&ctx, siop, inject, cycles)?,
        Command::Status { property } => cmd_status(&ctx, property)?,
        Command::Simulate { scenario } => cmd_simulate(&ctx, &scenario)?,
        Command::ResetSoc => cmd_reset_soc(&ctx)?,
        Command::Config => cmd_config(&ctx)?,
        Command::Completions { shell } => battmon::cli::print_completions(shell),
    }

    Ok(())
}

struct Globals {
    json: bool,
    config: Option<PathBuf>,
    root: Option<PathBuf>,
}

impl Globals {
    fn sysfs(&self) -> SysfsRoot {
        match &self.root {
            Some(root) => SysfsRoot::new(root),
            None => SysfsRoot::system(),
        }
    }

    fn load_config(&self) -> Result<BattmonConfig> {
        Ok(battmon::config::load(self.config.as_ref())?)
    }

    fn probe(&self) -> Result<Battery> {
        let config = self.load_config()?;
        let hw = Hardware::sysfs(&self.sysfs(), &config.supply)?;
        Ok(Battery::probe(config, hw)?)
    }

    /// Writing the real sysfs needs root; a relocated root doesn't.
    fn require_root(&self, command: &str) -> Result<()> {
        if self.root.is_none() && !nix::unistd::geteuid().is_root() {
            return Err(Error::NotRoot {
                operation: format!("battmon {}", command),
            }
            .into());
        }
        Ok(())
    }
}

fn cmd_run(ctx: &Globals, siop: bool, inject: Option<i64>, cycles: Option<u32>) -> Result<()> {
    ctx.require_root("run")?;
    let battery = Arc::new(ctx.probe()?);
    battery.set_siop(siop);
    if let Some(mode) = inject {
        battery.set_injection(mode)?;
    }

    if let Some(cycles) = cycles {
        for n in 1..=cycles {
            let outcome = battery.monitor_cycle();
            if outcome.recovery {
                let recovered = battery.recover();
                tracing::info!(?recovered, "recovery finished");
            }
            if ctx.json {
                output::print_json(&battery.info())?;
            }
            if n < cycles {
                battery.clock().sleep(outcome.next.interval);
            }
        }
        return Ok(());
    }

    println!("{}", "Battery monitor running".bold());
    println!("Press Ctrl+C to stop");
    let (_handle, thread) = scheduler::spawn(Arc::clone(&battery));
    thread
        .join()
        .map_err(|_| anyhow::anyhow!("monitor thread panicked"))?;
    Ok(())
}

fn cmd_status(ctx: &Globals, property: Option<BatteryProperty>) -> Result<()> {
    let battery = ctx.probe()?;
    let outcome = battery.monitor_cycle();

    if let Some(property) = property {
        let value = battery.get_property(property);
        if ctx.json {
            output::print_json(&BTreeMap::from([(property.name(), value)]))?;
        } else {
            output::print_property(property, &value);
        }
        return Ok(());
    }

    let report = StatusReport::new(
        battery.info(),
        battery.indicator(),
        outcome.next,
        &battery.properties(),
    );
    if ctx.json {
        output::print_json(&report)?;
    } else {
        output::print_status(&report);
    }
    Ok(())
}

fn cmd_simulate(ctx: &Globals, path: &PathBuf) -> Result<()> {
    let mut scenario = Scenario::load(path)?;
    if ctx.config.is_some() {
        scenario.config = ctx.load_config()?;
    }
    let timeline = simulate::run(&scenario)
        .with_context(|| format!("scenario {}", path.display()))?;

    if ctx.json {
        output::print_json(&timeline)?;
    } else {
        output::print_timeline(scenario.name.as_deref(), &timeline);
    }
    Ok(())
}

fn cmd_reset_soc(ctx: &Globals) -> Result<()> {
    ctx.require_root("reset-soc")?;
    let battery = ctx.probe()?;
    if !battery.reset_soc() {
        anyhow::bail!("fuel gauge rejected the SOC reset");
    }
    println!("{}", "Fuel gauge SOC reset requested.".green());
    Ok(())
}

fn cmd_config(ctx: &Globals) -> Result<()> {
    let config = ctx.load_config()?;
    if ctx.json {
        output::print_json(&config)?;
    } else {
        print!("{}", toml::to_string_pretty(&config)?);
    }
    Ok(())
}
