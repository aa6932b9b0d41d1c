use crate::indicator::{Indicator, Led};
use crate::info::{BatteryInfo, FaultState};
use crate::interval::NextWake;
use crate::monitor::surface::{BatteryProperty, PropertyValue};
use crate::property::ChargeStatus;
use crate::simulate::{TimelineEntry, latches};
use colored::{ColoredString, Colorize};
use serde::Serialize;
use std::collections::BTreeMap;

const LABEL_W: usize = 14;

/// Everything `battmon status` reports.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub timestamp: String,
    pub indicator: Indicator,
    pub next_wake: NextWake,
    pub properties: BTreeMap<&'static str, PropertyValue>,
    pub info: BatteryInfo,
}

impl StatusReport {
    pub fn new(
        info: BatteryInfo,
        indicator: Indicator,
        next_wake: NextWake,
        properties: &[(BatteryProperty, PropertyValue)],
    ) -> Self {
        Self {
            timestamp: chrono::Local::now().to_rfc3339(),
            indicator,
            next_wake,
            properties: properties
                .iter()
                .map(|(p, v)| (p.name(), v.clone()))
                .collect(),
            info,
        }
    }
}

fn status_colored(status: ChargeStatus) -> ColoredString {
    match status {
        ChargeStatus::Charging => status.as_str().green(),
        ChargeStatus::Full => status.as_str().green().bold(),
        ChargeStatus::Discharging => status.as_str().normal(),
        ChargeStatus::NotCharging => status.as_str().yellow(),
        ChargeStatus::Unknown => status.as_str().dimmed(),
    }
}

fn fault_colored(fault: FaultState) -> ColoredString {
    let name = match fault {
        FaultState::Normal => return "none".green(),
        FaultState::Overheated => "overheated",
        FaultState::Freezed => "freezed",
        FaultState::Vf => "battery absent",
        FaultState::Health => "health",
    };
    name.red().bold()
}

fn led_colored(led: Led) -> ColoredString {
    match led {
        Led::Off => "off".dimmed(),
        Led::Charging => "charging".yellow(),
        Led::Full => "full".green(),
        Led::Fault => "fault".red(),
    }
}

fn volts(uv: i32) -> String {
    format!("{:.3} V", f64::from(uv) / 1_000_000.0)
}

fn celsius(tenths: i32) -> String {
    format!("{:.1} °C", f64::from(tenths) / 10.0)
}

pub fn print_status(report: &StatusReport) {
    let info = &report.info;
    let shown = &report.indicator;

    let latched = latches(info);
    let rows: Vec<(&str, String)> = vec![
        ("Cable", info.cable_type.to_string()),
        ("Status", status_colored(shown.status).to_string()),
        ("Charger", info.charge_real_state.to_string()),
        ("Capacity", format!("{}% (raw {:.2}%)", shown.soc, f64::from(info.raw_soc) / 100.0)),
        ("Voltage", format!("{} (ocv {})", volts(info.vcell), volts(info.vfocv))),
        ("Temperature", celsius(info.temper)),
        ("Health", info.battery_health.as_str().to_string()),
        ("Fault", fault_colored(info.fault()).to_string()),
        (
            "Latches",
            if latched.is_empty() {
                "-".to_string()
            } else {
                latched.join(", ")
            },
        ),
        (
            "Currents",
            format!("{} mA charge, {} mA input", info.charge_current, info.input_current),
        ),
        ("LED", led_colored(shown.led).to_string()),
        (
            "Next cycle",
            format!(
                "{}s +{}s ({} @ {}%)",
                report.next_wake.interval.as_secs(),
                report.next_wake.slack.as_secs(),
                info.monitor_mode,
                info.monitor_weight
            ),
        ),
    ];

    println!("{}", "Battery".bold().underline());
    for (label, value) in rows {
        let padded = format!("{:<w$}", label, w = LABEL_W);
        println!("  {} {}", padded.dimmed(), value);
    }
    println!();
}

pub fn print_property(property: BatteryProperty, value: &PropertyValue) {
    println!("{}={}", property.name(), value);
}

pub fn print_json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_timeline(name: Option<&str>, timeline: &[TimelineEntry]) {
    let title = name.unwrap_or("Scenario");
    println!("{}", title.bold().underline());
    println!(
        "{:>4} {:>7} {:>9} {:>13} {:>5} {:>6} {:>11} {:>10} {:>6}  {}",
        "Step".dimmed(),
        "Time".dimmed(),
        "Cable".cyan(),
        "Shown".cyan(),
        "SOC".cyan(),
        "Temp".cyan(),
        "Mode".cyan(),
        "Fault".cyan(),
        "Next".cyan(),
        "Latches".cyan(),
    );
    println!("{}", "-".repeat(96).dimmed());

    for entry in timeline {
        let status = format!("{:>13}", entry.shown.as_str());
        let status = match entry.shown {
            ChargeStatus::NotCharging => status.yellow(),
            ChargeStatus::Full => status.green(),
            ChargeStatus::Charging => status.green(),
            _ => status.normal(),
        };
        let fault = format!("{:>10}", format!("{:?}", entry.fault).to_lowercase());
        let fault = if entry.fault == FaultState::Normal {
            fault.dimmed()
        } else {
            fault.red()
        };
        println!(
            "{:>4} {:>6}s {:>9} {} {:>4}% {:>6.1} {:>11} {} {:>5}s  {}",
            entry.step,
            entry.at,
            entry.cable.to_string(),
            status,
            entry.soc,
            f64::from(entry.temper) / 10.0,
            entry.mode.to_string(),
            fault,
            entry.interval,
            entry.latches.join(","),
        );
        for write in &entry.writes {
            println!(
                "{:>14} {:?} {:?} = {}",
                "write".dimmed(),
                write.supply,
                write.property,
                write.value
            );
        }
        if let Some(outcome) = entry.recovery {
            println!("{:>14} {:?}", "recovery".dimmed(), outcome);
        }
    }
}
