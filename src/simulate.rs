//! Scripted scenarios: drive the monitor with mock collaborators and
//! virtual time, one cycle per step.

use crate::clock::{Clock, ManualClock};
use crate::config::BattmonConfig;
use crate::error::{Error, Result};
use crate::indicator::Led;
use crate::info::{BatteryInfo, FaultState, MonitorMode};
use crate::monitor::recovery::RecoveryOutcome;
use crate::monitor::{Battery, Hardware};
use crate::property::{CableType, CapacityKind, ChargeStatus, Health, Property, VoltageKind};
use crate::supply::Supply;
use crate::supply::mock::{MockJig, MockSupply};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Collaborator readings for one step. Unset fields keep their last value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Step {
    /// Seconds to advance before the cycle; defaults to the scheduled interval.
    pub elapsed: Option<u64>,
    pub cable: Option<CableType>,
    pub status: Option<ChargeStatus>,
    pub health: Option<Health>,
    pub present: Option<bool>,
    pub jig: Option<bool>,
    pub vcell: Option<i32>,
    /// Follows `vcell` when unset.
    pub vfocv: Option<i32>,
    pub soc: Option<i32>,
    /// Follows `soc * 100` when unset.
    pub raw_soc: Option<i32>,
    pub temper: Option<i32>,
    pub siop: Option<bool>,
    /// Error-test mode, 0-5.
    pub inject: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub name: Option<String>,
    pub config: BattmonConfig,
    /// Readings before probe.
    pub initial: Step,
    pub step: Vec<Step>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Scenario(format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse(&content)
            .map_err(|e| Error::Scenario(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let scenario: Scenario =
            toml::from_str(content).map_err(|e| Error::Scenario(e.to_string()))?;
        if scenario.step.is_empty() {
            return Err(Error::Scenario("no [[step]] entries".to_string()));
        }
        Ok(scenario)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HardwareWrite {
    pub supply: Supply,
    pub property: Property,
    pub value: i32,
}

/// State after one simulated cycle.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub step: usize,
    /// Virtual seconds since the scenario started.
    pub at: u64,
    pub cable: CableType,
    pub real: ChargeStatus,
    pub shown: ChargeStatus,
    pub soc: i32,
    pub vcell: i32,
    pub temper: i32,
    pub fault: FaultState,
    pub mode: MonitorMode,
    pub weight: u32,
    pub interval: u64,
    pub led: Led,
    pub charging: bool,
    pub latches: Vec<&'static str>,
    pub writes: Vec<HardwareWrite>,
    pub recovery: Option<RecoveryOutcome>,
}

/// Names of the latch flags currently set.
pub fn latches(info: &BatteryInfo) -> Vec<&'static str> {
    [
        (info.overheated_state, "overheated"),
        (info.freezed_state, "freezed"),
        (info.full_charged_state, "full"),
        (info.abstimer_state, "abstimer"),
        (info.recharge_phase, "recharge"),
        (info.vf_state, "vf"),
        (info.health_state, "health"),
        (info.ambiguous_state, "ambiguous"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect()
}

struct Rig {
    charger: MockSupply,
    fuel_gauge: MockSupply,
    jig: MockJig,
}

impl Rig {
    fn new() -> Self {
        let rig = Self {
            charger: MockSupply::new("charger"),
            fuel_gauge: MockSupply::new("fuelgauge"),
            jig: MockJig::default(),
        };
        rig.charger
            .set_value(Property::Online, CableType::None.as_raw());
        rig.charger
            .set_value(Property::Status, ChargeStatus::Discharging.as_raw());
        rig.charger
            .set_value(Property::Health, Health::Good.as_raw());
        rig.charger.set_value(Property::Present, 1);
        rig.apply(&Step {
            vcell: Some(3_800_000),
            soc: Some(50),
            temper: Some(250),
            ..Default::default()
        });
        rig
    }

    fn apply(&self, step: &Step) {
        if let Some(cable) = step.cable {
            self.charger.set_value(Property::Online, cable.as_raw());
        }
        if let Some(status) = step.status {
            self.charger.set_value(Property::Status, status.as_raw());
        }
        if let Some(health) = step.health {
            self.charger.set_value(Property::Health, health.as_raw());
        }
        if let Some(present) = step.present {
            self.charger
                .set_value(Property::Present, i32::from(present));
        }
        if let Some(jig) = step.jig {
            self.jig.set_attached(jig);
        }
        if let Some(vcell) = step.vcell {
            self.fuel_gauge
                .set_value(Property::VoltageNow(VoltageKind::Vcell), vcell);
        }
        if let Some(vfocv) = step.vfocv.or(step.vcell) {
            self.fuel_gauge
                .set_value(Property::VoltageNow(VoltageKind::Vfocv), vfocv);
        }
        if let Some(soc) = step.soc {
            self.fuel_gauge
                .set_value(Property::Capacity(CapacityKind::Adjusted), soc);
        }
        if let Some(raw) = step.raw_soc.or(step.soc.map(|s| s * 100)) {
            self.fuel_gauge
                .set_value(Property::Capacity(CapacityKind::Raw), raw);
        }
        if let Some(temper) = step.temper {
            self.fuel_gauge.set_value(Property::Temp, temper);
        }
    }

    fn take_writes(&self) -> Vec<HardwareWrite> {
        let charger = self.charger.take_writes().into_iter().map(|w| HardwareWrite {
            supply: Supply::Charger,
            property: w.property,
            value: w.value,
        });
        let fuel_gauge = self.fuel_gauge.take_writes().into_iter().map(|w| HardwareWrite {
            supply: Supply::FuelGauge,
            property: w.property,
            value: w.value,
        });
        charger.chain(fuel_gauge).collect()
    }
}

/// Run every step and return the timeline.
pub fn run(scenario: &Scenario) -> Result<Vec<TimelineEntry>> {
    let rig = Rig::new();
    rig.apply(&scenario.initial);
    let clock = Arc::new(ManualClock::default());
    let battery = Battery::probe(
        scenario.config.clone(),
        Hardware::mock(&rig.charger, &rig.fuel_gauge, &rig.jig, clock.clone()),
    )?;
    if let Some(mode) = scenario.initial.inject {
        battery.set_injection(mode)?;
    }

    let mut timeline = Vec::with_capacity(scenario.step.len());
    let mut scheduled = Duration::ZERO;

    for (index, step) in scenario.step.iter().enumerate() {
        let advance = step.elapsed.map(Duration::from_secs).unwrap_or(scheduled);
        clock.advance(advance);
        rig.apply(step);
        if let Some(siop) = step.siop {
            battery.set_siop(siop);
        }
        if let Some(mode) = step.inject {
            battery.set_injection(mode)?;
        }

        let outcome = battery.monitor_cycle();
        let recovery = outcome.recovery.then(|| battery.recover());
        scheduled = outcome.next.interval;

        let info = battery.info();
        let shown = battery.indicator();
        debug!(step = index, fault = ?info.fault(), "simulated cycle");
        timeline.push(TimelineEntry {
            step: index,
            at: clock.now().as_secs(),
            cable: info.cable_type,
            real: info.charge_real_state,
            shown: shown.status,
            soc: shown.soc,
            vcell: info.vcell,
            temper: info.temper,
            fault: info.fault(),
            mode: info.monitor_mode,
            weight: info.monitor_weight,
            interval: outcome.next.interval.as_secs(),
            led: shown.led,
            charging: info.is_charging_enabled(),
            latches: latches(&info),
            writes: rig.take_writes(),
            recovery,
        });
    }

    Ok(timeline)
}
