//! Monitor cycle orchestrator.
//!
//! One `Battery` per device. Three locks, always taken in this order:
//! the error-path lock (recovery only), the monitor lock (`BatteryInfo`,
//! held for a whole cycle) and the ops lock (collaborator I/O).

pub mod recovery;
pub mod scheduler;
pub mod surface;

use crate::charge::{self, Current};
use crate::check;
use crate::clock::{Clock, SystemClock};
use crate::config::{BattmonConfig, SupplyConfig};
use crate::error::Result;
use crate::indicator::{self, Indicator};
use crate::info::{BatteryInfo, MonitorMode};
use crate::inject::FaultInjector;
use crate::interval::{self, BOOT_CYCLES, NextWake};
use crate::lock;
use crate::property::{CableType, CapacityKind, ChargeStatus, ChargeType, Health, Property, VoltageKind};
use crate::supply::mock::{MockJig, MockSupply};
use crate::supply::sysfs::{SysfsJig, SysfsSupply};
use crate::supply::{JigSense, NoJig, PowerSource, Supplies, Supply};
use crate::sysfs::SysfsRoot;
use crate::wakelock::{MONITOR_WAKE_LOCK, NoWakeLock, SysfsWakeLock, UPDATE_WAKE_LOCK, WakeLock};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Collaborators a `Battery` is probed with.
pub struct Hardware {
    pub charger: Box<dyn PowerSource>,
    pub fuel_gauge: Box<dyn PowerSource>,
    pub jig: Box<dyn JigSense>,
    pub wake_lock: Box<dyn WakeLock>,
    pub clock: Arc<dyn Clock>,
}

impl Hardware {
    /// Real devices under a sysfs root.
    pub fn sysfs(sysfs: &SysfsRoot, supply: &SupplyConfig) -> Result<Self> {
        let charger = SysfsSupply::open(sysfs, supply.charger.as_deref(), &["Mains", "USB"])?;
        let fuel_gauge = SysfsSupply::open(sysfs, supply.fuel_gauge.as_deref(), &["Battery"])?;
        info!(
            charger = charger.name(),
            fuel_gauge = fuel_gauge.name(),
            "power supplies found"
        );

        let jig: Box<dyn JigSense> = match &supply.jig_path {
            Some(path) => Box::new(SysfsJig::new(sysfs.clone(), path.trim_start_matches('/'))),
            None => Box::new(NoJig),
        };
        let wake_lock: Box<dyn WakeLock> =
            if supply.wake_lock && SysfsWakeLock::supported(sysfs) {
                Box::new(SysfsWakeLock::new(sysfs.clone()))
            } else {
                if supply.wake_lock {
                    warn!("wake locks not supported by this kernel");
                }
                Box::new(NoWakeLock::default())
            };

        Ok(Self {
            charger: Box::new(charger),
            fuel_gauge: Box::new(fuel_gauge),
            jig,
            wake_lock,
            clock: Arc::new(SystemClock::default()),
        })
    }

    /// Scripted collaborators sharing state with the given handles.
    pub fn mock(
        charger: &MockSupply,
        fuel_gauge: &MockSupply,
        jig: &MockJig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            charger: Box::new(charger.clone()),
            fuel_gauge: Box::new(fuel_gauge.clone()),
            jig: Box::new(jig.clone()),
            wake_lock: Box::new(NoWakeLock::default()),
            clock,
        }
    }
}

/// Result of one monitor cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleOutcome {
    pub next: NextWake,
    /// The battery went missing and the recovery task should run.
    pub recovery: bool,
}

/// Guarded by the monitor lock.
#[derive(Debug, Default)]
struct State {
    info: BatteryInfo,
    inject: FaultInjector,
    indicator: Indicator,
}

pub struct Battery {
    config: BattmonConfig,
    state: Mutex<State>,
    ops: Mutex<Supplies>,
    err: Mutex<()>,
    jig: Box<dyn JigSense>,
    wake_lock: Box<dyn WakeLock>,
    clock: Arc<dyn Clock>,
}

impl Battery {
    /// Validate the configuration and read the initial battery state.
    pub fn probe(config: BattmonConfig, hw: Hardware) -> Result<Self> {
        config.validate()?;
        let mut ops = Supplies::new(hw.charger, hw.fuel_gauge);

        let mut info = BatteryInfo {
            battery_present: true,
            battery_health: Health::Good,
            monitor_weight: 100,
            lpm_state: config.lpm,
            ..Default::default()
        };
        info.cable_type = CableType::from_raw(ops.get_or(Supply::Charger, Property::Online, 0));
        info.charge_real_state = ChargeStatus::from_raw(ops.get_or(
            Supply::Charger,
            Property::Status,
            ChargeStatus::Discharging.as_raw(),
        ));
        info.charge_virt_state = info.charge_real_state;
        info.charge_type = ChargeType::from_raw(ops.get_or(Supply::Charger, Property::ChargeType, 0));
        info.battery_health = Health::from_raw(ops.get_or(
            Supply::Charger,
            Property::Health,
            Health::Good.as_raw(),
        ));
        info.battery_present = ops.get_or(Supply::Charger, Property::Present, 1) != 0;
        info.vcell = ops.get_or(
            Supply::FuelGauge,
            Property::VoltageNow(VoltageKind::Vcell),
            0,
        );
        info.vfocv = ops.get_or(
            Supply::FuelGauge,
            Property::VoltageNow(VoltageKind::Vfocv),
            info.vcell,
        );
        info.v_diff = info.vcell.saturating_sub(info.vfocv);
        info.temper = ops.get_or(Supply::FuelGauge, Property::Temp, 0);
        info.soc = ops.get_or(Supply::FuelGauge, Property::Capacity(CapacityKind::Adjusted), 0);
        info.raw_soc = ops.get_or(
            Supply::FuelGauge,
            Property::Capacity(CapacityKind::Raw),
            info.soc * 100,
        );
        info.full_soc = ops.get_or(Supply::FuelGauge, Property::Capacity(CapacityKind::Full), 100);

        info!(
            cable = %info.cable_type,
            status = %info.charge_real_state,
            vcell = info.vcell,
            soc = info.soc,
            temper = info.temper,
            lpm = info.lpm_state,
            "battery probed"
        );

        Ok(Self {
            config,
            state: Mutex::new(State {
                info,
                ..Default::default()
            }),
            ops: Mutex::new(ops),
            err: Mutex::new(()),
            jig: hw.jig,
            wake_lock: hw.wake_lock,
            clock: hw.clock,
        })
    }

    pub fn config(&self) -> &BattmonConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Snapshot of the monitored state.
    pub fn info(&self) -> BatteryInfo {
        lock(&self.state).info.clone()
    }

    /// What the last cycle projected for the user.
    pub fn indicator(&self) -> Indicator {
        lock(&self.state).indicator
    }

    pub fn injection(&self) -> FaultInjector {
        lock(&self.state).inject
    }

    fn control(&self, info: &mut BatteryInfo, charge: Current, input: Current) {
        let now = self.clock.now();
        charge::control(
            info,
            &mut lock(&self.ops),
            &self.config.charge,
            now,
            charge,
            input,
        );
    }

    /// Run one Sample, Update, Decide, Apply, Project, Schedule pass.
    pub fn monitor_cycle(&self) -> CycleOutcome {
        let mut guard = lock(&self.state);
        let State {
            info,
            inject,
            indicator: shown,
        } = &mut *guard;
        let inject = *inject;
        let battery = &self.config.battery;

        // Sample
        let online = lock(&self.ops).get_or(
            Supply::Charger,
            Property::Online,
            info.cable_type.as_raw(),
        );
        let cable = CableType::from_raw(online);
        if cable != info.cable_type {
            info!(from = %info.cable_type, to = %cable, "cable changed");
            info.cable_type = cable;
        }
        if !cable.is_attached() {
            info.clear_charge_scenario();
            self.control(info, Current::OFF, Current::OFF);
        }

        let fault = check::vf_cond(info, &self.ops, self.jig.as_ref(), battery, inject)
            || check::health_cond(info, &self.ops, inject);
        let mut recovery = false;
        if fault {
            info.clear_charge_scenario();
            self.control(info, Current::OFF, Current::OFF);
            recovery = info.vf_state && self.config.recovery.enabled;
        }

        // Update
        let abnormal = self.update(info, inject);

        // Decide and apply
        if !fault && !abnormal && info.battery_present && cable.is_attached() {
            self.decide(info);
        }

        if !cable.is_attached() || self.config.charge.suspend_charging {
            self.wake_lock.release(MONITOR_WAKE_LOCK);
        } else {
            self.wake_lock.acquire(MONITOR_WAKE_LOCK);
        }

        // Project
        *shown = indicator::project(info, &self.config.indicator);
        info.charge_virt_state = shown.status;

        // Schedule
        let suspended = lock(&self.ops).is_suspended();
        let (mode, weight) =
            interval::calculate(info, battery, &self.config.interval, suspended);
        if mode != info.monitor_mode {
            debug!(from = %info.monitor_mode, to = %mode, "monitor mode");
        }
        info.monitor_mode = mode;
        info.monitor_weight = weight;
        if info.monitor_count < BOOT_CYCLES {
            info.monitor_count += 1;
        }
        let next = interval::next_wake(mode, weight, &self.config.interval);

        debug!(
            cable = %info.cable_type,
            real = %info.charge_real_state,
            shown = %shown.status,
            fault = ?info.fault(),
            vcell = info.vcell,
            soc = info.soc,
            temper = info.temper,
            mode = %mode,
            weight,
            next = next.interval.as_secs(),
            "cycle"
        );
        self.wake_lock
            .acquire_timeout(UPDATE_WAKE_LOCK, Duration::from_secs(1));

        CycleOutcome { next, recovery }
    }

    /// Refresh measurements. Returns true when the fuel gauge reports an
    /// abnormal power state and the rest of the cycle should be skipped.
    fn update(&self, info: &mut BatteryInfo, inject: FaultInjector) -> bool {
        let battery = &self.config.battery;
        let mut ops = lock(&self.ops);

        let health = ops.get_or(Supply::Charger, Property::Health, info.battery_health.as_raw());
        info.battery_health = inject.health(Health::from_raw(health));
        let status = ops.get_or(
            Supply::Charger,
            Property::Status,
            info.charge_real_state.as_raw(),
        );
        info.charge_real_state = inject.status(ChargeStatus::from_raw(status));
        let charge_type = ops.get_or(
            Supply::Charger,
            Property::ChargeType,
            info.charge_type.as_raw(),
        );
        info.charge_type = ChargeType::from_raw(charge_type);

        if ops.get(Supply::FuelGauge, Property::Present) == Some(0)
            && info.cable_type.is_attached()
        {
            warn!(cable = %info.cable_type, "fuel gauge reports no power, skipping cycle");
            return true;
        }

        let vcell = ops.get_or(
            Supply::FuelGauge,
            Property::VoltageNow(VoltageKind::Vcell),
            info.vcell,
        );
        info.vcell = inject.vcell(vcell, battery);
        info.vfocv = ops.get_or(
            Supply::FuelGauge,
            Property::VoltageNow(VoltageKind::Vfocv),
            info.vfocv,
        );
        info.v_diff = info.vcell.saturating_sub(info.vfocv);

        let temper = ops.get_or(Supply::FuelGauge, Property::Temp, info.temper);
        let temper = inject.temper(temper, battery);
        info.t_delta = temper.saturating_sub(info.temper);
        info.temper = temper;

        let soc = ops.get_or(
            Supply::FuelGauge,
            Property::Capacity(CapacityKind::Adjusted),
            info.soc,
        );
        info.soc = inject.soc(soc);
        let raw_soc = ops.get_or(
            Supply::FuelGauge,
            Property::Capacity(CapacityKind::Raw),
            info.raw_soc,
        );
        info.r_s_delta = raw_soc.saturating_sub(info.raw_soc);
        info.raw_soc = raw_soc;
        info.full_soc = ops.get_or(
            Supply::FuelGauge,
            Property::Capacity(CapacityKind::Full),
            info.full_soc,
        );

        if info.ambiguous_state {
            if charge::transition_settled(info) {
                debug!(status = %info.charge_real_state, "charger caught up");
                info.ambiguous_state = false;
                info.charge_virt_state = info.charge_real_state;
            }
        } else {
            info.charge_virt_state = info.charge_real_state;
        }
        false
    }

    /// Temperature, full charge, abstimer and recharge, then the cable policy.
    fn decide(&self, info: &mut BatteryInfo) {
        let battery = &self.config.battery;

        if check::temper_cond(info, battery) {
            self.control(info, Current::OFF, Current::OFF);
            return;
        }

        let was_full = info.full_charged_state;
        if check::full_charged_cond(info, &self.ops, battery, self.clock.as_ref()) {
            if !was_full {
                lock(&self.ops).set(
                    Supply::FuelGauge,
                    Property::Status,
                    ChargeStatus::Full.as_raw(),
                );
            }
            self.control(info, Current::OFF, Current::Keep);
            info.recharge_phase = true;
            return;
        }

        if check::abstimer_cond(info, battery, self.clock.now()) {
            self.control(info, Current::OFF, Current::Keep);
            info.recharge_phase = true;
            return;
        }

        if info.recharge_phase {
            if !check::recharge_cond(info, battery) {
                return;
            }
            if !info.is_charging_enabled() {
                info!(vcell = info.vcell, "recharging");
            }
            info.full_charged_state = false;
        }

        if let Some(currents) = self.config.charge.currents(info.cable_type) {
            self.control(
                info,
                Current::Set(currents.charge),
                Current::Set(currents.input),
            );
        }
    }

    /// Enter system suspend: drop collaborator writes and switch to the
    /// suspended polling rates. Returns the wake-up to arm while asleep.
    pub fn suspend(&self) -> NextWake {
        let mut state = lock(&self.state);
        lock(&self.ops).set_suspended(true);
        let info = &mut state.info;
        info.monitor_mode = info.monitor_mode.suspended();
        info!(mode = %info.monitor_mode, "suspended");
        interval::next_wake(info.monitor_mode, info.monitor_weight, &self.config.interval)
    }

    pub fn resume(&self) {
        let mut state = lock(&self.state);
        lock(&self.ops).set_suspended(false);
        let info = &mut state.info;
        info.monitor_mode = match info.monitor_mode {
            MonitorMode::ChngSusp => MonitorMode::Chng,
            MonitorMode::NormSusp => MonitorMode::Norm,
            other => other,
        };
        info!("resumed");
    }

    pub fn is_suspended(&self) -> bool {
        lock(&self.ops).is_suspended()
    }

    /// Board-level thermal throttling. Takes effect on the next cycle.
    pub fn set_siop(&self, active: bool) {
        let mut state = lock(&self.state);
        if state.info.siop_state != active {
            info!(active, "siop");
        }
        state.info.siop_state = active;
    }

    /// Low-power (charge-only) mode.
    pub fn set_lpm(&self, active: bool) {
        lock(&self.state).info.lpm_state = active;
    }

    /// Select an error-test mode (0-5).
    pub fn set_injection(&self, mode: i64) -> Result<()> {
        let inject = FaultInjector::from_mode(mode)?;
        let mut state = lock(&self.state);
        if state.inject != inject {
            warn!(mode = inject.mode(), "error test mode");
        }
        state.inject = inject;
        Ok(())
    }

    /// Ask the fuel gauge to re-estimate the SOC. Returns whether the
    /// write reached the hardware.
    pub fn reset_soc(&self) -> bool {
        let applied = lock(&self.ops).set(
            Supply::FuelGauge,
            Property::Capacity(CapacityKind::Adjusted),
            1,
        );
        if applied {
            info!("fuel gauge SOC reset");
        }
        applied
    }
}
