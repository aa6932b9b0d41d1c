//! Condition evaluators.
//!
//! Each evaluator reads `BatteryInfo` (and, where needed, fresh collaborator
//! values), returns whether its condition holds, and may update the one
//! latch it owns.

use crate::clock::Clock;
use crate::config::BatteryConfig;
use crate::info::BatteryInfo;
use crate::inject::FaultInjector;
use crate::lock;
use crate::property::{CableType, ChargeStatus, ChargeType, Health, Property};
use crate::supply::{JigSense, Supplies, Supply};
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Battery presence. Sets `vf_state` when the battery is gone.
pub fn vf_cond(
    info: &mut BatteryInfo,
    ops: &Mutex<Supplies>,
    jig: &dyn JigSense,
    battery: &BatteryConfig,
    inject: FaultInjector,
) -> bool {
    if jig.attached() {
        debug!("jig attached, presence check skipped");
        info.vf_state = false;
        return false;
    }
    if !info.cable_type.is_attached() && !battery.vf_check_on_battery {
        info.vf_state = false;
        return false;
    }

    let prior = i32::from(info.battery_present);
    let present = inject.present(lock(ops).get_or(Supply::Charger, Property::Present, prior));
    info.battery_present = present != 0;

    if !info.battery_present && !info.vf_state {
        warn!(cable = %info.cable_type, "battery not present");
    }
    info.vf_state = !info.battery_present;
    info.vf_state
}

/// Charger-reported battery health. Skipped while a temperature fault is latched.
pub fn health_cond(info: &mut BatteryInfo, ops: &Mutex<Supplies>, inject: FaultInjector) -> bool {
    if info.temper_state {
        return false;
    }

    let raw = lock(ops).get_or(
        Supply::Charger,
        Property::Health,
        info.battery_health.as_raw(),
    );
    info.battery_health = inject.health(Health::from_raw(raw));

    let failed = info.battery_health.is_failure();
    if failed && !info.health_state {
        warn!(health = info.battery_health.as_str(), "battery health fault");
    }
    info.health_state = failed;
    info.health_state
}

/// Two-sided temperature hysteresis.
///
/// A fault latches only while charging, at or beyond a stop threshold, and
/// clears only once the temperature is back at or inside the matching
/// recovery threshold.
pub fn temper_cond(info: &mut BatteryInfo, battery: &BatteryConfig) -> bool {
    if !info.temper_state {
        if info.charge_real_state != ChargeStatus::Charging {
            return false;
        }
        if info.temper >= battery.overheat_stop_temp {
            warn!(temper = info.temper, "battery overheated, charging stopped");
            info.overheated_state = true;
        } else if info.temper <= battery.freeze_stop_temp {
            warn!(temper = info.temper, "battery freezing, charging stopped");
            info.freezed_state = true;
        }
    } else {
        if info.overheated_state && info.temper <= battery.overheat_recovery_temp {
            info!(temper = info.temper, "recovered from overheat");
            info.overheated_state = false;
        }
        if info.freezed_state && info.temper >= battery.freeze_recovery_temp {
            info!(temper = info.temper, "recovered from freeze");
            info.freezed_state = false;
        }
    }

    info.temper_state = info.overheated_state || info.freezed_state;
    info.temper_state
}

/// Voltage and SOC criteria for a genuine full charge.
pub fn full_criteria(info: &BatteryInfo, battery: &BatteryConfig) -> bool {
    info.vcell > battery.voltage_max - battery.full_margin && info.soc > battery.full_soc
}

/// Full charge: the charger says FULL and the voltage/SOC criteria agree.
///
/// A FULL report that the criteria don't back up restarts the charger once
/// and re-reads its status.
pub fn full_charged_cond(
    info: &mut BatteryInfo,
    ops: &Mutex<Supplies>,
    battery: &BatteryConfig,
    clock: &dyn Clock,
) -> bool {
    if info.charge_real_state != ChargeStatus::Full {
        return false;
    }

    if full_criteria(info, battery) {
        if !info.full_charged_state {
            info!(vcell = info.vcell, soc = info.soc, "battery fully charged");
        }
        info.full_charged_state = true;
        return true;
    }

    if !info.is_charging_enabled() {
        return false;
    }

    warn!(
        vcell = info.vcell,
        soc = info.soc,
        "charger reported full too early, restarting charger"
    );
    lock(ops).set(
        Supply::Charger,
        Property::ChargeType,
        ChargeType::None.as_raw(),
    );
    clock.sleep(Duration::from_millis(battery.power_cycle_ms));

    let mut ops = lock(ops);
    ops.set(
        Supply::Charger,
        Property::ChargeType,
        ChargeType::Fast.as_raw(),
    );
    let status = ops.get_or(
        Supply::Charger,
        Property::Status,
        info.charge_real_state.as_raw(),
    );
    info.charge_real_state = ChargeStatus::from_raw(status);
    false
}

/// Maximum charge duration. The limit is shorter in the recharge phase.
pub fn abstimer_cond(info: &mut BatteryInfo, battery: &BatteryConfig, now: Duration) -> bool {
    let since = match info.charging_since {
        Some(since) if info.cable_type != CableType::Usb && !info.full_charged_state => since,
        _ => {
            info.abstimer_state = false;
            return false;
        }
    };

    let limit = if info.recharge_phase {
        battery.abstimer_recharge_duration
    } else {
        battery.abstimer_charge_duration
    };
    let elapsed = now.saturating_sub(since);
    info.abstimer_state = elapsed > Duration::from_secs(limit);

    if info.abstimer_state {
        warn!(
            elapsed = elapsed.as_secs(),
            limit,
            recharge = info.recharge_phase,
            "charge timer expired"
        );
    }
    info.abstimer_state
}

/// Recharge needed: not charging and vcell below the recharge voltage.
pub fn recharge_cond(info: &BatteryInfo, battery: &BatteryConfig) -> bool {
    info.charge_real_state != ChargeStatus::Charging && info.vcell < battery.recharge_voltage()
}
