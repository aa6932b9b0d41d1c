//! Charge arbiter: commanded currents and the charger enable line.

use crate::config::ChargeConfig;
use crate::info::BatteryInfo;
use crate::property::{ChargeStatus, ChargeType, Property};
use crate::supply::{Supplies, Supply};
use std::time::Duration;
use tracing::{debug, info};

/// Requested current for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Current {
    /// Leave the channel as last commanded.
    Keep,
    /// Milliamps; `0` turns the channel off.
    Set(u32),
}

impl Current {
    pub const OFF: Current = Current::Set(0);
}

/// Input current register step, 20 mA.
pub fn input_step(ma: i32) -> i32 {
    ma / 20
}

/// Charge current register value, 33.3 mA steps.
pub fn charge_step(ma: i32) -> i32 {
    (ma * 3 / 100) * 333 / 10
}

/// Apply a charge/input current request.
///
/// Currents are written only when they differ from the last commanded value
/// at register granularity. The charger enable line follows `charge != 0`
/// and is touched only on an edge. After an edge the charger status is read
/// back; if it hasn't caught up yet the displayed state is set to the
/// expected one and `ambiguous_state` is raised until a later read agrees.
pub fn control(
    info: &mut BatteryInfo,
    ops: &mut Supplies,
    config: &ChargeConfig,
    now: Duration,
    charge: Current,
    input: Current,
) {
    let charge = match charge {
        Current::Set(ma) if info.siop_state && ma != 0 => {
            Current::Set(ma.min(config.siop_charge_current))
        }
        other => other,
    };

    if let Current::Set(ma) = input {
        let ma = ma.min(config.input_limit) as i32;
        if input_step(ma) != input_step(info.input_current) {
            debug!(from = info.input_current, to = ma, "input current");
            if ops.set(Supply::Charger, Property::CurrentMax, ma) {
                info.input_current = ops.get_or(Supply::Charger, Property::CurrentMax, ma);
            }
        }
    }

    if let Current::Set(ma) = charge {
        let ma = ma as i32;
        if charge_step(ma) != charge_step(info.charge_current) {
            debug!(from = info.charge_current, to = ma, "charge current");
            if ops.set(Supply::Charger, Property::CurrentNow, ma) {
                info.charge_current = ops.get_or(Supply::Charger, Property::CurrentNow, ma);
            }
        }
    }

    let enable = match charge {
        Current::Set(ma) => ma != 0,
        Current::Keep => info.charge_current != 0,
    };
    if enable == info.is_charging_enabled() {
        return;
    }

    let charge_type = if enable {
        ChargeType::Fast
    } else {
        ChargeType::None
    };
    // Only an accepted write moves the recorded enable state.
    if !ops.set(Supply::Charger, Property::ChargeType, charge_type.as_raw()) {
        debug!(enable, "charger enable not applied");
        return;
    }

    if enable {
        info!(
            cable = %info.cable_type,
            charge = info.charge_current,
            input = info.input_current,
            "charging enabled"
        );
        info.charging_since = Some(now);
    } else {
        info!(cable = %info.cable_type, "charging disabled");
        info.charging_since = None;
    }

    let status = ops.get_or(
        Supply::Charger,
        Property::Status,
        info.charge_real_state.as_raw(),
    );
    info.charge_real_state = ChargeStatus::from_raw(status);

    if transition_settled(info) {
        info.ambiguous_state = false;
        info.charge_virt_state = info.charge_real_state;
    } else {
        info.ambiguous_state = true;
        info.charge_virt_state = if enable {
            ChargeStatus::Charging
        } else {
            ChargeStatus::Discharging
        };
        debug!(
            real = %info.charge_real_state,
            virt = %info.charge_virt_state,
            "charger status lags command"
        );
    }
}

/// Whether the charger status agrees with the commanded enable state.
pub fn transition_settled(info: &BatteryInfo) -> bool {
    let charging = info.charge_real_state == ChargeStatus::Charging;
    charging == info.is_charging_enabled()
}
