//! User-visible status and LED projection.

use crate::config::IndicatorConfig;
use crate::info::{BatteryInfo, FaultState};
use crate::property::{ChargeStatus, Health};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Led {
    #[default]
    Off,
    Charging,
    Full,
    Fault,
}

/// What the user sees for one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Indicator {
    pub status: ChargeStatus,
    pub soc: i32,
    pub led: Led,
}

/// Derive the displayed status, SOC and LED from the latch flags.
pub fn project(info: &BatteryInfo, config: &IndicatorConfig) -> Indicator {
    let mut soc = info.soc;

    let status = if !info.cable_type.is_attached() {
        ChargeStatus::Discharging
    } else {
        match info.fault() {
            FaultState::Health => match info.battery_health {
                Health::Overvoltage | Health::Undervoltage => ChargeStatus::Discharging,
                _ => ChargeStatus::NotCharging,
            },
            FaultState::Vf | FaultState::Overheated | FaultState::Freezed => {
                ChargeStatus::NotCharging
            }
            FaultState::Normal if info.full_charged_state => {
                soc = 100;
                ChargeStatus::Full
            }
            FaultState::Normal if info.abstimer_state || info.recharge_phase => {
                ChargeStatus::Charging
            }
            FaultState::Normal => match info.charge_virt_state {
                ChargeStatus::Full => ChargeStatus::Charging,
                other => other,
            },
        }
    };

    let led = if !config.led {
        Led::Off
    } else if info.cable_type.is_attached() && info.fault() != FaultState::Normal {
        Led::Fault
    } else {
        match status {
            ChargeStatus::Full => Led::Full,
            ChargeStatus::Charging => Led::Charging,
            _ => Led::Off,
        }
    };

    Indicator { status, soc, led }
}
