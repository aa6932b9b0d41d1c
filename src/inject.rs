//! Error-test seam: fabricate fault readings without real hardware faults.

use crate::config::BatteryConfig;
use crate::error::{Error, Result};
use crate::property::{ChargeStatus, Health};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultInjector {
    #[default]
    None,
    FullCharged,
    Freeze,
    Overheat,
    Overvoltage,
    VfAbsent,
}

impl FaultInjector {
    /// Decode the integer error-test mode (0-5).
    pub fn from_mode(mode: i64) -> Result<Self> {
        match mode {
            0 => Ok(Self::None),
            1 => Ok(Self::FullCharged),
            2 => Ok(Self::Freeze),
            3 => Ok(Self::Overheat),
            4 => Ok(Self::Overvoltage),
            5 => Ok(Self::VfAbsent),
            _ => Err(Error::InvalidValue {
                what: "error test mode",
                value: mode,
            }),
        }
    }

    pub fn mode(self) -> u8 {
        match self {
            Self::None => 0,
            Self::FullCharged => 1,
            Self::Freeze => 2,
            Self::Overheat => 3,
            Self::Overvoltage => 4,
            Self::VfAbsent => 5,
        }
    }

    pub fn present(self, raw: i32) -> i32 {
        match self {
            Self::VfAbsent => 0,
            _ => raw,
        }
    }

    pub fn health(self, raw: Health) -> Health {
        match self {
            Self::Overvoltage => Health::Overvoltage,
            _ => raw,
        }
    }

    pub fn temper(self, raw: i32, battery: &BatteryConfig) -> i32 {
        match self {
            Self::Overheat => battery.overheat_stop_temp + 10,
            Self::Freeze => battery.freeze_stop_temp - 10,
            _ => raw,
        }
    }

    pub fn status(self, raw: ChargeStatus) -> ChargeStatus {
        match self {
            Self::FullCharged => ChargeStatus::Full,
            _ => raw,
        }
    }

    pub fn soc(self, raw: i32) -> i32 {
        match self {
            Self::FullCharged => 100,
            _ => raw,
        }
    }

    pub fn vcell(self, raw: i32, battery: &BatteryConfig) -> i32 {
        match self {
            Self::FullCharged => battery.voltage_max,
            _ => raw,
        }
    }
}
