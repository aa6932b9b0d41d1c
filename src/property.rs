//! Property vocabulary shared by the charger and fuel-gauge collaborators.
//!
//! Values travel as plain integers, the way the kernel's `power_supply`
//! class passes `intval`. The typed enums below convert to and from those
//! integers and to the strings the sysfs attributes use.

use serde::{Deserialize, Serialize};

/// Which SOC reading a `Capacity` request refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityKind {
    /// Smoothed state of charge, percent.
    Adjusted,
    /// Unscaled fuel-gauge reading, hundredths of a percent.
    Raw,
    /// Fuel-gauge estimate of the full-charge SOC.
    Full,
}

/// Which voltage a `VoltageNow` request refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoltageKind {
    /// Terminal voltage under load.
    Vcell,
    /// Open-circuit-compensated voltage.
    Vfocv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Property {
    Status,
    ChargeType,
    Health,
    Present,
    CurrentMax,
    CurrentNow,
    Online,
    Capacity(CapacityKind),
    VoltageNow(VoltageKind),
    Temp,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    #[default]
    Unknown,
    Charging,
    Discharging,
    NotCharging,
    Full,
}

impl ChargeStatus {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Charging,
            2 => Self::Discharging,
            3 => Self::NotCharging,
            4 => Self::Full,
            _ => Self::Unknown,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::Charging => 1,
            Self::Discharging => 2,
            Self::NotCharging => 3,
            Self::Full => 4,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Unknown" => Some(Self::Unknown),
            "Charging" => Some(Self::Charging),
            "Discharging" => Some(Self::Discharging),
            "Not charging" => Some(Self::NotCharging),
            "Full" => Some(Self::Full),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Charging => "Charging",
            Self::Discharging => "Discharging",
            Self::NotCharging => "Not charging",
            Self::Full => "Full",
        }
    }
}

impl std::fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Charger enable line. `Fast` enables charging, `None` disables it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeType {
    #[default]
    Unknown,
    None,
    Trickle,
    Fast,
}

impl ChargeType {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::None,
            2 => Self::Trickle,
            3 => Self::Fast,
            _ => Self::Unknown,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::None => 1,
            Self::Trickle => 2,
            Self::Fast => 3,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Unknown" | "N/A" => Some(Self::Unknown),
            "None" => Some(Self::None),
            "Trickle" => Some(Self::Trickle),
            "Fast" => Some(Self::Fast),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::None => "None",
            Self::Trickle => "Trickle",
            Self::Fast => "Fast",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    #[default]
    Unknown,
    Good,
    Overheat,
    Cold,
    Overvoltage,
    Undervoltage,
    UnspecFailure,
    Dead,
}

impl Health {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Good,
            2 => Self::Overheat,
            3 => Self::Dead,
            4 => Self::Overvoltage,
            5 => Self::UnspecFailure,
            6 => Self::Cold,
            7 => Self::Undervoltage,
            _ => Self::Unknown,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Self::Unknown => 0,
            Self::Good => 1,
            Self::Overheat => 2,
            Self::Dead => 3,
            Self::Overvoltage => 4,
            Self::UnspecFailure => 5,
            Self::Cold => 6,
            Self::Undervoltage => 7,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Unknown" => Some(Self::Unknown),
            "Good" => Some(Self::Good),
            "Overheat" => Some(Self::Overheat),
            "Cold" => Some(Self::Cold),
            "Over voltage" => Some(Self::Overvoltage),
            "Under voltage" => Some(Self::Undervoltage),
            "Unspecified failure" => Some(Self::UnspecFailure),
            "Dead" => Some(Self::Dead),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Good => "Good",
            Self::Overheat => "Overheat",
            Self::Cold => "Cold",
            Self::Overvoltage => "Over voltage",
            Self::Undervoltage => "Under voltage",
            Self::UnspecFailure => "Unspecified failure",
            Self::Dead => "Dead",
        }
    }

    /// Health values that stop charging outright.
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            Self::UnspecFailure | Self::Dead | Self::Overvoltage | Self::Undervoltage
        )
    }
}

/// Attached power source, as reported by the charger's `online` property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CableType {
    #[default]
    None,
    Usb,
    UsbCdp,
    Mains,
    Dock,
    Wireless,
}

impl CableType {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Usb,
            2 => Self::UsbCdp,
            3 => Self::Mains,
            4 => Self::Dock,
            5 => Self::Wireless,
            _ => Self::None,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Usb => 1,
            Self::UsbCdp => 2,
            Self::Mains => 3,
            Self::Dock => 4,
            Self::Wireless => 5,
        }
    }

    /// Cable implied by a `power_supply` `type` attribute, for drivers whose
    /// `online` is a plain 0/1.
    pub fn from_supply_type(kind: &str) -> Option<Self> {
        match kind {
            "Mains" | "USB_DCP" | "USB_C" | "USB_PD" | "USB_PD_DRP" | "BrickID" => {
                Some(Self::Mains)
            }
            "USB" | "USB_ACA" => Some(Self::Usb),
            "USB_CDP" => Some(Self::UsbCdp),
            "Wireless" => Some(Self::Wireless),
            _ => None,
        }
    }

    pub fn is_attached(self) -> bool {
        self != Self::None
    }
}

impl std::fmt::Display for CableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Usb => "usb",
            Self::UsbCdp => "usb-cdp",
            Self::Mains => "mains",
            Self::Dock => "dock",
            Self::Wireless => "wireless",
        };
        f.write_str(name)
    }
}
