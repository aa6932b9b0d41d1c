use crate::property::{CableType, ChargeStatus, ChargeType, Health};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Monitor mode, selecting the base polling interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorMode {
    Chng,
    ChngSusp,
    #[default]
    Norm,
    NormSusp,
    EmerLv1,
    EmerLv2,
}

impl MonitorMode {
    /// Mode used while the system is suspended.
    pub fn suspended(self) -> Self {
        match self {
            Self::Chng => Self::ChngSusp,
            Self::Norm => Self::NormSusp,
            other => other,
        }
    }
}

impl std::fmt::Display for MonitorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Chng => "CHNG",
            Self::ChngSusp => "CHNG_SUSP",
            Self::Norm => "NORM",
            Self::NormSusp => "NORM_SUSP",
            Self::EmerLv1 => "EMER_LV1",
            Self::EmerLv2 => "EMER_LV2",
        };
        f.write_str(name)
    }
}

/// Fault that currently forces the virtual charge state.
///
/// Ordered by precedence: a later variant overrides an earlier one when the
/// indicator is projected. Overheated and Freezed never coexist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultState {
    Normal,
    Overheated,
    Freezed,
    Vf,
    Health,
}

/// Complete monitored and derived state of one battery.
///
/// Voltages in µV, currents in mA, temperatures in tenths of °C.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatteryInfo {
    pub cable_type: CableType,
    /// Last status read from the charger.
    pub charge_real_state: ChargeStatus,
    /// Status shown to the user.
    pub charge_virt_state: ChargeStatus,
    pub charge_type: ChargeType,

    pub battery_present: bool,
    pub battery_health: Health,

    /// Adjusted SOC, percent.
    pub soc: i32,
    /// Raw SOC, hundredths of a percent.
    pub raw_soc: i32,
    pub r_s_delta: i32,
    pub full_soc: i32,

    pub vcell: i32,
    pub vfocv: i32,
    pub v_diff: i32,

    pub temper: i32,
    pub t_delta: i32,

    pub overheated_state: bool,
    pub freezed_state: bool,
    pub temper_state: bool,
    pub full_charged_state: bool,
    pub abstimer_state: bool,
    pub recharge_phase: bool,
    pub vf_state: bool,
    pub health_state: bool,
    pub ambiguous_state: bool,

    /// When the charger was last enabled; `None` while not charging.
    pub charging_since: Option<Duration>,

    pub monitor_mode: MonitorMode,
    pub monitor_weight: u32,
    /// Completed cycles since boot, saturating at the boot-cycle count.
    pub monitor_count: u32,

    /// Last commanded currents, mA.
    pub input_current: i32,
    pub charge_current: i32,

    pub siop_state: bool,
    pub lpm_state: bool,
}

impl BatteryInfo {
    /// Highest-precedence fault among the latch flags.
    pub fn fault(&self) -> FaultState {
        [
            (self.overheated_state, FaultState::Overheated),
            (self.freezed_state, FaultState::Freezed),
            (self.vf_state, FaultState::Vf),
            (self.health_state, FaultState::Health),
        ]
        .into_iter()
        .filter_map(|(active, fault)| active.then_some(fault))
        .max()
        .unwrap_or(FaultState::Normal)
    }

    /// Forget the charge scenario: temperature, full, abstimer and recharge latches.
    pub fn clear_charge_scenario(&mut self) {
        self.overheated_state = false;
        self.freezed_state = false;
        self.temper_state = false;
        self.full_charged_state = false;
        self.abstimer_state = false;
        self.recharge_phase = false;
    }

    pub fn is_charging_enabled(&self) -> bool {
        self.charging_since.is_some()
    }
}
