//! Polling interval calculator.

use crate::config::{BatteryConfig, IntervalConfig};
use crate::info::{BatteryInfo, MonitorMode};
use crate::property::ChargeStatus;
use serde::Serialize;
use std::time::Duration;

pub const WEIGHT_MIN: u32 = 10;
pub const WEIGHT_MAX: u32 = 150;
/// Cycles after boot that poll at the EMER_LV1 rate.
pub const BOOT_CYCLES: u32 = 2;

/// When the next cycle should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NextWake {
    pub interval: Duration,
    /// Coalescing window after `interval` in which the wake-up may land.
    pub slack: Duration,
}

fn clamp(weight: i32) -> u32 {
    weight.clamp(WEIGHT_MIN as i32, WEIGHT_MAX as i32) as u32
}

/// Pick the monitor mode and interval weight for the current state.
pub fn calculate(
    info: &BatteryInfo,
    battery: &BatteryConfig,
    table: &IntervalConfig,
    suspended: bool,
) -> (MonitorMode, u32) {
    let (mode, weight) = weigh(info, battery, table);
    let mode = if suspended { mode.suspended() } else { mode };
    (mode, weight)
}

fn weigh(info: &BatteryInfo, battery: &BatteryConfig, table: &IntervalConfig) -> (MonitorMode, u32) {
    if info.ambiguous_state
        || info.raw_soc < 100
        || info.vcell < battery.voltage_min - table.low_voltage_margin
        || info.vfocv < battery.voltage_min
        || info.charge_virt_state == ChargeStatus::NotCharging
    {
        return (MonitorMode::EmerLv2, 100);
    }

    let mut mode = if info.charge_virt_state == ChargeStatus::Charging {
        MonitorMode::Chng
    } else {
        MonitorMode::Norm
    };
    let mut weight: i32 = 100;

    if info.lpm_state && mode == MonitorMode::Norm {
        weight += 100;
    }

    if info.monitor_count < BOOT_CYCLES {
        mode = MonitorMode::EmerLv1;
        return (mode, clamp(weight));
    }

    if info.vcell < battery.voltage_min + table.near_low_voltage {
        weight -= 30;
    }

    let divergence = info.v_diff.saturating_abs();
    if divergence > table.divergence_limit {
        weight -= divergence / 10_000;
    } else {
        weight += 20;
    }

    if info.raw_soc % 100 >= 90 {
        weight -= 10;
    }

    if info.r_s_delta.saturating_abs() > table.soc_slope_limit {
        weight -= info.r_s_delta.saturating_abs() / 5;
    }

    if info.temper >= battery.overheat_stop_temp - table.temper_margin
        || info.temper <= battery.freeze_stop_temp + table.temper_margin
    {
        weight -= 20;
    }

    if info.t_delta.saturating_abs() >= table.temper_slope_limit {
        weight -= 20;
    }

    (mode, clamp(weight))
}

/// Scale the mode's base interval by the weight percentage.
pub fn next_wake(mode: MonitorMode, weight: u32, table: &IntervalConfig) -> NextWake {
    NextWake {
        interval: table.base(mode) * weight / 100,
        slack: Duration::from_secs(table.slack),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady() -> BatteryInfo {
        BatteryInfo {
            charge_real_state: ChargeStatus::Discharging,
            charge_virt_state: ChargeStatus::Discharging,
            raw_soc: 5_020,
            soc: 50,
            vcell: 3_850_000,
            vfocv: 3_860_000,
            v_diff: -10_000,
            temper: 250,
            monitor_count: BOOT_CYCLES,
            ..Default::default()
        }
    }

    fn calc(info: &BatteryInfo) -> (MonitorMode, u32) {
        calculate(
            info,
            &BatteryConfig::default(),
            &IntervalConfig::default(),
            false,
        )
    }

    #[test]
    fn test_steady_discharge() {
        assert_eq!(calc(&steady()), (MonitorMode::Norm, 120));
    }

    #[test]
    fn test_emergency_short_circuits() {
        let mut info = steady();
        info.ambiguous_state = true;
        assert_eq!(calc(&info), (MonitorMode::EmerLv2, 100));

        let mut info = steady();
        info.raw_soc = 99;
        assert_eq!(calc(&info).0, MonitorMode::EmerLv2);

        let mut info = steady();
        info.vfocv = 3_300_000;
        assert_eq!(calc(&info).0, MonitorMode::EmerLv2);

        let mut info = steady();
        info.charge_virt_state = ChargeStatus::NotCharging;
        assert_eq!(calc(&info).0, MonitorMode::EmerLv2);
    }

    #[test]
    fn test_boot_cycles_use_emer_lv1() {
        let mut info = steady();
        info.monitor_count = 0;
        assert_eq!(calc(&info), (MonitorMode::EmerLv1, 100));

        info.lpm_state = true;
        assert_eq!(calc(&info), (MonitorMode::EmerLv1, WEIGHT_MAX));
    }

    #[test]
    fn test_lpm_doubles_only_norm() {
        let mut info = steady();
        info.lpm_state = true;
        assert_eq!(calc(&info), (MonitorMode::Norm, WEIGHT_MAX));

        info.charge_virt_state = ChargeStatus::Charging;
        assert_eq!(calc(&info), (MonitorMode::Chng, 120));
    }

    #[test]
    fn test_adjustments_stack() {
        let mut info = steady();
        info.vcell = 3_550_000;
        info.vfocv = 3_750_000;
        info.v_diff = -200_000;
        info.raw_soc = 1_095;
        info.r_s_delta = -50;
        info.temper = 580;
        info.t_delta = 12;
        // 100 - 30 - 20 - 10 - 10 - 20 - 20
        assert_eq!(calc(&info), (MonitorMode::Norm, WEIGHT_MIN));
    }

    #[test]
    fn test_weight_always_clamped() {
        let battery = BatteryConfig::default();
        let table = IntervalConfig::default();
        let mut seed: u64 = 0x9e37_79b9_7f4a_7c15;
        let mut next = |range: i32| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            (seed % range as u64) as i32
        };
        for _ in 0..5000 {
            let info = BatteryInfo {
                charge_virt_state: ChargeStatus::from_raw(next(5)),
                ambiguous_state: next(8) == 0,
                raw_soc: next(10_001),
                r_s_delta: next(2_000) - 1_000,
                vcell: 3_000_000 + next(1_500_000),
                vfocv: 3_000_000 + next(1_500_000),
                v_diff: next(2_000_000) - 1_000_000,
                temper: next(1_000) - 200,
                t_delta: next(100) - 50,
                monitor_count: next(3) as u32,
                lpm_state: next(2) == 0,
                ..Default::default()
            };
            let (_, weight) = calculate(&info, &battery, &table, next(2) == 0);
            assert!((WEIGHT_MIN..=WEIGHT_MAX).contains(&weight));
        }
    }

    #[test]
    fn test_extreme_deltas_clamp_to_minimum() {
        let info = BatteryInfo {
            v_diff: i32::MIN,
            r_s_delta: i32::MIN,
            t_delta: i32::MIN,
            ..steady()
        };
        assert_eq!(calc(&info), (MonitorMode::Norm, WEIGHT_MIN));
    }

    #[test]
    fn test_suspended_mode_mapping() {
        let info = steady();
        let (mode, _) = calculate(
            &info,
            &BatteryConfig::default(),
            &IntervalConfig::default(),
            true,
        );
        assert_eq!(mode, MonitorMode::NormSusp);
    }

    #[test]
    fn test_next_wake_scales_base() {
        let table = IntervalConfig::default();
        let wake = next_wake(MonitorMode::Chng, 50, &table);
        assert_eq!(wake.interval, Duration::from_secs(15));
        assert_eq!(wake.slack, Duration::from_secs(20));
        assert_eq!(
            next_wake(MonitorMode::NormSusp, 150, &table).interval,
            Duration::from_secs(900)
        );
    }
}
