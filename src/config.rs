use crate::error::{Error, Result};
use crate::info::MonitorMode;
use crate::property::CableType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level battmon configuration. Loaded once at probe time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BattmonConfig {
    /// Boot into low-power (charge-only) mode.
    pub lpm: bool,
    pub supply: SupplyConfig,
    pub battery: BatteryConfig,
    pub charge: ChargeConfig,
    pub interval: IntervalConfig,
    pub indicator: IndicatorConfig,
    pub recovery: RecoveryConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SupplyConfig {
    /// power_supply directory of the charger; discovered by type when unset.
    pub charger: Option<String>,
    /// power_supply directory of the fuel gauge; discovered by type when unset.
    pub fuel_gauge: Option<String>,
    /// File reading `1` while a factory jig is attached.
    pub jig_path: Option<String>,
    /// Use Android-style `/sys/power/wake_lock`.
    pub wake_lock: bool,
}

/// Battery thresholds. Voltages in µV, temperatures in tenths of °C.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatteryConfig {
    pub voltage_max: i32,
    pub voltage_min: i32,
    /// Recharge starts below `voltage_max - recharge_drop`.
    pub recharge_drop: i32,
    /// Full charge needs `vcell > voltage_max - full_margin`.
    pub full_margin: i32,
    /// Full charge needs an adjusted SOC above this.
    pub full_soc: i32,
    pub overheat_stop_temp: i32,
    pub overheat_recovery_temp: i32,
    pub freeze_stop_temp: i32,
    pub freeze_recovery_temp: i32,
    /// Seconds of first-phase charging before the abstimer fires.
    pub abstimer_charge_duration: u64,
    /// Seconds of post-full recharging before the abstimer fires.
    pub abstimer_recharge_duration: u64,
    /// Run the presence check while no cable is attached.
    pub vf_check_on_battery: bool,
    /// Milliseconds the charger stays off when it declares full too early.
    pub power_cycle_ms: u64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            voltage_max: 4_350_000,
            voltage_min: 3_400_000,
            recharge_drop: 150_000,
            full_margin: 50_000,
            full_soc: 95,
            overheat_stop_temp: 600,
            overheat_recovery_temp: 400,
            freeze_stop_temp: -50,
            freeze_recovery_temp: 0,
            abstimer_charge_duration: 6 * 60 * 60,
            abstimer_recharge_duration: 90 * 60,
            vf_check_on_battery: true,
            power_cycle_ms: 100,
        }
    }
}

impl BatteryConfig {
    pub fn recharge_voltage(&self) -> i32 {
        self.voltage_max - self.recharge_drop
    }
}

/// Charge and input current pair in mA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentPair {
    pub charge: u32,
    pub input: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChargeConfig {
    /// Board maximum input current, mA.
    pub input_limit: u32,
    /// Charge current while SIOP throttling is active, mA.
    pub siop_charge_current: u32,
    /// Allow the system to suspend while charging.
    pub suspend_charging: bool,
    pub ta: CurrentPair,
    pub usb: CurrentPair,
    pub cdp: CurrentPair,
    pub dock: CurrentPair,
    pub wireless: CurrentPair,
}

impl Default for ChargeConfig {
    fn default() -> Self {
        Self {
            input_limit: 1000,
            siop_charge_current: 450,
            suspend_charging: true,
            ta: CurrentPair {
                charge: 1000,
                input: 1000,
            },
            usb: CurrentPair {
                charge: 500,
                input: 500,
            },
            cdp: CurrentPair {
                charge: 1000,
                input: 1000,
            },
            dock: CurrentPair {
                charge: 900,
                input: 1000,
            },
            wireless: CurrentPair {
                charge: 700,
                input: 700,
            },
        }
    }
}

impl ChargeConfig {
    /// Currents for an attached cable; `None` for no cable.
    pub fn currents(&self, cable: CableType) -> Option<CurrentPair> {
        match cable {
            CableType::None => None,
            CableType::Mains => Some(self.ta),
            CableType::Usb => Some(self.usb),
            CableType::UsbCdp => Some(self.cdp),
            CableType::Dock => Some(self.dock),
            CableType::Wireless => Some(self.wireless),
        }
    }
}

/// Base polling interval per monitor mode, seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    pub chng: u64,
    pub chng_susp: u64,
    pub norm: u64,
    pub norm_susp: u64,
    pub emer_lv1: u64,
    pub emer_lv2: u64,
    /// Timer coalescing window added after the interval.
    pub slack: u64,
    /// Emergency polling below `voltage_min` minus this (µV).
    pub low_voltage_margin: i32,
    /// Poll faster below `voltage_min` plus this (µV).
    pub near_low_voltage: i32,
    /// vcell/vfocv divergence that scales the weight down (µV).
    pub divergence_limit: i32,
    /// Raw SOC change per cycle considered steep (hundredths of a percent).
    pub soc_slope_limit: i32,
    /// Distance to a stop temperature that counts as near (tenths of °C).
    pub temper_margin: i32,
    /// Temperature change per cycle considered steep (tenths of °C).
    pub temper_slope_limit: i32,
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            chng: 30,
            chng_susp: 60,
            norm: 50,
            norm_susp: 600,
            emer_lv1: 30,
            emer_lv2: 10,
            slack: 20,
            low_voltage_margin: 100_000,
            near_low_voltage: 200_000,
            divergence_limit: 100_000,
            soc_slope_limit: 10,
            temper_margin: 30,
            temper_slope_limit: 10,
        }
    }
}

impl IntervalConfig {
    pub fn base(&self, mode: MonitorMode) -> Duration {
        let secs = match mode {
            MonitorMode::Chng => self.chng,
            MonitorMode::ChngSusp => self.chng_susp,
            MonitorMode::Norm => self.norm,
            MonitorMode::NormSusp => self.norm_susp,
            MonitorMode::EmerLv1 => self.emer_lv1,
            MonitorMode::EmerLv2 => self.emer_lv2,
        };
        Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// The board has a charging LED.
    pub led: bool,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self { led: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Retry presence in a separate task when the battery disappears.
    pub enabled: bool,
    pub attempts: u32,
    pub delay_ms: u64,
    /// Reset the fuel gauge when vcell moved more than this (µV) while absent.
    pub reset_soc_threshold: i32,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            attempts: 10,
            delay_ms: 1000,
            reset_soc_threshold: 100_000,
        }
    }
}

impl BattmonConfig {
    /// Reject threshold combinations that would break the hysteresis bands.
    pub fn validate(&self) -> Result<()> {
        let b = &self.battery;
        if b.overheat_recovery_temp >= b.overheat_stop_temp {
            return Err(Error::Config(format!(
                "overheat_recovery_temp ({}) must be below overheat_stop_temp ({})",
                b.overheat_recovery_temp, b.overheat_stop_temp
            )));
        }
        if b.freeze_recovery_temp <= b.freeze_stop_temp {
            return Err(Error::Config(format!(
                "freeze_recovery_temp ({}) must be above freeze_stop_temp ({})",
                b.freeze_recovery_temp, b.freeze_stop_temp
            )));
        }
        if b.freeze_stop_temp >= b.overheat_stop_temp {
            return Err(Error::Config(
                "freeze_stop_temp must be below overheat_stop_temp".to_string(),
            ));
        }
        if b.voltage_min >= b.voltage_max {
            return Err(Error::Config(
                "voltage_min must be below voltage_max".to_string(),
            ));
        }
        if b.recharge_drop <= 0 || b.recharge_drop >= b.voltage_max - b.voltage_min {
            return Err(Error::Config(format!(
                "recharge_drop ({}) out of range",
                b.recharge_drop
            )));
        }
        let i = &self.interval;
        for (name, secs) in [
            ("chng", i.chng),
            ("chng_susp", i.chng_susp),
            ("norm", i.norm),
            ("norm_susp", i.norm_susp),
            ("emer_lv1", i.emer_lv1),
            ("emer_lv2", i.emer_lv2),
        ] {
            if secs == 0 {
                return Err(Error::Config(format!("interval.{} must be non-zero", name)));
            }
        }
        Ok(())
    }
}

const SYSTEM_CONFIG: &str = "/etc/battmon/config.toml";

fn load_system() -> Option<toml::Value> {
    let content = std::fs::read_to_string(SYSTEM_CONFIG).ok()?;
    toml::from_str(&content).ok()
}

/// Load the user config file (~/.config/battmon/config.toml) if it exists.
fn load_user() -> Option<toml::Value> {
    let path = dirs::config_dir()?.join("battmon").join("config.toml");
    let content = std::fs::read_to_string(path).ok()?;
    toml::from_str(&content).ok()
}

/// Recursively merge two TOML values. Tables are merged key-by-key;
/// all other types in `overlay` replace `base`.
fn merge_values(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_values(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

fn load_from_path(path: &Path) -> Result<BattmonConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("failed to parse {}: {}", path.display(), e)))
}

/// Load the merged config: system defaults, then user overrides.
/// An explicit `override_path` replaces both and must exist.
pub fn load(override_path: Option<&PathBuf>) -> Result<BattmonConfig> {
    let config = match override_path {
        Some(path) => load_from_path(path)?,
        None => {
            let merged = match (load_system(), load_user()) {
                (Some(s), Some(u)) => Some(merge_values(s, u)),
                (Some(v), None) | (None, Some(v)) => Some(v),
                (None, None) => None,
            };
            match merged {
                Some(value) => value.try_into().unwrap_or_else(|e| {
                    tracing::warn!("failed to deserialize config, using defaults: {}", e);
                    BattmonConfig::default()
                }),
                None => BattmonConfig::default(),
            }
        }
    };
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BattmonConfig::default();
        config.validate().unwrap();
        assert_eq!(config.battery.recharge_voltage(), 4_200_000);
        assert_eq!(config.interval.base(MonitorMode::EmerLv1).as_secs(), 30);
        assert!(config.recovery.enabled);
        assert!(!config.lpm);
    }

    #[test]
    fn test_currents_per_cable() {
        let charge = ChargeConfig::default();
        assert_eq!(charge.currents(CableType::None), None);
        assert_eq!(charge.currents(CableType::Mains), Some(charge.ta));
        assert_eq!(charge.currents(CableType::Usb).unwrap().charge, 500);
        assert_eq!(charge.currents(CableType::Wireless), Some(charge.wireless));
    }

    #[test]
    fn test_validate_rejects_inverted_hysteresis() {
        let mut config = BattmonConfig::default();
        config.battery.overheat_recovery_temp = config.battery.overheat_stop_temp;
        assert!(config.validate().is_err());

        let mut config = BattmonConfig::default();
        config.battery.freeze_recovery_temp = -100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        for field in ["chng", "chng_susp", "norm", "norm_susp", "emer_lv1", "emer_lv2"] {
            let mut config = BattmonConfig::default();
            let i = &mut config.interval;
            match field {
                "chng" => i.chng = 0,
                "chng_susp" => i.chng_susp = 0,
                "norm" => i.norm = 0,
                "norm_susp" => i.norm_susp = 0,
                "emer_lv1" => i.emer_lv1 = 0,
                _ => i.emer_lv2 = 0,
            }
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains(field), "{field}");
        }
    }

    #[test]
    fn test_merge_values_tables() {
        let base: toml::Value = toml::from_str(
            r#"
            [battery]
            voltage_max = 4200000
            overheat_stop_temp = 550
        "#,
        )
        .unwrap();

        let overlay: toml::Value = toml::from_str(
            r#"
            [battery]
            overheat_stop_temp = 500
        "#,
        )
        .unwrap();

        let merged = merge_values(base, overlay);
        let battery = merged["battery"].as_table().unwrap();
        assert_eq!(battery["overheat_stop_temp"].as_integer(), Some(500));
        assert_eq!(battery["voltage_max"].as_integer(), Some(4_200_000));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: BattmonConfig = toml::from_str(
            r#"
            lpm = true

            [charge.ta]
            charge = 1500
            input = 1200

            [interval]
            norm = 40
        "#,
        )
        .unwrap();
        assert!(config.lpm);
        assert_eq!(config.charge.ta.charge, 1500);
        assert_eq!(config.charge.usb.charge, 500);
        assert_eq!(config.interval.norm, 40);
        assert_eq!(config.interval.chng, 30);
        assert_eq!(config.battery.full_soc, 95);
    }

    #[test]
    fn test_load_from_nonexistent_path() {
        let path = PathBuf::from("/nonexistent/battmon.toml");
        assert!(matches!(load(Some(&path)), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_override_validates() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            "[battery]\noverheat_stop_temp = 400\noverheat_recovery_temp = 450\n",
        )
        .unwrap();
        assert!(load(Some(&path)).is_err());
    }

    #[test]
    fn test_roundtrip_serialize() {
        let config = BattmonConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: BattmonConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(config.battery.voltage_max, deserialized.battery.voltage_max);
        assert_eq!(config.charge.dock, deserialized.charge.dock);
    }
}
