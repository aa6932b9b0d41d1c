//! Read-only power-supply property surface.

use super::Battery;
use crate::lock;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BatteryProperty {
    Status,
    ChargeType,
    Health,
    Present,
    Online,
    Technology,
    VoltageNow,
    VoltageAvg,
    VoltageMax,
    VoltageMin,
    CurrentNow,
    CurrentMax,
    Capacity,
    Temp,
}

impl BatteryProperty {
    pub const ALL: [BatteryProperty; 14] = [
        Self::Status,
        Self::ChargeType,
        Self::Health,
        Self::Present,
        Self::Online,
        Self::Technology,
        Self::VoltageNow,
        Self::VoltageAvg,
        Self::VoltageMax,
        Self::VoltageMin,
        Self::CurrentNow,
        Self::CurrentMax,
        Self::Capacity,
        Self::Temp,
    ];

    /// Attribute name as the power_supply class spells it.
    pub fn name(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::ChargeType => "charge_type",
            Self::Health => "health",
            Self::Present => "present",
            Self::Online => "online",
            Self::Technology => "technology",
            Self::VoltageNow => "voltage_now",
            Self::VoltageAvg => "voltage_avg",
            Self::VoltageMax => "voltage_max",
            Self::VoltageMin => "voltage_min",
            Self::CurrentNow => "current_now",
            Self::CurrentMax => "current_max",
            Self::Capacity => "capacity",
            Self::Temp => "temp",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Int(i32),
    Text(&'static str),
}

impl std::fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl Battery {
    /// Current value of one user-visible property.
    pub fn get_property(&self, property: BatteryProperty) -> PropertyValue {
        let state = lock(&self.state);
        let info = &state.info;
        let battery = &self.config.battery;
        match property {
            BatteryProperty::Status => PropertyValue::Text(state.indicator.status.as_str()),
            BatteryProperty::ChargeType => PropertyValue::Text(info.charge_type.as_str()),
            BatteryProperty::Health => PropertyValue::Text(info.battery_health.as_str()),
            BatteryProperty::Present => PropertyValue::Int(i32::from(info.battery_present)),
            BatteryProperty::Online => PropertyValue::Int(info.cable_type.as_raw()),
            BatteryProperty::Technology => PropertyValue::Text("Li-ion"),
            BatteryProperty::VoltageNow => PropertyValue::Int(info.vcell),
            BatteryProperty::VoltageAvg => PropertyValue::Int(info.vfocv),
            BatteryProperty::VoltageMax => PropertyValue::Int(battery.voltage_max),
            BatteryProperty::VoltageMin => PropertyValue::Int(battery.voltage_min),
            BatteryProperty::CurrentNow => PropertyValue::Int(info.charge_current),
            BatteryProperty::CurrentMax => PropertyValue::Int(info.input_current),
            BatteryProperty::Capacity => PropertyValue::Int(state.indicator.soc),
            BatteryProperty::Temp => PropertyValue::Int(info.temper),
        }
    }

    /// Every property with its value, in a stable order.
    pub fn properties(&self) -> Vec<(BatteryProperty, PropertyValue)> {
        BatteryProperty::ALL
            .into_iter()
            .map(|p| (p, self.get_property(p)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::BattmonConfig;
    use crate::monitor::Hardware;
    use crate::property::{CableType, CapacityKind, ChargeStatus, Property, VoltageKind};
    use crate::supply::mock::{MockJig, MockSupply};
    use std::sync::Arc;

    fn battery() -> Battery {
        let charger = MockSupply::new("charger");
        let fuel_gauge = MockSupply::new("fuelgauge");
        charger.set_value(Property::Online, CableType::Usb.as_raw());
        charger.set_value(Property::Status, ChargeStatus::Charging.as_raw());
        fuel_gauge.set_value(Property::VoltageNow(VoltageKind::Vcell), 3_800_000);
        fuel_gauge.set_value(Property::Capacity(CapacityKind::Adjusted), 42);
        fuel_gauge.set_value(Property::Temp, 301);
        Battery::probe(
            BattmonConfig::default(),
            Hardware::mock(
                &charger,
                &fuel_gauge,
                &MockJig::default(),
                Arc::new(ManualClock::default()),
            ),
        )
        .unwrap()
    }

    #[test]
    fn test_property_values_after_cycle() {
        let battery = battery();
        battery.monitor_cycle();
        assert_eq!(
            battery.get_property(BatteryProperty::Status),
            PropertyValue::Text("Charging")
        );
        assert_eq!(
            battery.get_property(BatteryProperty::Online),
            PropertyValue::Int(1)
        );
        assert_eq!(
            battery.get_property(BatteryProperty::CurrentMax),
            PropertyValue::Int(500)
        );
        assert_eq!(
            battery.get_property(BatteryProperty::Capacity),
            PropertyValue::Int(42)
        );
        assert_eq!(
            battery.get_property(BatteryProperty::Temp).to_string(),
            "301"
        );
    }

    #[test]
    fn test_properties_listing_is_complete() {
        let battery = battery();
        let props = battery.properties();
        assert_eq!(props.len(), BatteryProperty::ALL.len());
        assert_eq!(props[5].1, PropertyValue::Text("Li-ion"));
        assert_eq!(BatteryProperty::VoltageAvg.name(), "voltage_avg");
    }
}
