//! `PowerSource` over a Linux `power_supply` class directory.

use super::{JigSense, PowerSource};
use crate::error::{Error, Result};
use crate::property::{CableType, CapacityKind, ChargeStatus, ChargeType, Health, Property, VoltageKind};
use crate::sysfs::SysfsRoot;
use std::path::PathBuf;

/// How an attribute's text maps to the integer property value.
#[derive(Debug, Clone, Copy)]
enum Encoding {
    Int,
    /// Kernel reports µA, the core works in mA.
    MicroAmps,
    Status,
    ChargeType,
    Health,
    /// 0 when offline; otherwise the cable named by the supply's `type`.
    Cable,
}

fn attribute(property: Property) -> (&'static str, Encoding) {
    match property {
        Property::Status => ("status", Encoding::Status),
        Property::ChargeType => ("charge_type", Encoding::ChargeType),
        Property::Health => ("health", Encoding::Health),
        Property::Present => ("present", Encoding::Int),
        Property::CurrentMax => ("current_max", Encoding::MicroAmps),
        Property::CurrentNow => ("current_now", Encoding::MicroAmps),
        Property::Online => ("online", Encoding::Cable),
        Property::Capacity(CapacityKind::Adjusted) => ("capacity", Encoding::Int),
        Property::Capacity(CapacityKind::Raw) => ("capacity_raw", Encoding::Int),
        Property::Capacity(CapacityKind::Full) => ("capacity_full", Encoding::Int),
        Property::VoltageNow(VoltageKind::Vcell) => ("voltage_now", Encoding::Int),
        Property::VoltageNow(VoltageKind::Vfocv) => ("voltage_ocv", Encoding::Int),
        Property::Temp => ("temp", Encoding::Int),
    }
}

pub struct SysfsSupply {
    sysfs: SysfsRoot,
    name: String,
}

impl SysfsSupply {
    pub fn new(sysfs: SysfsRoot, name: impl Into<String>) -> Self {
        Self {
            sysfs,
            name: name.into(),
        }
    }

    /// Open a named supply, or the first one whose `type` matches `types`.
    pub fn open(sysfs: &SysfsRoot, name: Option<&str>, types: &[&str]) -> Result<Self> {
        let name = match name {
            Some(n) => n.to_string(),
            None => sysfs
                .find_supply(types)
                .ok_or_else(|| Error::SupplyNotFound(types.join("/")))?,
        };
        if !sysfs.exists(sysfs.supply_attr(&name, "")) {
            return Err(Error::SupplyNotFound(name));
        }
        Ok(Self::new(sysfs.clone(), name))
    }

    fn unsupported(&self, property: Property) -> Error {
        Error::Unsupported {
            supply: self.name.clone(),
            property,
        }
    }

    fn attr_path(&self, attr: &str) -> PathBuf {
        self.sysfs.supply_attr(&self.name, attr)
    }
}

impl PowerSource for SysfsSupply {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&mut self, property: Property) -> Result<i32> {
        let (attr, encoding) = attribute(property);
        let path = self.attr_path(attr);
        let text = self
            .sysfs
            .read_optional(&path)?
            .ok_or_else(|| self.unsupported(property))?;

        let parse_err = |detail: String| Error::Parse {
            path: self.sysfs.path(&path),
            detail,
        };
        match encoding {
            Encoding::Int => text
                .parse::<i32>()
                .map_err(|e| parse_err(format!("'{}': {}", text, e))),
            Encoding::MicroAmps => text
                .parse::<i64>()
                .map(|ua| (ua / 1000) as i32)
                .map_err(|e| parse_err(format!("'{}': {}", text, e))),
            Encoding::Status => ChargeStatus::parse(&text)
                .map(ChargeStatus::as_raw)
                .ok_or_else(|| parse_err(format!("unknown status '{}'", text))),
            Encoding::ChargeType => ChargeType::parse(&text)
                .map(ChargeType::as_raw)
                .ok_or_else(|| parse_err(format!("unknown charge type '{}'", text))),
            Encoding::Health => Health::parse(&text)
                .map(Health::as_raw)
                .ok_or_else(|| parse_err(format!("unknown health '{}'", text))),
            Encoding::Cable => {
                let online = text
                    .parse::<i32>()
                    .map_err(|e| parse_err(format!("'{}': {}", text, e)))?;
                if online == 0 {
                    return Ok(0);
                }
                let kind = self.sysfs.read_optional(self.attr_path("type"))?;
                Ok(kind
                    .as_deref()
                    .and_then(CableType::from_supply_type)
                    .map_or(online, CableType::as_raw))
            }
        }
    }

    fn set(&mut self, property: Property, value: i32) -> Result<()> {
        let (attr, encoding) = attribute(property);
        let path = self.attr_path(attr);
        if !self.sysfs.exists(&path) {
            return Err(self.unsupported(property));
        }
        let text = match encoding {
            Encoding::Int | Encoding::Cable => value.to_string(),
            Encoding::MicroAmps => (i64::from(value) * 1000).to_string(),
            Encoding::Status => ChargeStatus::from_raw(value).as_str().to_string(),
            Encoding::ChargeType => ChargeType::from_raw(value).as_str().to_string(),
            Encoding::Health => Health::from_raw(value).as_str().to_string(),
        };
        self.sysfs.write(&path, &text)
    }
}

/// Jig signal read from a sysfs file (`1` = attached).
pub struct SysfsJig {
    sysfs: SysfsRoot,
    path: PathBuf,
}

impl SysfsJig {
    pub fn new(sysfs: SysfsRoot, path: impl Into<PathBuf>) -> Self {
        Self {
            sysfs,
            path: path.into(),
        }
    }
}

impl JigSense for SysfsJig {
    fn attached(&self) -> bool {
        self.sysfs
            .read_optional(&self.path)
            .unwrap_or(None)
            .as_deref()
            == Some("1")
    }
}
