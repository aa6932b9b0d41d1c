//! Power-source adapter: the charger and fuel-gauge collaborators.

pub mod mock;
pub mod sysfs;

use crate::error::Result;
use crate::property::Property;
use serde::Serialize;
use tracing::{debug, trace};

/// A device exposing readable and writable power-supply properties.
pub trait PowerSource: Send {
    fn name(&self) -> &str;

    /// Read a property. Unsupported properties return `Error::Unsupported`.
    fn get(&mut self, property: Property) -> Result<i32>;

    fn set(&mut self, property: Property, value: i32) -> Result<()>;
}

/// Factory test jig detection.
pub trait JigSense: Send + Sync {
    fn attached(&self) -> bool;
}

/// No jig is ever attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoJig;

impl JigSense for NoJig {
    fn attached(&self) -> bool {
        false
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Supply {
    Charger,
    FuelGauge,
}

/// Both collaborators plus the suspended flag. Lives behind the ops lock.
pub struct Supplies {
    charger: Box<dyn PowerSource>,
    fuel_gauge: Box<dyn PowerSource>,
    suspended: bool,
}

impl Supplies {
    pub fn new(charger: Box<dyn PowerSource>, fuel_gauge: Box<dyn PowerSource>) -> Self {
        Self {
            charger,
            fuel_gauge,
            suspended: false,
        }
    }

    fn source(&mut self, supply: Supply) -> &mut dyn PowerSource {
        match supply {
            Supply::Charger => self.charger.as_mut(),
            Supply::FuelGauge => self.fuel_gauge.as_mut(),
        }
    }

    pub fn get(&mut self, supply: Supply, property: Property) -> Option<i32> {
        let source = self.source(supply);
        match source.get(property) {
            Ok(value) => {
                trace!(supply = source.name(), ?property, value, "get");
                Some(value)
            }
            Err(e) => {
                debug!("{}", e);
                None
            }
        }
    }

    /// Read a property, keeping `prior` when the collaborator can't answer.
    pub fn get_or(&mut self, supply: Supply, property: Property, prior: i32) -> i32 {
        self.get(supply, property).unwrap_or(prior)
    }

    /// Write a property. Dropped while suspended; returns whether it was applied.
    pub fn set(&mut self, supply: Supply, property: Property, value: i32) -> bool {
        if self.suspended {
            debug!(?supply, ?property, value, "write dropped while suspended");
            return false;
        }
        let source = self.source(supply);
        match source.set(property, value) {
            Ok(()) => {
                trace!(supply = source.name(), ?property, value, "set");
                true
            }
            Err(e) => {
                debug!("{}", e);
                false
            }
        }
    }

    pub fn set_suspended(&mut self, suspended: bool) {
        self.suspended = suspended;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }
}
