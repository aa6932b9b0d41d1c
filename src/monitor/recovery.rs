//! Error-path task: wait for a missing battery to come back.

use super::Battery;
use crate::charge::Current;
use crate::lock;
use crate::property::{CapacityKind, Property, VoltageKind};
use crate::supply::Supply;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum RecoveryOutcome {
    /// The battery was present when the task started.
    NotNeeded,
    /// Presence returned after `attempts` tries.
    Recovered { attempts: u32, soc_reset: bool },
    /// A factory jig appeared; the battery is intentionally absent.
    JigAttached,
    /// Presence never returned; charging stays off.
    GaveUp,
}

impl Battery {
    /// Bounded presence retry. Resets the fuel gauge SOC if the cell voltage
    /// moved too far while the battery was away.
    pub fn recover(&self) -> RecoveryOutcome {
        let _err = lock(&self.err);
        let recovery = &self.config.recovery;

        let old_vcell = {
            let state = lock(&self.state);
            if !state.info.vf_state {
                return RecoveryOutcome::NotNeeded;
            }
            state.info.vcell
        };
        warn!(attempts = recovery.attempts, "battery missing, waiting for it to return");

        for attempt in 1..=recovery.attempts {
            if self.jig.attached() {
                info!("jig attached, recovery aborted");
                return RecoveryOutcome::JigAttached;
            }
            self.clock.sleep(Duration::from_millis(recovery.delay_ms));

            let mut state = lock(&self.state);
            let inject = state.inject;
            let present = inject.present(lock(&self.ops).get_or(
                Supply::Charger,
                Property::Present,
                0,
            ));
            if present == 0 {
                if attempt == recovery.attempts {
                    self.control(&mut state.info, Current::OFF, Current::OFF);
                }
                continue;
            }

            let mut ops = lock(&self.ops);
            let new_vcell = ops.get_or(
                Supply::FuelGauge,
                Property::VoltageNow(VoltageKind::Vcell),
                old_vcell,
            );
            let soc_reset = old_vcell.saturating_sub(new_vcell).saturating_abs()
                > recovery.reset_soc_threshold;
            if soc_reset {
                info!(old_vcell, new_vcell, "cell voltage moved while absent, resetting SOC");
                ops.set(
                    Supply::FuelGauge,
                    Property::Capacity(CapacityKind::Adjusted),
                    1,
                );
            }

            let info = &mut state.info;
            info.vf_state = false;
            info.battery_present = true;
            info.vcell = new_vcell;
            info!(attempt, "battery back");
            return RecoveryOutcome::Recovered {
                attempts: attempt,
                soc_reset,
            };
        }

        warn!("battery did not return, charging stays off");
        RecoveryOutcome::GaveUp
    }
}
