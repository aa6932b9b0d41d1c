//! Scriptable in-memory power source, used by the simulator and by tests.

use super::{JigSense, PowerSource};
use crate::error::{Error, Result};
use crate::lock;
use crate::property::Property;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// One recorded hardware write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Write {
    pub property: Property,
    pub value: i32,
}

#[derive(Debug, Default)]
struct MockState {
    scripts: HashMap<Property, VecDeque<i32>>,
    unsupported: HashSet<Property>,
    writes: Vec<Write>,
}

/// Clonable handle: every clone sees the same values and write log.
///
/// Each property holds a script of values. Reads consume the script from
/// the front and the last value is sticky. Writes replace the script with
/// the written value, so read-backs return what was commanded.
#[derive(Debug, Clone)]
pub struct MockSupply {
    name: String,
    state: Arc<Mutex<MockState>>,
}

impl MockSupply {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Arc::default(),
        }
    }

    pub fn set_value(&self, property: Property, value: i32) {
        self.script(property, [value]);
    }

    /// Queue a sequence of readings for one property.
    pub fn script(&self, property: Property, values: impl IntoIterator<Item = i32>) {
        let mut state = lock(&self.state);
        state.unsupported.remove(&property);
        state.scripts.insert(property, values.into_iter().collect());
    }

    pub fn set_unsupported(&self, property: Property) {
        let mut state = lock(&self.state);
        state.scripts.remove(&property);
        state.unsupported.insert(property);
    }

    /// Current value without consuming the script.
    pub fn peek(&self, property: Property) -> Option<i32> {
        lock(&self.state)
            .scripts
            .get(&property)
            .and_then(|s| s.front().copied())
    }

    pub fn writes(&self) -> Vec<Write> {
        lock(&self.state).writes.clone()
    }

    /// Writes recorded for a single property.
    pub fn writes_to(&self, property: Property) -> Vec<i32> {
        lock(&self.state)
            .writes
            .iter()
            .filter(|w| w.property == property)
            .map(|w| w.value)
            .collect()
    }

    /// Drain the write log.
    pub fn take_writes(&self) -> Vec<Write> {
        std::mem::take(&mut lock(&self.state).writes)
    }
}

impl PowerSource for MockSupply {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&mut self, property: Property) -> Result<i32> {
        let mut state = lock(&self.state);
        let script = match state.scripts.get_mut(&property) {
            Some(s) if !s.is_empty() => s,
            _ => {
                return Err(Error::Unsupported {
                    supply: self.name.clone(),
                    property,
                });
            }
        };
        let value = if script.len() > 1 {
            script.pop_front().unwrap_or_default()
        } else {
            script[0]
        };
        Ok(value)
    }

    fn set(&mut self, property: Property, value: i32) -> Result<()> {
        let mut state = lock(&self.state);
        if state.unsupported.contains(&property) {
            return Err(Error::Unsupported {
                supply: self.name.clone(),
                property,
            });
        }
        state.writes.push(Write { property, value });
        state.scripts.insert(property, VecDeque::from([value]));
        Ok(())
    }
}

/// Jig signal toggled by the test or scenario.
#[derive(Debug, Clone, Default)]
pub struct MockJig(Arc<AtomicBool>);

impl MockJig {
    pub fn set_attached(&self, attached: bool) {
        self.0.store(attached, Ordering::SeqCst);
    }
}

impl JigSense for MockJig {
    fn attached(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
