use crate::lock;
use crate::sysfs::SysfsRoot;
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

/// Held while charging so the system doesn't suspend underneath the charger.
pub const MONITOR_WAKE_LOCK: &str = "battmon-monitor";
/// Taken briefly after each cycle so the update reaches userspace.
pub const UPDATE_WAKE_LOCK: &str = "battmon-update";

/// Suspend blocker. Failures are never fatal; the monitor keeps running.
pub trait WakeLock: Send + Sync {
    fn acquire(&self, name: &str);
    fn acquire_timeout(&self, name: &str, timeout: Duration);
    fn release(&self, name: &str);
    fn is_held(&self, name: &str) -> bool;
}

/// Android-style wake locks through `/sys/power/wake_lock`.
pub struct SysfsWakeLock {
    sysfs: SysfsRoot,
    held: Mutex<BTreeSet<String>>,
}

impl SysfsWakeLock {
    pub fn new(sysfs: SysfsRoot) -> Self {
        Self {
            sysfs,
            held: Mutex::default(),
        }
    }

    /// Whether the running kernel exposes wake locks at all.
    pub fn supported(sysfs: &SysfsRoot) -> bool {
        sysfs.exists("sys/power/wake_lock")
    }
}

impl WakeLock for SysfsWakeLock {
    fn acquire(&self, name: &str) {
        let mut held = lock(&self.held);
        if held.contains(name) {
            return;
        }
        match self.sysfs.write("sys/power/wake_lock", name) {
            Ok(()) => {
                held.insert(name.to_string());
            }
            Err(e) => debug!("wake lock {}: {}", name, e),
        }
    }

    fn acquire_timeout(&self, name: &str, timeout: Duration) {
        let value = format!("{} {}", name, timeout.as_nanos());
        if let Err(e) = self.sysfs.write("sys/power/wake_lock", &value) {
            debug!("wake lock {}: {}", name, e);
        }
    }

    fn release(&self, name: &str) {
        let mut held = lock(&self.held);
        if !held.remove(name) {
            return;
        }
        if let Err(e) = self.sysfs.write("sys/power/wake_unlock", name) {
            debug!("wake unlock {}: {}", name, e);
        }
    }

    fn is_held(&self, name: &str) -> bool {
        lock(&self.held).contains(name)
    }
}

/// Bookkeeping only, for kernels without wake locks and for tests.
#[derive(Debug, Default)]
pub struct NoWakeLock {
    held: Mutex<BTreeSet<String>>,
}

impl WakeLock for NoWakeLock {
    fn acquire(&self, name: &str) {
        lock(&self.held).insert(name.to_string());
    }

    fn acquire_timeout(&self, _name: &str, _timeout: Duration) {}

    fn release(&self, name: &str) {
        lock(&self.held).remove(name);
    }

    fn is_held(&self, name: &str) -> bool {
        lock(&self.held).contains(name)
    }
}
