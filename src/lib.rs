pub mod charge;
pub mod check;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod indicator;
pub mod info;
pub mod inject;
pub mod interval;
pub mod monitor;
pub mod output;
pub mod property;
pub mod simulate;
pub mod supply;
pub mod sysfs;
pub mod wakelock;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, taking the data back from a panicked holder.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
