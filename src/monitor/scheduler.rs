//! Single-threaded monitor loop: one timer, one event channel.

use super::Battery;
use super::surface::BatteryProperty;
use crate::interval::NextWake;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pending wake-up, in the battery clock's time base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Duration>,
}

impl Timer {
    pub fn arm(&mut self, now: Duration, next: NextWake) {
        self.deadline = Some(now + next.interval);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left until the wake-up; zero once it's due, `None` when idle.
    pub fn remaining(&self, now: Duration) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_sub(now))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Run a cycle now (cable notification, property write, recovery done).
    Trigger,
    Suspend,
    Resume,
    Shutdown,
}

/// Feeds events to the monitor thread. Clones share the channel.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    tx: Sender<Event>,
}

impl MonitorHandle {
    fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            debug!(?event, "monitor thread gone");
        }
    }

    pub fn trigger(&self) {
        self.send(Event::Trigger);
    }

    pub fn suspend(&self) {
        self.send(Event::Suspend);
    }

    pub fn resume(&self) {
        self.send(Event::Resume);
    }

    pub fn shutdown(&self) {
        self.send(Event::Shutdown);
    }

    /// Property writes are not applied; they only re-run the monitor.
    pub fn write_property(&self, property: BatteryProperty, value: i32) {
        debug!(property = property.name(), value, "property write");
        self.trigger();
    }
}

/// Start the monitor thread. It runs a first cycle immediately.
pub fn spawn(battery: Arc<Battery>) -> (MonitorHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel();
    let handle = MonitorHandle { tx };
    let loop_handle = handle.clone();
    let thread = std::thread::spawn(move || run(battery, rx, loop_handle));
    handle.trigger();
    (handle, thread)
}

/// Event loop. Never runs two cycles at once; recovery runs on its own thread
/// and triggers a cycle when it finishes.
pub fn run(battery: Arc<Battery>, rx: Receiver<Event>, handle: MonitorHandle) {
    let mut timer = Timer::default();
    let mut recovery: Option<JoinHandle<()>> = None;

    loop {
        let event = match timer.remaining(battery.clock().now()) {
            Some(wait) => match rx.recv_timeout(wait) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => Event::Trigger,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match rx.recv() {
                Ok(event) => event,
                Err(_) => break,
            },
        };

        match event {
            Event::Trigger | Event::Resume => {
                if event == Event::Resume {
                    battery.resume();
                }
                timer.cancel();
                let outcome = battery.monitor_cycle();
                timer.arm(battery.clock().now(), outcome.next);

                let idle = recovery.as_ref().map_or(true, |t| t.is_finished());
                if outcome.recovery && idle {
                    let battery = Arc::clone(&battery);
                    let handle = handle.clone();
                    recovery = Some(std::thread::spawn(move || {
                        let outcome = battery.recover();
                        info!(?outcome, "recovery finished");
                        handle.trigger();
                    }));
                }
            }
            Event::Suspend => {
                timer.cancel();
                let next = battery.suspend();
                timer.arm(battery.clock().now(), next);
            }
            Event::Shutdown => {
                timer.cancel();
                break;
            }
        }
    }

    if let Some(thread) = recovery {
        if thread.join().is_err() {
            warn!("recovery thread panicked");
        }
    }
    info!("monitor stopped");
}
