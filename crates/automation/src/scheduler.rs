//! One-shot scheduler for time-of-day device actions

use crate::controller::AutomationEvent;
use crate::error::AutomationError;
use crate::model::{Command, ScheduledTask, TaskView};
use chrono::{Local, NaiveDateTime, NaiveTime};
use hestia_devices::DeviceHandle;
use std::sync::atomic::Ordering;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Scheduler for one-shot device actions at a wall-clock time of day.
///
/// Every armed task runs on its own tokio timer; `schedule` returns as soon
/// as the timer is armed.
pub struct Scheduler {
    /// Task records, kept after firing for introspection.
    tasks: Mutex<Vec<ScheduledTask>>,
    /// Armed timer handles, aborted when the scheduler is dropped.
    timers: Mutex<Vec<JoinHandle<()>>>,
    event_tx: broadcast::Sender<AutomationEvent>,
}

impl Scheduler {
    pub(crate) fn new(event_tx: broadcast::Sender<AutomationEvent>) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            timers: Mutex::new(Vec::new()),
            event_tx,
        }
    }

    /// Arm a single-fire timer for the next occurrence of `time` (HH:mm).
    ///
    /// The delay runs to today's occurrence of the time if it is still
    /// ahead, otherwise to the same time tomorrow. On fire the command goes
    /// through the device capability surface and a `TaskFired` event is
    /// emitted.
    pub fn schedule(
        &self,
        device_id: u32,
        device: DeviceHandle,
        time: &str,
        command: Command,
    ) -> Result<(), AutomationError> {
        let target = parse_time(time)?;
        let delay = delay_until_next(target, Local::now().naive_local());

        let task = ScheduledTask::new(device_id, target, command);
        let fired = task.fired.clone();
        let fire_command = task.command.clone();
        let event_tx = self.event_tx.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tracing::debug!("one-shot task fired for device {device_id}");
            fire_command.apply(&device);
            fired.store(true, Ordering::Relaxed);
            let _ = event_tx.send(AutomationEvent::TaskFired {
                device_id,
                command: fire_command,
            });
        });

        tracing::info!(
            "scheduled {} for device {device_id} at {} (in {:?})",
            task.command,
            target.format("%H:%M"),
            delay
        );
        self.timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
        Ok(())
    }

    /// All recorded tasks, oldest first, fired ones included.
    #[must_use]
    pub fn list(&self) -> Vec<TaskView> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(ScheduledTask::view)
            .collect()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for handle in self
            .timers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            handle.abort();
        }
    }
}

/// Parse a wall-clock time in HH:mm format.
fn parse_time(s: &str) -> Result<NaiveTime, AutomationError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| AutomationError::InvalidTimeFormat(s.to_string()))
}

/// Delay from `now` until the next occurrence of `target`: today if the time
/// is still ahead of us, otherwise tomorrow.
fn delay_until_next(target: NaiveTime, now: NaiveDateTime) -> Duration {
    let mut fire_at = now.date().and_time(target);
    if fire_at <= now {
        fire_at += chrono::Duration::days(1);
    }
    (fire_at - now).to_std().unwrap_or(Duration::ZERO)
}
