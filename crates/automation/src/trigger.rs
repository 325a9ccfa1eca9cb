//! Recurring trigger engine
//!
//! Every trigger owns one timer task that polls its bound device attribute
//! on the trigger's own interval. Changing an interval swaps the timer
//! without dropping the trigger's identity or ever leaving zero (or two)
//! timers for an id.

use crate::controller::AutomationEvent;
use crate::error::AutomationError;
use crate::model::{AutomatedTrigger, TriggerView};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use hestia_devices::lock_device;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Engine for recurring condition → action rules
pub struct TriggerEngine {
    /// Trigger records, keyed by trigger id.
    triggers: DashMap<u32, AutomatedTrigger>,
    /// Active timer handles, keyed by trigger id. Exactly one per trigger.
    timers: DashMap<u32, JoinHandle<()>>,
    event_tx: broadcast::Sender<AutomationEvent>,
}

impl TriggerEngine {
    pub(crate) fn new(event_tx: broadcast::Sender<AutomationEvent>) -> Self {
        Self {
            triggers: DashMap::new(),
            timers: DashMap::new(),
            event_tx,
        }
    }

    /// Register a trigger and arm its recurring checker.
    pub fn add(&self, trigger: AutomatedTrigger) -> Result<(), AutomationError> {
        if trigger.interval_secs == 0 {
            return Err(AutomationError::InvalidInterval);
        }
        match self.triggers.entry(trigger.trigger_id) {
            Entry::Occupied(_) => Err(AutomationError::DuplicateTriggerId(trigger.trigger_id)),
            Entry::Vacant(slot) => {
                let id = trigger.trigger_id;
                let interval = trigger.interval_secs;
                let handle = self.spawn_checker(&trigger);
                slot.insert(trigger);
                self.timers.insert(id, handle);
                tracing::info!("armed trigger {id}, checking every {interval}s");
                Ok(())
            }
        }
    }

    /// Swap a trigger's timer for one on a new period.
    ///
    /// The replacement is armed before the stale timer is aborted, so the id
    /// never has zero timers; a check already in flight may complete, but no
    /// check starts on the stale interval once this returns. Returns whether
    /// the trigger existed.
    pub fn change_interval(
        &self,
        trigger_id: u32,
        new_interval_secs: u64,
    ) -> Result<bool, AutomationError> {
        if new_interval_secs == 0 {
            return Err(AutomationError::InvalidInterval);
        }
        let Some(mut trigger) = self.triggers.get_mut(&trigger_id) else {
            tracing::warn!("no trigger with id {trigger_id}, interval unchanged");
            return Ok(false);
        };
        trigger.interval_secs = new_interval_secs;
        let replacement = self.spawn_checker(&trigger);
        // Swap while holding the trigger entry: concurrent interval changes
        // for the same id serialize here.
        match self.timers.get_mut(&trigger_id) {
            Some(mut slot) => {
                let stale = std::mem::replace(&mut *slot, replacement);
                stale.abort();
            }
            None => {
                self.timers.insert(trigger_id, replacement);
            }
        }
        tracing::info!("trigger {trigger_id} now checks every {new_interval_secs}s");
        Ok(true)
    }

    /// Current checking interval of a trigger, if it exists.
    #[must_use]
    pub fn current_interval(&self, trigger_id: u32) -> Option<u64> {
        self.triggers
            .get(&trigger_id)
            .map(|entry| entry.interval_secs)
    }

    /// Active triggers, ordered by trigger id.
    #[must_use]
    pub fn list(&self) -> Vec<TriggerView> {
        let mut views: Vec<TriggerView> = self
            .triggers
            .iter()
            .map(|entry| entry.value().view())
            .collect();
        views.sort_by_key(|view| view.trigger_id);
        views
    }

    /// Number of live timer tasks.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.timers.len()
    }

    fn spawn_checker(&self, trigger: &AutomatedTrigger) -> JoinHandle<()> {
        let trigger = trigger.clone();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(Duration::from_secs(trigger.interval_secs));
            // The first tick completes immediately; skip it so the first
            // real check lands one interval after arming.
            ticks.tick().await;
            loop {
                ticks.tick().await;
                check(&trigger, &event_tx);
            }
        })
    }
}

impl Drop for TriggerEngine {
    fn drop(&mut self) {
        for entry in self.timers.iter() {
            entry.value().abort();
        }
    }
}

/// Evaluate one tick: read the bound attribute, compare, fire on match.
///
/// The read holds the device lock only for the attribute call; the action,
/// if any, re-enters through the same capability surface as one-shot tasks.
fn check(trigger: &AutomatedTrigger, event_tx: &broadcast::Sender<AutomationEvent>) {
    let value = trigger.attribute.and_then(|name| {
        let device = lock_device(&trigger.device);
        device.attribute(name).and_then(|v| v.as_number())
    });
    let Some(value) = value else {
        tracing::debug!(
            "trigger {} has no readable attribute, skipping check",
            trigger.trigger_id
        );
        return;
    };
    if trigger.relation.holds(value, trigger.threshold) {
        tracing::debug!(
            "trigger {} condition met: {value} {} {}",
            trigger.trigger_id,
            trigger.relation,
            trigger.threshold
        );
        trigger.command.apply(&trigger.device);
        let _ = event_tx.send(AutomationEvent::TriggerFired {
            trigger_id: trigger.trigger_id,
            device_id: trigger.device_id,
            command: trigger.command.clone(),
        });
    }
}
