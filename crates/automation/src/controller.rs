//! Controller façade wiring the device registry into both schedulers

use crate::error::AutomationError;
use crate::model::{AutomatedTrigger, Command, DeviceStatus, Relation, TaskView, TriggerView};
use crate::scheduler::Scheduler;
use crate::trigger::TriggerEngine;
use hestia_devices::{lock_device, AttributeValue, DeviceKind, DeviceRegistry};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events emitted by the controller and its schedulers
#[derive(Debug, Clone)]
pub enum AutomationEvent {
    /// A device was registered
    DeviceAdded { device_id: u32, kind: DeviceKind },
    /// A one-shot task was armed
    TaskScheduled { device_id: u32 },
    /// A one-shot task fired
    TaskFired { device_id: u32, command: Command },
    /// A trigger was created and armed
    TriggerAdded { trigger_id: u32, device_id: u32 },
    /// A trigger's condition held and its action was issued
    TriggerFired {
        trigger_id: u32,
        device_id: u32,
        command: Command,
    },
    /// A trigger's checking interval was changed
    IntervalChanged { trigger_id: u32, interval_secs: u64 },
}

/// The home controller: public entry point for the whole system.
///
/// Owns the device registry and both scheduling engines. Public operations
/// may be called concurrently with any number of in-flight timer callbacks;
/// none of them blocks on a timer.
pub struct HomeController {
    registry: Arc<DeviceRegistry>,
    scheduler: Scheduler,
    triggers: TriggerEngine,
    event_tx: broadcast::Sender<AutomationEvent>,
}

impl Default for HomeController {
    fn default() -> Self {
        Self::new()
    }
}

impl HomeController {
    #[must_use]
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            registry: Arc::new(DeviceRegistry::new()),
            scheduler: Scheduler::new(event_tx.clone()),
            triggers: TriggerEngine::new(event_tx.clone()),
            event_tx,
        }
    }

    /// Subscribe to controller events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AutomationEvent> {
        self.event_tx.subscribe()
    }

    /// The underlying device registry.
    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Register a new device built by the factory.
    ///
    /// Duplicate ids and unknown type tags are hard rejections; the registry
    /// is left unchanged.
    pub fn add_device(&self, id: u32, kind: &str) -> Result<(), AutomationError> {
        let kind: DeviceKind = kind.parse()?;
        self.registry.add(id, kind)?;
        tracing::info!("added {kind} device {id}");
        let _ = self.event_tx.send(AutomationEvent::DeviceAdded {
            device_id: id,
            kind,
        });
        Ok(())
    }

    /// Arm a one-shot action for the next occurrence of `time` (HH:mm).
    ///
    /// An unknown device id is a logged no-op, matching the permissive
    /// missing-entity policy across the control surface; it short-circuits
    /// before the action and time strings are validated.
    pub fn schedule_device(
        &self,
        device_id: u32,
        time: &str,
        action: &str,
    ) -> Result<(), AutomationError> {
        let Some(device) = self.registry.get(device_id) else {
            tracing::warn!("schedule_device: no device with id {device_id}");
            return Ok(());
        };
        let command: Command = action.parse()?;
        self.scheduler.schedule(device_id, device, time, command)?;
        let _ = self
            .event_tx
            .send(AutomationEvent::TaskScheduled { device_id });
        Ok(())
    }

    /// Create a recurring trigger on the most recently registered device of
    /// `kind`.
    ///
    /// The binding is resolved once, here; devices added later never
    /// re-target the rule. No registered device of the kind is a logged
    /// no-op.
    pub fn add_automated_trigger(
        &self,
        kind: &str,
        relation: &str,
        value: f64,
        action: &str,
        interval_secs: u64,
        trigger_id: u32,
    ) -> Result<(), AutomationError> {
        let kind: DeviceKind = kind.parse()?;
        let Some((device_id, device)) = self.registry.list_by_kind(kind).into_iter().last() else {
            tracing::warn!(
                "add_automated_trigger: no {kind} device registered, ignoring trigger {trigger_id}"
            );
            return Ok(());
        };

        let relation: Relation = relation.parse()?;
        let command: Command = action.parse()?;
        let attribute = lock_device(&device).attribute_names().first().copied();
        if attribute.is_none() {
            tracing::warn!(
                "trigger {trigger_id} bound to {kind} device {device_id}, which exposes no readable attribute"
            );
        }

        self.triggers.add(AutomatedTrigger {
            trigger_id,
            kind,
            device_id,
            device,
            attribute,
            relation,
            threshold: value,
            command,
            interval_secs,
        })?;
        let _ = self.event_tx.send(AutomationEvent::TriggerAdded {
            trigger_id,
            device_id,
        });
        Ok(())
    }

    /// Change a trigger's checking interval, atomically swapping its timer.
    pub fn change_trigger_checking_interval(
        &self,
        trigger_id: u32,
        interval_secs: u64,
    ) -> Result<(), AutomationError> {
        if self.triggers.change_interval(trigger_id, interval_secs)? {
            let _ = self.event_tx.send(AutomationEvent::IntervalChanged {
                trigger_id,
                interval_secs,
            });
        }
        Ok(())
    }

    /// Current checking interval of a trigger, if it exists.
    #[must_use]
    pub fn current_interval(&self, trigger_id: u32) -> Option<u64> {
        self.triggers.current_interval(trigger_id)
    }

    /// Turn a device on. Unknown ids are ignored.
    pub fn turn_on(&self, device_id: u32) {
        if let Some(handle) = self.registry.get(device_id) {
            lock_device(&handle).turn_on();
        }
    }

    /// Turn a device off. Unknown ids are ignored.
    pub fn turn_off(&self, device_id: u32) {
        if let Some(handle) = self.registry.get(device_id) {
            lock_device(&handle).turn_off();
        }
    }

    /// Set a device's power state explicitly.
    pub fn set_power(&self, device_id: u32, on: bool) {
        if on {
            self.turn_on(device_id);
        } else {
            self.turn_off(device_id);
        }
    }

    /// Write a device attribute. Unknown device ids are ignored; an
    /// attribute the device rejects is an error.
    pub fn set_attribute(
        &self,
        device_id: u32,
        name: &str,
        value: AttributeValue,
    ) -> Result<(), AutomationError> {
        let Some(handle) = self.registry.get(device_id) else {
            tracing::warn!("set_attribute: no device with id {device_id}");
            return Ok(());
        };
        lock_device(&handle).set_attribute(name, value)?;
        Ok(())
    }

    /// Status rows for every registered device, in insertion order.
    #[must_use]
    pub fn status_report(&self) -> Vec<DeviceStatus> {
        self.registry
            .all()
            .into_iter()
            .map(|(id, handle)| {
                let device = lock_device(&handle);
                let attributes = device
                    .attribute_names()
                    .iter()
                    .filter_map(|name| {
                        device
                            .attribute(name)
                            .map(|value| ((*name).to_string(), value))
                    })
                    .collect();
                DeviceStatus {
                    id,
                    kind: device.kind(),
                    power: device.status(),
                    attributes,
                }
            })
            .collect()
    }

    /// All recorded one-shot tasks, fired ones flagged.
    #[must_use]
    pub fn list_scheduled_tasks(&self) -> Vec<TaskView> {
        self.scheduler.list()
    }

    /// Active triggers, ordered by trigger id.
    #[must_use]
    pub fn list_triggers(&self) -> Vec<TriggerView> {
        self.triggers.list()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hestia_devices::{DeviceError, OnOffState};
    use std::time::Duration;
    use tokio::time::{timeout, Instant};

    async fn next_event(
        events: &mut broadcast::Receiver<AutomationEvent>,
        what: &str,
    ) -> AutomationEvent {
        timeout(Duration::from_secs(48 * 60 * 60), events.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_and_unknown_devices_are_rejected() {
        let controller = HomeController::new();
        controller.add_device(1, "light").unwrap();

        let err = controller.add_device(1, "thermostat").unwrap_err();
        assert!(matches!(
            err,
            AutomationError::Device(DeviceError::DuplicateId(1))
        ));
        let err = controller.add_device(2, "toaster").unwrap_err();
        assert!(matches!(
            err,
            AutomationError::Device(DeviceError::UnknownKind(_))
        ));

        let report = controller.status_report();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].kind, DeviceKind::Light);
    }

    #[tokio::test(start_paused = true)]
    async fn scheduling_a_missing_device_is_a_no_op() {
        let controller = HomeController::new();
        // Absent device short-circuits before the time string is validated.
        controller.schedule_device(99, "not-a-time", "on").unwrap();
        assert!(controller.list_scheduled_tasks().is_empty());

        controller.add_device(1, "light").unwrap();
        let err = controller
            .schedule_device(1, "not-a-time", "on")
            .unwrap_err();
        assert!(matches!(err, AutomationError::InvalidTimeFormat(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_light_turns_on_at_its_time() {
        let controller = HomeController::new();
        let mut events = controller.subscribe();
        controller.add_device(1, "light").unwrap();
        controller.schedule_device(1, "08:00", "on").unwrap();

        loop {
            if let AutomationEvent::TaskFired { device_id: 1, .. } =
                next_event(&mut events, "task fire").await
            {
                break;
            }
        }
        let report = controller.status_report();
        assert_eq!(report[0].power, OnOffState::On);
        assert!(controller.list_scheduled_tasks()[0].fired);
    }

    #[tokio::test(start_paused = true)]
    async fn hot_thermostat_is_shut_off_by_trigger() {
        let controller = HomeController::new();
        let mut events = controller.subscribe();
        controller.add_device(2, "thermostat").unwrap();
        controller.turn_on(2);
        controller
            .set_attribute(2, "temperature", AttributeValue::Number(35.0))
            .unwrap();

        controller
            .add_automated_trigger("thermostat", ">", 30.0, "off", 5, 100)
            .unwrap();

        let armed = Instant::now();
        loop {
            if let AutomationEvent::TriggerFired { trigger_id: 100, .. } =
                next_event(&mut events, "trigger fire").await
            {
                break;
            }
        }
        assert!(armed.elapsed() <= Duration::from_secs(5));

        let report = controller.status_report();
        assert_eq!(report[0].power, OnOffState::Off);
        assert_eq!(
            report[0].attributes.get("temperature"),
            Some(&AttributeValue::Number(35.0))
        );

        controller.change_trigger_checking_interval(100, 10).unwrap();
        assert_eq!(controller.current_interval(100), Some(10));
        assert_eq!(controller.list_triggers()[0].interval_secs, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_binds_to_the_newest_device_of_its_kind() {
        let controller = HomeController::new();
        controller.add_device(1, "thermostat").unwrap();
        controller.add_device(2, "thermostat").unwrap();
        let mut events = controller.subscribe();

        controller
            .add_automated_trigger("thermostat", ">=", 0.0, "on", 5, 7)
            .unwrap();
        match next_event(&mut events, "trigger added").await {
            AutomationEvent::TriggerAdded { device_id, .. } => assert_eq!(device_id, 2),
            other => panic!("unexpected event {other:?}"),
        }

        // A later device of the same kind does not re-target the rule.
        controller.add_device(3, "thermostat").unwrap();
        loop {
            if let AutomationEvent::TriggerFired { device_id, .. } =
                next_event(&mut events, "trigger fire").await
            {
                assert_eq!(device_id, 2);
                break;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_without_a_matching_device_is_a_no_op() {
        let controller = HomeController::new();
        controller
            .add_automated_trigger("thermostat", ">", 30.0, "off", 5, 1)
            .unwrap();
        assert!(controller.list_triggers().is_empty());

        // Missing trigger ids are equally benign.
        controller.change_trigger_checking_interval(1, 10).unwrap();
        assert_eq!(controller.current_interval(1), None);
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_validation_is_a_hard_rejection() {
        let controller = HomeController::new();
        controller.add_device(1, "thermostat").unwrap();

        let err = controller
            .add_automated_trigger("thermostat", ">", 30.0, "off", 0, 1)
            .unwrap_err();
        assert!(matches!(err, AutomationError::InvalidInterval));
        let err = controller
            .add_automated_trigger("thermostat", "between", 30.0, "off", 5, 1)
            .unwrap_err();
        assert!(matches!(err, AutomationError::InvalidRelation(_)));
        assert!(controller.list_triggers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_adds_all_show_up_in_the_report() {
        let controller = Arc::new(HomeController::new());
        let mut joins = Vec::new();
        for id in 0..8 {
            let controller = controller.clone();
            joins.push(tokio::spawn(async move {
                controller.add_device(id, "outlet").unwrap();
            }));
        }
        for join in joins {
            join.await.unwrap();
        }
        assert_eq!(controller.status_report().len(), 8);
    }
}
