//! Data models for the automation engine

use crate::error::AutomationError;
use chrono::NaiveTime;
use hestia_devices::{lock_device, AttributeValue, DeviceHandle, DeviceKind, OnOffState};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Command applied to a device when a task or trigger fires
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Turn the device on
    TurnOn,
    /// Turn the device off
    TurnOff,
    /// Flip the current power state
    Toggle,
    /// Write a device attribute, e.g. `temperature=21.5`
    SetAttribute { name: String, value: AttributeValue },
}

impl Command {
    /// Apply the command through the device capability surface.
    ///
    /// An attribute write the device rejects is logged and swallowed: a
    /// misconfigured rule must not kill the timer that fired it.
    pub fn apply(&self, handle: &DeviceHandle) {
        let mut device = lock_device(handle);
        match self {
            Self::TurnOn => device.turn_on(),
            Self::TurnOff => device.turn_off(),
            Self::Toggle => match device.status() {
                OnOffState::On => device.turn_off(),
                OnOffState::Off => device.turn_on(),
            },
            Self::SetAttribute { name, value } => {
                if let Err(e) = device.set_attribute(name, value.clone()) {
                    tracing::warn!("command dropped for device {}: {}", device.id(), e);
                }
            }
        }
    }
}

impl FromStr for Command {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "on" => Ok(Self::TurnOn),
            "off" => Ok(Self::TurnOff),
            "toggle" => Ok(Self::Toggle),
            other => match other.split_once('=') {
                Some((name, raw)) if !name.is_empty() && !raw.is_empty() => {
                    let value = raw
                        .parse::<f64>()
                        .map(AttributeValue::Number)
                        .unwrap_or_else(|_| AttributeValue::Text(raw.to_string()));
                    Ok(Self::SetAttribute {
                        name: name.to_string(),
                        value,
                    })
                }
                _ => Err(AutomationError::InvalidCommand(other.to_string())),
            },
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TurnOn => f.write_str("on"),
            Self::TurnOff => f.write_str("off"),
            Self::Toggle => f.write_str("toggle"),
            Self::SetAttribute { name, value } => write!(f, "{name}={value}"),
        }
    }
}

/// Comparison relation between a device attribute and a threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Relation {
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = ">")]
    Greater,
}

impl Relation {
    /// Whether `lhs <relation> rhs` holds.
    #[must_use]
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Less => lhs < rhs,
            Self::LessOrEqual => lhs <= rhs,
            Self::Equal => lhs == rhs,
            Self::GreaterOrEqual => lhs >= rhs,
            Self::Greater => lhs > rhs,
        }
    }
}

impl FromStr for Relation {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(Self::Less),
            "<=" => Ok(Self::LessOrEqual),
            "==" => Ok(Self::Equal),
            ">=" => Ok(Self::GreaterOrEqual),
            ">" => Ok(Self::Greater),
            other => Err(AutomationError::InvalidRelation(other.to_string())),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Equal => "==",
            Self::GreaterOrEqual => ">=",
            Self::Greater => ">",
        })
    }
}

/// One-shot task armed for the next occurrence of a wall-clock time.
///
/// The record outlives the fire so listings can still report it; `fired` is
/// written by the timer task and read by `view`.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub device_id: u32,
    pub time: NaiveTime,
    pub command: Command,
    pub fired: Arc<AtomicBool>,
}

impl ScheduledTask {
    #[must_use]
    pub fn new(device_id: u32, time: NaiveTime, command: Command) -> Self {
        Self {
            device_id,
            time,
            command,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn view(&self) -> TaskView {
        TaskView {
            device: self.device_id,
            time: self.time.format("%H:%M").to_string(),
            command: self.command.to_string(),
            fired: self.fired.load(Ordering::Relaxed),
        }
    }
}

/// Recurring condition → action rule bound to one device.
///
/// The binding is fixed at creation: devices registered later never
/// re-target the rule.
#[derive(Clone)]
pub struct AutomatedTrigger {
    pub trigger_id: u32,
    pub kind: DeviceKind,
    pub device_id: u32,
    pub device: DeviceHandle,
    /// Attribute the condition reads, resolved from the bound device at
    /// creation. `None` means the device exposes nothing to compare against.
    pub attribute: Option<&'static str>,
    pub relation: Relation,
    pub threshold: f64,
    pub command: Command,
    pub interval_secs: u64,
}

impl AutomatedTrigger {
    #[must_use]
    pub fn view(&self) -> TriggerView {
        TriggerView {
            trigger_id: self.trigger_id,
            condition: format!(
                "{} {} {}",
                self.attribute.unwrap_or("value"),
                self.relation,
                self.threshold
            ),
            command: self.command.to_string(),
            interval_secs: self.interval_secs,
        }
    }
}

/// Pending one-shot task, as reported by `list_scheduled_tasks`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    pub device: u32,
    pub time: String,
    pub command: String,
    pub fired: bool,
}

/// Active trigger, as reported by `list_triggers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerView {
    pub trigger_id: u32,
    pub condition: String,
    pub command: String,
    pub interval_secs: u64,
}

/// One row of the status report
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub id: u32,
    pub kind: DeviceKind,
    pub power: OnOffState,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, AttributeValue>,
}
