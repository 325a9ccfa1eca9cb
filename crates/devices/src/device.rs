//! Device model and capability surface

use crate::error::DeviceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Device kinds known to the factory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Light,
    Outlet,
    Thermostat,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Light => "light",
            Self::Outlet => "outlet",
            Self::Thermostat => "thermostat",
        };
        f.write_str(name)
    }
}

impl FromStr for DeviceKind {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "light" => Ok(Self::Light),
            "outlet" => Ok(Self::Outlet),
            "thermostat" => Ok(Self::Thermostat),
            other => Err(DeviceError::UnknownKind(other.to_string())),
        }
    }
}

/// On/off power state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnOffState {
    On,
    Off,
}

impl fmt::Display for OnOffState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::On => "on",
            Self::Off => "off",
        })
    }
}

/// Value of a named device attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(f64),
    Text(String),
}

impl AttributeValue {
    /// Numeric view of the value, if it has one.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

/// Capability surface shared by every device variant.
///
/// Schedulers and triggers only ever talk to a device through this trait.
/// Variant-specific state (e.g. a thermostat setpoint) is reached through the
/// attribute accessors, so callers never branch on concrete types.
pub trait Device: Send + fmt::Debug {
    fn id(&self) -> u32;
    fn kind(&self) -> DeviceKind;
    fn turn_on(&mut self);
    fn turn_off(&mut self);
    fn status(&self) -> OnOffState;

    /// Read a named attribute. Unknown names yield `None`.
    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        let _ = name;
        None
    }

    /// Write a named attribute.
    fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<(), DeviceError> {
        let _ = value;
        Err(DeviceError::UnsupportedAttribute {
            kind: self.kind(),
            name: name.to_string(),
        })
    }

    /// Names of the attributes this device exposes, for status reporting and
    /// trigger binding.
    fn attribute_names(&self) -> &'static [&'static str] {
        &[]
    }
}

/// Shared, individually locked device reference.
///
/// The per-device mutex serializes state changes, so a one-shot task and a
/// trigger firing at the same moment cannot interleave their updates.
pub type DeviceHandle = Arc<Mutex<Box<dyn Device>>>;

/// Lock a device handle, recovering the guard if a previous holder panicked.
/// A failing timer callback must not take the device down with it.
pub fn lock_device(handle: &DeviceHandle) -> MutexGuard<'_, Box<dyn Device>> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Construct a device of the given kind behind a shared handle.
#[must_use]
pub fn create_device(id: u32, kind: DeviceKind) -> DeviceHandle {
    let device: Box<dyn Device> = match kind {
        DeviceKind::Light => Box::new(Light::new(id)),
        DeviceKind::Outlet => Box::new(Outlet::new(id)),
        DeviceKind::Thermostat => Box::new(Thermostat::new(id)),
    };
    Arc::new(Mutex::new(device))
}

/// Plain on/off light
#[derive(Debug)]
pub struct Light {
    id: u32,
    state: OnOffState,
}

impl Light {
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self {
            id,
            state: OnOffState::Off,
        }
    }
}

impl Device for Light {
    fn id(&self) -> u32 {
        self.id
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Light
    }

    fn turn_on(&mut self) {
        self.state = OnOffState::On;
    }

    fn turn_off(&mut self) {
        self.state = OnOffState::Off;
    }

    fn status(&self) -> OnOffState {
        self.state
    }
}

/// Switched wall outlet
#[derive(Debug)]
pub struct Outlet {
    id: u32,
    state: OnOffState,
}

impl Outlet {
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self {
            id,
            state: OnOffState::Off,
        }
    }
}

impl Device for Outlet {
    fn id(&self) -> u32 {
        self.id
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Outlet
    }

    fn turn_on(&mut self) {
        self.state = OnOffState::On;
    }

    fn turn_off(&mut self) {
        self.state = OnOffState::Off;
    }

    fn status(&self) -> OnOffState {
        self.state
    }
}

/// Thermostat with a temperature setpoint
#[derive(Debug)]
pub struct Thermostat {
    id: u32,
    state: OnOffState,
    temperature: f64,
}

impl Thermostat {
    /// Setpoint new thermostats start at, in degrees Celsius.
    pub const DEFAULT_TEMPERATURE: f64 = 20.0;

    #[must_use]
    pub fn new(id: u32) -> Self {
        Self {
            id,
            state: OnOffState::Off,
            temperature: Self::DEFAULT_TEMPERATURE,
        }
    }

    #[must_use]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }
}

impl Device for Thermostat {
    fn id(&self) -> u32 {
        self.id
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Thermostat
    }

    fn turn_on(&mut self) {
        self.state = OnOffState::On;
    }

    fn turn_off(&mut self) {
        self.state = OnOffState::Off;
    }

    fn status(&self) -> OnOffState {
        self.state
    }

    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        match name {
            "temperature" => Some(AttributeValue::Number(self.temperature)),
            _ => None,
        }
    }

    fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<(), DeviceError> {
        match name {
            "temperature" => match value.as_number() {
                Some(degrees) => {
                    self.temperature = degrees;
                    Ok(())
                }
                None => Err(DeviceError::InvalidAttributeValue {
                    name: name.to_string(),
                    value: value.to_string(),
                }),
            },
            _ => Err(DeviceError::UnsupportedAttribute {
                kind: self.kind(),
                name: name.to_string(),
            }),
        }
    }

    fn attribute_names(&self) -> &'static [&'static str] {
        &["temperature"]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_tags() {
        for tag in ["light", "outlet", "thermostat"] {
            let kind: DeviceKind = tag.parse().unwrap();
            assert_eq!(kind.to_string(), tag);
        }
        assert!("toaster".parse::<DeviceKind>().is_err());
    }

    #[test]
    fn devices_start_off_and_toggle() {
        let handle = create_device(3, DeviceKind::Light);
        {
            let mut light = lock_device(&handle);
            assert_eq!(light.status(), OnOffState::Off);
            light.turn_on();
            assert_eq!(light.status(), OnOffState::On);
        }
        let light = lock_device(&handle);
        assert_eq!(light.id(), 3);
        assert_eq!(light.kind(), DeviceKind::Light);
    }

    #[test]
    fn thermostat_temperature_is_a_generic_attribute() {
        let mut thermostat = Thermostat::new(7);
        assert_eq!(
            thermostat.attribute("temperature"),
            Some(AttributeValue::Number(Thermostat::DEFAULT_TEMPERATURE))
        );

        thermostat
            .set_attribute("temperature", AttributeValue::Number(23.5))
            .unwrap();
        assert_eq!(thermostat.temperature(), 23.5);

        let err = thermostat
            .set_attribute("temperature", AttributeValue::Text("warm".into()))
            .unwrap_err();
        assert!(matches!(err, DeviceError::InvalidAttributeValue { .. }));
    }

    #[test]
    fn lights_reject_attribute_writes() {
        let mut light = Light::new(1);
        assert_eq!(light.attribute("temperature"), None);
        let err = light
            .set_attribute("temperature", AttributeValue::Number(20.0))
            .unwrap_err();
        assert!(matches!(err, DeviceError::UnsupportedAttribute { .. }));
    }
}
