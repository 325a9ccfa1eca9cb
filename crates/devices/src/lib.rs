//! Device layer for the Hestia home controller
//!
//! This crate owns the device model, the capability trait every variant
//! implements, and the registry the schedulers read device state from.

pub mod device;
pub mod error;
pub mod registry;

pub use device::{
    create_device, lock_device, AttributeValue, Device, DeviceHandle, DeviceKind, Light, OnOffState,
    Outlet, Thermostat,
};
pub use error::DeviceError;
pub use registry::DeviceRegistry;
