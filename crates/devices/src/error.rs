//! Error types for the device layer

use crate::device::DeviceKind;
use thiserror::Error;

/// Errors from the device layer
#[derive(Error, Debug)]
pub enum DeviceError {
    /// A device with this id is already registered
    #[error("device id {0} is already registered")]
    DuplicateId(u32),

    /// The factory does not know this device type tag
    #[error("unknown device type: {0}")]
    UnknownKind(String),

    /// The device does not expose the named attribute
    #[error("{kind} devices have no attribute named {name:?}")]
    UnsupportedAttribute { kind: DeviceKind, name: String },

    /// The attribute exists but the value has the wrong shape
    #[error("invalid value for attribute {name:?}: {value}")]
    InvalidAttributeValue { name: String, value: String },
}
