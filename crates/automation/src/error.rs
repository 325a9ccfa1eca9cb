//! Error types for the automation engine

use hestia_devices::DeviceError;
use thiserror::Error;

/// Errors that can occur in the automation engine
#[derive(Error, Debug)]
pub enum AutomationError {
    /// A trigger with this id already exists
    #[error("trigger id {0} is already in use")]
    DuplicateTriggerId(u32),

    /// Time-of-day string did not parse as HH:mm
    #[error("invalid time format (expected HH:mm): {0:?}")]
    InvalidTimeFormat(String),

    /// Checking interval must be a positive number of seconds
    #[error("checking interval must be a positive number of seconds")]
    InvalidInterval,

    /// Unknown comparison relation
    #[error("unknown comparison relation: {0:?}")]
    InvalidRelation(String),

    /// Unknown command tag
    #[error("unknown command: {0:?}")]
    InvalidCommand(String),

    /// Error from the device layer
    #[error(transparent)]
    Device(#[from] DeviceError),
}
