//! Automation engine for the Hestia home controller
//!
//! Provides one-shot time-of-day scheduling and recurring attribute
//! triggers for driving device state through the capability surface.

pub mod controller;
pub mod error;
pub mod model;
pub mod scheduler;
pub mod trigger;

pub use controller::{AutomationEvent, HomeController};
pub use error::AutomationError;
pub use model::*;
