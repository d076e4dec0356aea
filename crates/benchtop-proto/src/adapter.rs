//! The adapter lifecycle trait.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capability::{CanBus, GpioBank, SerialPort};
use crate::operation::OperationResult;

/// Which implementation of an interface an adapter is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterVariant {
    /// Talks to a real device.
    Live,
    /// Simulates the device in-process.
    Mock,
}

impl fmt::Display for AdapterVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterVariant::Live => write!(f, "live"),
            AdapterVariant::Mock => write!(f, "mock"),
        }
    }
}

/// A driver object for one hardware interface.
///
/// Lifecycle failures are reported through `OperationResult`; adapters do not
/// panic on device errors. `cleanup` must tolerate being called on an adapter
/// whose `initialize` never ran or failed.
///
/// Protocol operations are reached through the capability accessors. An
/// adapter overrides the accessor for each capability it provides.
pub trait Adapter: Send + Sync + fmt::Debug {
    /// Name of the interface this adapter serves (e.g. `can`).
    fn interface(&self) -> &str;

    fn variant(&self) -> AdapterVariant;

    fn initialize(&mut self) -> OperationResult;

    fn cleanup(&mut self) -> OperationResult;

    fn is_ready(&self) -> bool;

    fn can_bus(&mut self) -> Option<&mut dyn CanBus> {
        None
    }

    fn serial_port(&mut self) -> Option<&mut dyn SerialPort> {
        None
    }

    fn gpio_bank(&mut self) -> Option<&mut dyn GpioBank> {
        None
    }
}
