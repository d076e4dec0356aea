//! Capability traits exposed by adapters.
//!
//! Live and mock variants of an interface implement the same capability, so
//! a test written against `CanBus` runs unchanged on a bench or in CI.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::operation::OperationResult;

/// A classic or extended CAN frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanFrame {
    pub id: u32,
    pub data: Vec<u8>,
    #[serde(default)]
    pub extended: bool,
}

impl CanFrame {
    pub fn new(id: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            data: data.into(),
            extended: false,
        }
    }

    pub fn extended(mut self) -> Self {
        self.extended = true;
        self
    }
}

/// Frame-level access to a CAN bus.
pub trait CanBus: Send + Sync {
    fn send(&mut self, frame: &CanFrame) -> OperationResult;

    /// Returns the next frame, or `None` when nothing arrived within `timeout`.
    fn receive(&mut self, timeout: Option<Duration>) -> Option<CanFrame>;

    fn add_filter(&mut self, id: u32, mask: u32) -> OperationResult;

    fn clear_filters(&mut self) -> OperationResult;

    fn filters(&self) -> Vec<u32>;
}

/// Byte-level access to a serial/UART port.
pub trait SerialPort: Send + Sync {
    /// Writes `data`; the payload of a successful result is the byte count.
    fn write(&mut self, data: &[u8]) -> OperationResult;

    fn read(&mut self, size: usize) -> Option<Vec<u8>>;

    fn read_line(&mut self, timeout: Option<Duration>) -> Option<String>;

    fn flush(&mut self);
}

/// Digital pin control.
pub trait GpioBank: Send + Sync {
    fn set_pin(&mut self, pin: u32, value: bool) -> OperationResult;

    fn get_pin(&self, pin: u32) -> Option<bool>;

    /// Resolves a pin alias from the interface's `pins` table.
    fn pin_by_name(&self, name: &str) -> Option<u32>;

    fn toggle_pin(&mut self, pin: u32) -> OperationResult {
        let current = self.get_pin(pin).unwrap_or(false);
        self.set_pin(pin, !current)
    }
}
