//! Built-in hardware test library.
//!
//! Covers the interfaces shipped in `benchtop-adapters`. Every test here is
//! declared under the same `(suite, name)` in `config/test_registry`, so
//! `benchtop --exec-profile smoke` runs end to end against `mock_platform`
//! with no hardware attached.
//!
//! The engine keeps one facade for the whole session, so a test must not
//! assume a clean device: CAN tests drain the receive queue and clear
//! filters first, serial tests flush the port.

mod can_bus;
mod diagnostics;
mod gpio;
mod serial;

use crate::case::{HardwareTest, TestCase};

pub const CAN_INTERFACE: &str = "can";
pub const SERIAL_INTERFACE: &str = "serial";
pub const GPIO_INTERFACE: &str = "gpio";

const SUITES: &[&[TestCase]] = &[
    can_bus::TESTS,
    serial::TESTS,
    gpio::TESTS,
    diagnostics::TESTS,
];

/// Every built-in test, suite by suite.
pub fn builtin_tests() -> Vec<Box<dyn HardwareTest>> {
    SUITES
        .iter()
        .flat_map(|suite| suite.iter())
        .map(|case| Box::new(case.clone()) as Box<dyn HardwareTest>)
        .collect()
}
