//! # benchtop-adapters
//!
//! Hardware adapters for the Benchtop harness.
//!
//! - [`AdapterRegistry`] maps interface names (`can`, `serial`, `gpio`) to
//!   their live and mock constructors, built from an explicit table.
//! - Each interface module ships a thin live adapter and a simulating mock.
//! - [`HardwareFacade`] owns one adapter per interface of a platform for the
//!   duration of a test session.
//!
//! A platform can force the mock on a single interface with `type: mock`
//! while the rest of the platform runs live.

mod can;
mod facade;
mod gpio;
mod registry;
mod serial;

pub use can::{CanAdapter, MOCK_RESPONSE_OFFSET, MockCanAdapter};
pub use facade::HardwareFacade;
pub use gpio::{GpioAdapter, MockGpioAdapter};
pub use registry::{AdapterAvailability, AdapterFactory, AdapterRegistration, AdapterRegistry};
pub use serial::{MOCK_LINE_RESPONSE, MockSerialAdapter, SerialAdapter};
