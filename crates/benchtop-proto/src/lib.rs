//! # benchtop-proto
//!
//! Shared types, error definitions, and traits for the Benchtop framework.
//!
//! This crate provides the foundational abstractions used across all Benchtop crates,
//! including:
//! - `OperationResult`, the tagged result every adapter operation returns
//! - The `Adapter` lifecycle trait implemented by live and mock adapters
//! - Capability traits (`CanBus`, `SerialPort`, `GpioBank`) exposed by adapters
//! - `AdapterError` for registry and facade failures

mod adapter;
mod capability;
mod error;
mod operation;

pub use adapter::{Adapter, AdapterVariant};
pub use capability::{CanBus, CanFrame, GpioBank, SerialPort};
pub use error::AdapterError;
pub use operation::OperationResult;
