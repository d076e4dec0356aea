//! # benchtop-runner
//!
//! Executes an [`ExecutionPlan`](benchtop_core::ExecutionPlan) against real
//! or mock hardware.
//!
//! This crate provides:
//! - `HardwareTest` and `TestContext`, the interface tests are written against
//! - The binding that turns plan annotations into markers and skips
//!   registered tests the plan did not select
//! - `TestEngine`, which owns one hardware session per run
//! - The built-in test library for the CAN, serial, GPIO and diagnostics suites
//! - Terminal and JSON reporting, and the process exit codes of `benchtop`

pub mod binding;
mod case;
mod cases;
mod engine;
mod error;
pub mod exit;
mod reporter;

pub use binding::{
    Collected, Collection, EXCLUDED_REASON, Marker, collect, markers_for, select_by_markers,
};
pub use case::{HardwareTest, TestBody, TestCase, TestContext, check, ensure};
pub use cases::{CAN_INTERFACE, GPIO_INTERFACE, SERIAL_INTERFACE, builtin_tests};
pub use engine::{
    ProgressCallback, ProgressEvent, RunResults, STOPPED_REASON, TestEngine, TestOutcome,
    TestStatus,
};
pub use error::{RunnerError, TestFailure, TestResult};
pub use reporter::{
    PlanReport, PlannedTest, ReportSummary, RunReport, TerminalReporter, Verbosity,
    create_progress_callback, print_plan,
};
