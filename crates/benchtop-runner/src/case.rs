//! Hardware tests and the context they run in.
//!
//! A test is registered under a `(suite, name)` pair matching a test declared
//! in the registry. The engine runs it only when the execution plan selects
//! that pair, handing it a [`TestContext`] that borrows the session's
//! [`HardwareFacade`].

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use benchtop_adapters::HardwareFacade;
use benchtop_core::{PlatformConfig, ResolvedTest, TestKey, TestParameters};
use benchtop_proto::{AdapterVariant, CanBus, GpioBank, OperationResult, SerialPort};

use crate::binding::Marker;
use crate::error::{TestFailure, TestResult};

/// A test the engine can execute against the session hardware.
#[async_trait]
pub trait HardwareTest: Send + Sync {
    /// Suite the test is declared in.
    fn suite(&self) -> &str;

    /// Test name, unique within the suite.
    fn name(&self) -> &str;

    fn key(&self) -> TestKey {
        TestKey::new(self.suite(), self.name())
    }

    async fn run(&self, ctx: &mut TestContext<'_>) -> TestResult;
}

/// Signature of a synchronous test body.
pub type TestBody = fn(&mut TestContext<'_>) -> TestResult;

/// A test backed by a plain function.
///
/// Adapter calls are synchronous, so most hardware tests are written this way.
#[derive(Clone)]
pub struct TestCase {
    suite: &'static str,
    name: &'static str,
    body: TestBody,
}

impl TestCase {
    pub const fn new(suite: &'static str, name: &'static str, body: TestBody) -> Self {
        Self { suite, name, body }
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("suite", &self.suite)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HardwareTest for TestCase {
    fn suite(&self) -> &str {
        self.suite
    }

    fn name(&self) -> &str {
        self.name
    }

    async fn run(&self, ctx: &mut TestContext<'_>) -> TestResult {
        (self.body)(ctx)
    }
}

/// What a running test can see: the hardware, its own resolved metadata and
/// markers, and the plan's environment overlay.
pub struct TestContext<'a> {
    facade: &'a mut HardwareFacade,
    test: &'a ResolvedTest,
    markers: &'a [Marker],
    overlay: &'a BTreeMap<String, String>,
}

impl<'a> TestContext<'a> {
    pub fn new(
        facade: &'a mut HardwareFacade,
        test: &'a ResolvedTest,
        markers: &'a [Marker],
        overlay: &'a BTreeMap<String, String>,
    ) -> Self {
        Self {
            facade,
            test,
            markers,
            overlay,
        }
    }

    pub fn test(&self) -> &ResolvedTest {
        self.test
    }

    pub fn markers(&self) -> &[Marker] {
        self.markers
    }

    pub fn has_marker(&self, name: &str) -> bool {
        self.markers.iter().any(|marker| marker.is_tag(name))
    }

    /// Reads a value from the plan's environment overlay.
    pub fn env(&self, key: &str) -> Option<&str> {
        self.overlay.get(key).map(String::as_str)
    }

    pub fn platform(&self) -> &PlatformConfig {
        self.facade.platform()
    }

    pub fn parameters(&self) -> &TestParameters {
        &self.facade.platform().test_parameters
    }

    /// Whether the named interface runs its mock variant.
    pub fn is_mock(&self, interface: &str) -> bool {
        self.facade
            .interface(interface)
            .is_ok_and(|adapter| adapter.variant() == AdapterVariant::Mock)
    }

    pub fn is_ready(&self, interface: &str) -> Result<bool, TestFailure> {
        Ok(self.facade.interface(interface)?.is_ready())
    }

    pub fn can(&mut self, interface: &str) -> Result<&mut dyn CanBus, TestFailure> {
        Ok(self.facade.can(interface)?)
    }

    pub fn serial(&mut self, interface: &str) -> Result<&mut dyn SerialPort, TestFailure> {
        Ok(self.facade.serial(interface)?)
    }

    pub fn gpio(&mut self, interface: &str) -> Result<&mut dyn GpioBank, TestFailure> {
        Ok(self.facade.gpio(interface)?)
    }
}

/// Fails the test with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition {
        Ok(())
    } else {
        Err(TestFailure::Assertion(message.into()))
    }
}

/// Turns a failed operation result into a test failure, passing successes through.
pub fn check(result: OperationResult, operation: &str) -> Result<OperationResult, TestFailure> {
    if result.success {
        Ok(result)
    } else {
        Err(TestFailure::Operation {
            operation: operation.to_string(),
            error: result.error_message().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passes(_ctx: &mut TestContext<'_>) -> TestResult {
        Ok(())
    }

    #[test]
    fn test_case_key() {
        let case = TestCase::new("can_bus", "test_can_initialization", passes);
        assert_eq!(case.key(), TestKey::new("can_bus", "test_can_initialization"));
        assert!(format!("{case:?}").contains("test_can_initialization"));
    }

    #[test]
    fn test_ensure() {
        assert!(ensure(true, "unused").is_ok());
        let err = ensure(false, "bus not ready").unwrap_err();
        assert_eq!(err.to_string(), "assertion failed: bus not ready");
    }

    #[test]
    fn test_check_maps_failed_result() {
        assert!(check(OperationResult::ok(), "send").is_ok());
        match check(OperationResult::failure("busy"), "CAN send") {
            Err(TestFailure::Operation { operation, error }) => {
                assert_eq!(operation, "CAN send");
                assert_eq!(error, "busy");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
