//! Process exit codes.

use benchtop_core::ConfigError;
use benchtop_proto::AdapterError;

use crate::engine::RunResults;
use crate::error::RunnerError;

/// Tests were selected and all passed.
pub const PASSED: i32 = 0;
/// At least one test failed or errored.
pub const TESTS_FAILED: i32 = 1;
/// Configuration could not be loaded, validated, or resolved.
pub const CONFIG_ERROR: i32 = 2;
/// An adapter was unavailable or the session hardware failed to come up.
pub const HARDWARE_ERROR: i32 = 3;
/// Selection produced zero tests.
pub const NO_TESTS: i32 = 5;

pub fn for_results(results: &RunResults) -> i32 {
    if results.all_passed() {
        PASSED
    } else {
        TESTS_FAILED
    }
}

/// Exit code for an error that aborted the run.
pub fn for_error(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<ConfigError>().is_some() {
        return CONFIG_ERROR;
    }
    if err.downcast_ref::<AdapterError>().is_some() {
        return HARDWARE_ERROR;
    }
    match err.downcast_ref::<RunnerError>() {
        Some(RunnerError::Config(_)) => CONFIG_ERROR,
        Some(RunnerError::Adapter(_) | RunnerError::HardwareSetup { .. }) => HARDWARE_ERROR,
        None => TESTS_FAILED,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{TestOutcome, TestStatus};
    use benchtop_core::TestKey;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_error_codes() {
        let config = anyhow::Error::new(ConfigError::NotFound {
            kind: benchtop_core::DocumentKind::Profile,
            name: "nightly".to_string(),
            path: PathBuf::from("config/test_registry/execution/nightly.yaml"),
            available: vec!["smoke".to_string()],
        });
        assert_eq!(for_error(&config), CONFIG_ERROR);

        let setup = anyhow::Error::new(RunnerError::HardwareSetup {
            platform: "ecu_platform_a".to_string(),
            message: "can: no such device".to_string(),
        });
        assert_eq!(for_error(&setup), HARDWARE_ERROR);

        let adapter = anyhow::Error::new(RunnerError::from(AdapterError::NotRegistered {
            interface: "lin".to_string(),
            available: "can, gpio, serial".to_string(),
        }));
        assert_eq!(for_error(&adapter), HARDWARE_ERROR);

        assert_eq!(for_error(&anyhow::anyhow!("broken pipe")), TESTS_FAILED);
    }

    fn outcome(name: &str, status: TestStatus) -> TestOutcome {
        TestOutcome {
            key: TestKey::new("can_bus", name),
            status,
            message: None,
            markers: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn test_result_codes() {
        assert_eq!(for_results(&RunResults::default()), PASSED);

        let mut results = RunResults {
            platform: "mock_platform".to_string(),
            outcomes: vec![
                outcome("test_can_initialization", TestStatus::Passed),
                outcome("test_can_filters", TestStatus::Skipped),
            ],
            ..RunResults::default()
        };
        assert_eq!(for_results(&results), PASSED);

        results
            .outcomes
            .push(outcome("test_can_send_receive", TestStatus::Failed));
        assert_eq!(for_results(&results), TESTS_FAILED);

        results.outcomes.pop();
        results
            .outcomes
            .push(outcome("test_can_bus_off", TestStatus::Error));
        assert_eq!(for_results(&results), TESTS_FAILED);
    }
}
