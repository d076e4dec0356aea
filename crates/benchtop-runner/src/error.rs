use benchtop_core::ConfigError;
use benchtop_proto::AdapterError;
use thiserror::Error;

/// Errors that abort a run before or while the session hardware is set up.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Configuration could not be loaded or resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An adapter could not be constructed for the platform.
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// Every adapter was constructed but at least one failed to initialize.
    #[error("hardware setup failed on platform '{platform}': {message}")]
    HardwareSetup { platform: String, message: String },
}

/// Why a test body did not pass.
#[derive(Debug, Error)]
pub enum TestFailure {
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// An adapter reported an operational failure the test does not tolerate.
    #[error("{operation} failed: {error}")]
    Operation { operation: String, error: String },

    /// The test decided it cannot run here. Reported as skipped, not failed.
    #[error("{0}")]
    Skipped(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

impl TestFailure {
    pub fn skip(reason: impl Into<String>) -> Self {
        TestFailure::Skipped(reason.into())
    }
}

pub type TestResult = Result<(), TestFailure>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_config_error_is_transparent() {
        let err = RunnerError::from(ConfigError::SchemaViolation {
            path: PathBuf::from("suites/can_bus.yaml"),
            field: "tests[0].priority".to_string(),
            message: "unknown priority".to_string(),
        });
        assert!(err.to_string().contains("tests[0].priority"));
    }

    #[test]
    fn test_operation_failure_message() {
        let failure = TestFailure::Operation {
            operation: "CAN send".to_string(),
            error: "Mock CAN not initialized".to_string(),
        };
        assert_eq!(failure.to_string(), "CAN send failed: Mock CAN not initialized");
    }
}
