//! Tagged result type for hardware operations.
//!
//! Expected operational failures (device busy, timeout, malformed response)
//! travel as data in an `OperationResult` instead of as `Err`. The calling
//! test decides whether such a failure fails the test.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of a single adapter operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,

    /// Optional payload (bytes written, frame received, pin state, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Free-text log produced while performing the operation.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log: String,
}

impl OperationResult {
    /// A successful result with no payload.
    pub fn ok() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// A successful result carrying a payload.
    pub fn ok_with(data: impl Into<Value>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            ..Self::default()
        }
    }

    /// A failed result with an error message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = log.into();
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Returns the error message, or an empty string for successful results.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }

    /// Converts into a `Result`, keeping the payload on success and the
    /// error message on failure.
    pub fn into_result(self) -> Result<Option<Value>, String> {
        if self.success {
            Ok(self.data)
        } else {
            Err(self
                .error
                .unwrap_or_else(|| "operation failed without an error message".to_string()))
        }
    }

    /// Folds named per-item results into one aggregate result.
    ///
    /// The aggregate succeeds only when every item succeeded. Errors are
    /// joined as `name: error; name: error`, logs one per line.
    pub fn aggregate<I, S>(results: I) -> Self
    where
        I: IntoIterator<Item = (S, OperationResult)>,
        S: AsRef<str>,
    {
        let mut success = true;
        let mut errors = Vec::new();
        let mut logs = Vec::new();

        for (name, result) in results {
            let name = name.as_ref();
            if !result.success {
                success = false;
                errors.push(format!("{}: {}", name, result.error_message()));
            }
            if !result.log.is_empty() {
                logs.push(format!("{}: {}", name, result.log));
            }
        }

        Self {
            success,
            data: None,
            error: (!errors.is_empty()).then(|| errors.join("; ")),
            log: logs.join("\n"),
        }
    }
}

impl From<OperationResult> for bool {
    fn from(result: OperationResult) -> Self {
        result.success
    }
}
