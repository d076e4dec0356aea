use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The kind of configuration document a lookup was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Platform,
    Suite,
    Profile,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Platform => write!(f, "platform"),
            DocumentKind::Suite => write!(f, "suite"),
            DocumentKind::Profile => write!(f, "execution profile"),
        }
    }
}

/// Errors raised while loading, validating, or resolving configuration.
///
/// All variants are fatal and surface before any test runs. Each names the
/// offending file and, where it applies, a dotted field path such as
/// `include[0].tests[1]`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{kind} '{name}' not found at {}{}", .path.display(), available_hint(.available))]
    NotFound {
        kind: DocumentKind,
        name: String,
        path: PathBuf,
        available: Vec<String>,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not well-formed YAML.
    #[error("malformed document {}: {source}", .path.display())]
    MalformedDocument {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Well-formed YAML whose shape or values break the schema.
    #[error("schema violation in {} at `{field}`: {message}", .path.display())]
    SchemaViolation {
        path: PathBuf,
        field: String,
        message: String,
    },

    /// A reference to a suite or test that does not exist.
    #[error("dangling reference in {} at `{field}`: {message}", .path.display())]
    DanglingReference {
        path: PathBuf,
        field: String,
        message: String,
    },

    /// The registry is not in a layout the migration accepts.
    #[error("cannot migrate {}: {reason}", .path.display())]
    NotMigratable { path: PathBuf, reason: String },
}

impl ConfigError {
    pub(crate) fn schema(
        path: impl Into<PathBuf>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ConfigError::SchemaViolation {
            path: path.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn dangling(
        path: impl Into<PathBuf>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ConfigError::DanglingReference {
            path: path.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// The file the error is about.
    pub fn path(&self) -> &std::path::Path {
        match self {
            ConfigError::NotFound { path, .. }
            | ConfigError::Io { path, .. }
            | ConfigError::MalformedDocument { path, .. }
            | ConfigError::SchemaViolation { path, .. }
            | ConfigError::DanglingReference { path, .. }
            | ConfigError::NotMigratable { path, .. } => path,
        }
    }
}

fn available_hint(available: &[String]) -> String {
    if available.is_empty() {
        String::new()
    } else {
        format!(" (available: {})", available.join(", "))
    }
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_lists_available_names() {
        let err = ConfigError::NotFound {
            kind: DocumentKind::Profile,
            name: "weekly".to_string(),
            path: PathBuf::from("config/test_registry/execution/weekly.yaml"),
            available: vec!["nightly".to_string(), "smoke".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "execution profile 'weekly' not found at config/test_registry/execution/weekly.yaml (available: nightly, smoke)"
        );
    }

    #[test]
    fn test_schema_violation_names_file_and_field() {
        let err = ConfigError::schema("suites/can_bus.yaml", "tests[1].name", "duplicate test name");
        assert_eq!(
            err.to_string(),
            "schema violation in suites/can_bus.yaml at `tests[1].name`: duplicate test name"
        );
        assert_eq!(err.path(), std::path::Path::new("suites/can_bus.yaml"));
    }
}
