//! Reading and parsing individual YAML documents.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_yaml::Value;

use crate::error::{ConfigError, ConfigResult};

pub(crate) fn read(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Parses `text` as `T`.
///
/// Returns `Ok(None)` for an empty document. YAML syntax errors become
/// `MalformedDocument`; well-formed YAML that does not fit `T` becomes a
/// `SchemaViolation` carrying the field path serde reports.
pub(crate) fn parse<T: DeserializeOwned>(path: &Path, text: &str) -> ConfigResult<Option<T>> {
    let value: Value =
        serde_yaml::from_str(text).map_err(|source| ConfigError::MalformedDocument {
            path: path.to_path_buf(),
            source,
        })?;
    if value.is_null() {
        return Ok(None);
    }
    serde_yaml::from_str(text)
        .map(Some)
        .map_err(|err| schema_error(path, None, &err))
}

/// Deserializes one section of an already-parsed document.
pub(crate) fn from_section<T: DeserializeOwned>(
    path: &Path,
    section: &str,
    value: Value,
) -> ConfigResult<T> {
    serde_yaml::from_value(value).map_err(|err| schema_error(path, Some(section), &err))
}

pub(crate) fn load<T: DeserializeOwned>(path: &Path) -> ConfigResult<Option<T>> {
    let text = read(path)?;
    parse(path, &text)
}

/// Writes `value` as YAML to `path`, creating missing parent directories.
pub(crate) fn save<T: Serialize>(path: &Path, value: &T) -> ConfigResult<()> {
    let text = serde_yaml::to_string(value).map_err(|source| ConfigError::MalformedDocument {
        path: path.to_path_buf(),
        source,
    })?;
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    fs::write(path, text).map_err(io_err)
}

fn schema_error(path: &Path, section: Option<&str>, err: &serde_yaml::Error) -> ConfigError {
    let message = err.to_string();
    let field = match (section, field_path(&message)) {
        (Some(section), Some(inner)) => format!("{section}.{inner}"),
        (Some(section), None) => section.to_string(),
        (None, Some(inner)) => inner.to_string(),
        (None, None) => "<document>".to_string(),
    };
    ConfigError::schema(path, field, message)
}

/// Extracts the leading `a.b[0].c` path serde_yaml prefixes its messages with.
fn field_path(message: &str) -> Option<&str> {
    let (head, _) = message.split_once(": ")?;
    (!head.is_empty() && !head.contains(char::is_whitespace)).then_some(head)
}

/// `*.yaml` / `*.yml` files directly inside `dir`, sorted by file name.
/// A missing directory yields no files.
pub(crate) fn yaml_files(dir: &Path) -> ConfigResult<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let io_err = |source| ConfigError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if is_yaml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

pub(crate) fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
