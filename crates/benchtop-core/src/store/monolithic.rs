//! The monolithic layout: everything in one `test_registry.yaml`.

use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};

use super::TestRegistry;
use super::document::{from_section, load};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    ExecutionProfile, GlobalDefaults, Inclusion, PlatformSet, Priority, SuiteDefinition, TestSpec,
};

#[derive(Deserialize)]
struct RegistryDocument {
    #[serde(flatten)]
    globals: GlobalDefaults,
    #[serde(default)]
    test_suites: Mapping,
    #[serde(default)]
    execution_profiles: Mapping,
}

#[derive(Deserialize)]
struct SuiteEntry {
    #[serde(default)]
    description: String,
    #[serde(default, alias = "default_platforms")]
    platforms: Option<PlatformSet>,
    #[serde(default, alias = "default_category")]
    category: Option<String>,
    #[serde(default, alias = "default_priority")]
    priority: Option<Priority>,
    #[serde(default)]
    tests: Vec<TestSpec>,
}

#[derive(Deserialize)]
struct ProfileEntry {
    #[serde(default)]
    description: String,
    #[serde(default, alias = "max_duration")]
    timeout: Option<u64>,
    #[serde(default)]
    include: Vec<Inclusion>,
}

pub(super) fn load_registry(file: &Path) -> ConfigResult<TestRegistry> {
    let Some(doc) = load::<RegistryDocument>(file)? else {
        return Ok(TestRegistry::new(
            GlobalDefaults::default(),
            file.to_path_buf(),
            Vec::new(),
            Vec::new(),
        ));
    };

    let suites = entries::<SuiteEntry>(file, "test_suites", doc.test_suites)?
        .into_iter()
        .map(|(name, entry)| SuiteDefinition {
            name,
            description: entry.description,
            default_platforms: entry.platforms,
            default_category: entry.category,
            default_priority: entry.priority,
            tests: entry.tests,
            source: file.to_path_buf(),
        })
        .collect();

    let profiles = entries::<ProfileEntry>(file, "execution_profiles", doc.execution_profiles)?
        .into_iter()
        .map(|(name, entry)| ExecutionProfile {
            name,
            description: entry.description,
            timeout: entry.timeout,
            include: entry.include,
            source: file.to_path_buf(),
        })
        .collect();

    Ok(TestRegistry::new(doc.globals, file.to_path_buf(), suites, profiles))
}

/// Deserializes each value of a name-keyed section.
fn entries<T: DeserializeOwned>(
    file: &Path,
    section: &str,
    map: Mapping,
) -> ConfigResult<Vec<(String, T)>> {
    map.into_iter()
        .map(|(key, value)| {
            let name = match key {
                Value::String(name) => name,
                other => {
                    return Err(ConfigError::schema(
                        file,
                        section,
                        format!("entry names must be strings, found {other:?}"),
                    ));
                }
            };
            // A bare `name:` with no body is an empty entry.
            let value = if value.is_null() {
                Value::Mapping(Mapping::new())
            } else {
                value
            };
            let entry = from_section(file, &format!("{section}.{name}"), value)?;
            Ok((name, entry))
        })
        .collect()
}
