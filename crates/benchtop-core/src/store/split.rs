//! The split layout: one globals file, one file per suite, one per profile.
//!
//! Suite and profile names are the file stems.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::TestRegistry;
use super::document::{load, save, stem, yaml_files};
use super::layout::{GLOBALS_FILE, PROFILES_DIR, SUITES_DIR};
use crate::error::ConfigResult;
use crate::model::{
    ExecutionProfile, GlobalDefaults, Inclusion, PlatformSet, Priority, SuiteDefinition, TestSpec,
};

#[derive(Serialize, Deserialize)]
struct SuiteDocument {
    #[serde(default)]
    suite_info: SuiteInfo,
    #[serde(default)]
    tests: Vec<TestSpec>,
}

#[derive(Default, Serialize, Deserialize)]
struct SuiteInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_platforms: Option<PlatformSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_priority: Option<Priority>,
}

#[derive(Serialize, Deserialize)]
struct ProfileDocument {
    #[serde(default)]
    execution_profile: ProfileInfo,
    #[serde(default)]
    include: Vec<Inclusion>,
}

#[derive(Default, Serialize, Deserialize)]
struct ProfileInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    description: String,
    #[serde(default, alias = "max_duration", skip_serializing_if = "Option::is_none")]
    timeout: Option<u64>,
}

pub(super) fn load_registry(dir: &Path) -> ConfigResult<TestRegistry> {
    let globals_path = dir.join(GLOBALS_FILE);
    let globals = if globals_path.is_file() {
        load::<GlobalDefaults>(&globals_path)?.unwrap_or_default()
    } else {
        debug!(path = %globals_path.display(), "no globals file");
        GlobalDefaults::default()
    };

    let mut suites = Vec::new();
    for path in yaml_files(&dir.join(SUITES_DIR))? {
        let name = stem(&path);
        let Some(doc) = load::<SuiteDocument>(&path)? else {
            warn!(path = %path.display(), "skipping empty suite file");
            continue;
        };
        warn_on_name_mismatch("suite", &name, doc.suite_info.name.as_deref());
        suites.push(SuiteDefinition {
            name,
            description: doc.suite_info.description,
            default_platforms: doc.suite_info.default_platforms,
            default_category: doc.suite_info.default_category,
            default_priority: doc.suite_info.default_priority,
            tests: doc.tests,
            source: path,
        });
    }

    let mut profiles = Vec::new();
    for path in yaml_files(&dir.join(PROFILES_DIR))? {
        let name = stem(&path);
        let Some(doc) = load::<ProfileDocument>(&path)? else {
            warn!(path = %path.display(), "skipping empty execution profile");
            continue;
        };
        warn_on_name_mismatch("profile", &name, doc.execution_profile.name.as_deref());
        profiles.push(ExecutionProfile {
            name,
            description: doc.execution_profile.description,
            timeout: doc.execution_profile.timeout,
            include: doc.include,
            source: path,
        });
    }

    Ok(TestRegistry::new(globals, globals_path, suites, profiles))
}

/// Writes `registry` as a split layout rooted at `dir`: the globals file,
/// then one document per suite and per profile, named after it.
pub(super) fn write_registry(registry: &TestRegistry, dir: &Path) -> ConfigResult<()> {
    save(&dir.join(GLOBALS_FILE), &registry.globals)?;

    for suite in &registry.suites {
        let doc = SuiteDocument {
            suite_info: SuiteInfo {
                name: Some(suite.name.clone()),
                description: suite.description.clone(),
                default_platforms: suite.default_platforms.clone(),
                default_category: suite.default_category.clone(),
                default_priority: suite.default_priority,
            },
            tests: suite.tests.clone(),
        };
        let path = dir.join(SUITES_DIR).join(format!("{}.yaml", suite.name));
        save(&path, &doc)?;
        debug!(path = %path.display(), tests = suite.tests.len(), "wrote suite");
    }

    for profile in &registry.profiles {
        let doc = ProfileDocument {
            execution_profile: ProfileInfo {
                name: Some(profile.name.clone()),
                description: profile.description.clone(),
                timeout: profile.timeout,
            },
            include: profile.include.clone(),
        };
        let path = dir.join(PROFILES_DIR).join(format!("{}.yaml", profile.name));
        save(&path, &doc)?;
        debug!(path = %path.display(), inclusions = profile.include.len(), "wrote profile");
    }
    Ok(())
}

fn warn_on_name_mismatch(kind: &str, stem: &str, declared: Option<&str>) {
    if let Some(declared) = declared.filter(|declared| *declared != stem) {
        warn!(kind, file = stem, declared, "declared name differs from file name; using file name");
    }
}
