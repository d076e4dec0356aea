//! Execution Planner.
//!
//! Turns a run request into an [`ExecutionPlan`]: the platform, the resolved
//! tests, the environment overlay handed to test code, and the annotations
//! each test carries. Nothing here knows about a particular test engine.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::ConfigResult;
use crate::model::{PlatformSet, Priority, ProfileSummary};
use crate::platform::PlatformConfig;
use crate::resolver::{self, CliFilters, ResolvedTest, TestKey};
use crate::store::{ConfigStore, check_overrides};

/// Platform used when neither the command line nor the environment names one.
pub const DEFAULT_PLATFORM: &str = "mock_platform";

/// Environment selector naming the active platform.
pub const PLATFORM_ENV: &str = "HARDWARE_PLATFORM";
pub const PROFILE_ENV: &str = "BENCHTOP_EXECUTION_PROFILE";
pub const SELECTED_TESTS_ENV: &str = "BENCHTOP_SELECTED_TESTS";

/// Where the active platform name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformSource {
    Cli,
    Environment,
    Default,
}

/// A request to plan one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanRequest {
    pub platform: Option<String>,
    pub profile: Option<String>,
    pub filters: CliFilters,
}

/// Engine-neutral metadata attached to a test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Annotation {
    Category(String),
    Suite(String),
    Priority(Priority),
    Platform(String),
    AllPlatforms,
    RequiresHardware,
    /// Seconds.
    Timeout(u64),
}

impl Annotation {
    /// The annotations implied by a resolved test's metadata.
    pub fn for_test(test: &ResolvedTest) -> Vec<Annotation> {
        let mut annotations = vec![
            Annotation::Category(test.category.clone()),
            Annotation::Suite(test.suite().to_string()),
            Annotation::Priority(test.priority),
        ];
        match &test.platforms {
            PlatformSet::All => annotations.push(Annotation::AllPlatforms),
            PlatformSet::Only(names) => {
                annotations.extend(names.iter().cloned().map(Annotation::Platform));
            }
        }
        if test.requires_hardware {
            annotations.push(Annotation::RequiresHardware);
        }
        if let Some(seconds) = test.timeout {
            annotations.push(Annotation::Timeout(seconds));
        }
        annotations
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestAnnotations {
    #[serde(flatten)]
    pub key: TestKey,
    pub annotations: Vec<Annotation>,
}

/// Everything a runner needs to execute one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPlan {
    pub platform: PlatformConfig,
    pub platform_source: PlatformSource,
    pub profile: Option<ProfileSummary>,
    pub resolved_tests: Vec<ResolvedTest>,
    pub environment_overlay: BTreeMap<String, String>,
    pub per_test_annotations: Vec<TestAnnotations>,
}

impl ExecutionPlan {
    pub fn is_empty(&self) -> bool {
        self.resolved_tests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resolved_tests.len()
    }

    pub fn test(&self, suite: &str, name: &str) -> Option<&ResolvedTest> {
        self.resolved_tests
            .iter()
            .find(|test| test.suite() == suite && test.name() == name)
    }

    pub fn annotations_for(&self, key: &TestKey) -> Option<&[Annotation]> {
        self.per_test_annotations
            .iter()
            .find(|entry| &entry.key == key)
            .map(|entry| entry.annotations.as_slice())
    }

    /// Narrows the plan to the tests `keep` accepts. Annotations and the
    /// selected-tests overlay entry follow.
    pub fn retain(&mut self, mut keep: impl FnMut(&ResolvedTest) -> bool) {
        self.resolved_tests.retain(|test| keep(test));
        self.per_test_annotations
            .retain(|entry| self.resolved_tests.iter().any(|test| test.key == entry.key));
        self.environment_overlay.insert(
            SELECTED_TESTS_ENV.to_string(),
            selected_tests(&self.resolved_tests),
        );
    }
}

/// `suite::name` keys joined with commas.
fn selected_tests(tests: &[ResolvedTest]) -> String {
    tests
        .iter()
        .map(|test| test.key.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Plans runs against one config store.
///
/// The platform selector from the environment is captured once, when the
/// planner is built.
#[derive(Debug)]
pub struct ExecutionPlanner<'a> {
    store: &'a ConfigStore,
    env_platform: Option<String>,
}

impl<'a> ExecutionPlanner<'a> {
    /// A planner that ignores the environment.
    pub fn new(store: &'a ConfigStore) -> Self {
        Self {
            store,
            env_platform: None,
        }
    }

    /// A planner that reads the platform selector from the process environment.
    pub fn from_env(store: &'a ConfigStore) -> Self {
        Self::new(store).with_env_platform(std::env::var(PLATFORM_ENV).ok())
    }

    pub fn with_env_platform(mut self, platform: Option<String>) -> Self {
        self.env_platform = platform.filter(|name| !name.trim().is_empty());
        self
    }

    /// Picks the platform name: command line, then environment, then default.
    pub fn select_platform(&self, cli: Option<&str>) -> (String, PlatformSource) {
        if let Some(name) = cli {
            (name.to_string(), PlatformSource::Cli)
        } else if let Some(name) = &self.env_platform {
            (name.clone(), PlatformSource::Environment)
        } else {
            (DEFAULT_PLATFORM.to_string(), PlatformSource::Default)
        }
    }

    pub fn plan(&self, request: &PlanRequest) -> ConfigResult<ExecutionPlan> {
        let (platform_name, platform_source) = self.select_platform(request.platform.as_deref());
        info!(platform = %platform_name, source = ?platform_source, "selected platform");
        let platform = self.store.load_platform(&platform_name)?;

        let registry = self.store.registry();
        check_overrides(
            Path::new("<command line>"),
            "",
            &request.filters.overrides,
            &registry.globals.validation,
        )?;

        let profile = request
            .profile
            .as_deref()
            .map(|name| self.store.load_profile(name))
            .transpose()?;

        let resolved_tests = resolver::resolve(
            &platform,
            profile.as_ref(),
            &registry.suites,
            &registry.globals,
            &request.filters,
        )?;
        info!(
            tests = resolved_tests.len(),
            profile = profile.as_ref().map_or("<none>", |p| p.name.as_str()),
            "resolved test set"
        );

        let mut environment_overlay = BTreeMap::new();
        environment_overlay.insert(PLATFORM_ENV.to_string(), platform.name.clone());
        if let Some(profile) = &profile {
            environment_overlay.insert(PROFILE_ENV.to_string(), profile.name.clone());
        }
        environment_overlay.insert(
            SELECTED_TESTS_ENV.to_string(),
            selected_tests(&resolved_tests),
        );

        let per_test_annotations = resolved_tests
            .iter()
            .map(|test| TestAnnotations {
                key: test.key.clone(),
                annotations: Annotation::for_test(test),
            })
            .collect();

        Ok(ExecutionPlan {
            platform,
            platform_source,
            profile: profile.as_ref().map(crate::model::ExecutionProfile::summary),
            resolved_tests,
            environment_overlay,
            per_test_annotations,
        })
    }
}
