//! Test Metadata Resolver.
//!
//! Turns suites, globals, an optional profile, and command-line filters into
//! the ordered list of tests to run, each with fully merged metadata.
//!
//! Precedence for every field, highest first:
//!
//! 1. command-line override
//! 2. the winning inclusion's `overrides`
//! 3. the test's own declared value
//! 4. the suite default
//! 5. the profile timeout (timeout only)
//! 6. `defaults` from the globals document
//! 7. built-in fallback
//!
//! When several inclusions select the same `(suite, test)` the last one
//! wins and the test keeps the position where it first appeared.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{
    ExecutionProfile, GlobalDefaults, OverrideSet, PlatformSet, Priority, SuiteDefinition, TestSpec,
};
use crate::platform::PlatformConfig;

pub const FALLBACK_CATEGORY: &str = "regression";
pub const FALLBACK_PRIORITY: Priority = Priority::Medium;

/// Identity of a test: `(suite, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TestKey {
    pub suite: String,
    pub name: String,
}

impl TestKey {
    pub fn new(suite: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            suite: suite.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for TestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.suite, self.name)
    }
}

/// A field the resolver merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Category,
    Priority,
    Platforms,
    RequiresHardware,
    Timeout,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Category => "category",
            Field::Priority => "priority",
            Field::Platforms => "platforms",
            Field::RequiresHardware => "requires_hardware",
            Field::Timeout => "timeout",
        })
    }
}

/// The level a field's final value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum MetadataSource {
    Cli,
    /// Index into the profile's `include` list.
    Inclusion { index: usize },
    Test,
    SuiteDefault,
    Profile,
    Global,
    BuiltIn,
}

impl fmt::Display for MetadataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataSource::Cli => write!(f, "command line"),
            MetadataSource::Inclusion { index } => write!(f, "include[{index}]"),
            MetadataSource::Test => write!(f, "test"),
            MetadataSource::SuiteDefault => write!(f, "suite default"),
            MetadataSource::Profile => write!(f, "profile"),
            MetadataSource::Global => write!(f, "globals"),
            MetadataSource::BuiltIn => write!(f, "built-in"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub field: Field,
    pub source: MetadataSource,
}

/// Final metadata for one selected test.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedTest {
    #[serde(flatten)]
    pub key: TestKey,
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub platforms: PlatformSet,
    pub requires_hardware: bool,
    /// Seconds.
    pub timeout: Option<u64>,
    pub provenance: Vec<Provenance>,
}

impl ResolvedTest {
    pub fn suite(&self) -> &str {
        &self.key.suite
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout.map(Duration::from_secs)
    }

    pub fn source_of(&self, field: Field) -> Option<MetadataSource> {
        self.provenance
            .iter()
            .find(|p| p.field == field)
            .map(|p| p.source)
    }
}

/// Command-line selection filters plus the command-line override set.
///
/// The filters compare against effective (post-merge) values and combine
/// with AND semantics. An empty `names` list admits every name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliFilters {
    pub suite: Option<String>,
    pub category: Option<String>,
    pub priority: Option<Priority>,
    pub names: Vec<String>,
    pub overrides: OverrideSet,
}

impl CliFilters {
    pub fn with_suite(mut self, suite: impl Into<String>) -> Self {
        self.suite = Some(suite.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_overrides(mut self, overrides: OverrideSet) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn admits(&self, test: &ResolvedTest) -> bool {
        self.suite.as_deref().is_none_or(|suite| test.suite() == suite)
            && self
                .category
                .as_deref()
                .is_none_or(|category| test.category == category)
            && self.priority.is_none_or(|priority| test.priority == priority)
            && (self.names.is_empty() || self.names.iter().any(|name| name == test.name()))
    }
}

/// A field under merge: the value so far and where it came from.
struct Slot<T>(Option<(T, MetadataSource)>);

impl<T: Clone> Slot<T> {
    fn declared(value: Option<&T>) -> Self {
        Slot(value.map(|v| (v.clone(), MetadataSource::Test)))
    }

    /// Overwrites when `value` is set.
    fn set(&mut self, value: Option<&T>, source: MetadataSource) {
        if let Some(value) = value {
            self.0 = Some((value.clone(), source));
        }
    }

    /// Fills only when still unset.
    fn fill(&mut self, value: Option<&T>, source: MetadataSource) {
        if self.0.is_none() {
            self.set(value, source);
        }
    }

    fn finish(self, field: Field, provenance: &mut Vec<Provenance>) -> Option<T> {
        self.0.map(|(value, source)| {
            provenance.push(Provenance { field, source });
            value
        })
    }
}

/// One candidate test while its metadata is merged.
struct Working<'a> {
    suite: &'a SuiteDefinition,
    spec: &'a TestSpec,
    category: Slot<String>,
    priority: Slot<Priority>,
    platforms: Slot<PlatformSet>,
    requires_hardware: Slot<bool>,
    timeout: Slot<u64>,
}

impl<'a> Working<'a> {
    fn new(suite: &'a SuiteDefinition, spec: &'a TestSpec) -> Self {
        Self {
            suite,
            spec,
            category: Slot::declared(spec.category.as_ref()),
            priority: Slot::declared(spec.priority.as_ref()),
            platforms: Slot::declared(spec.platforms.as_ref()),
            requires_hardware: Slot::declared(spec.requires_hardware.as_ref()),
            timeout: Slot::declared(spec.timeout.as_ref()),
        }
    }

    fn key(&self) -> TestKey {
        TestKey::new(&self.suite.name, &self.spec.name)
    }

    fn apply(&mut self, overrides: &OverrideSet, source: MetadataSource) {
        self.category.set(overrides.category.as_ref(), source);
        self.priority.set(overrides.priority.as_ref(), source);
        self.platforms.set(overrides.platforms.as_ref(), source);
        self.requires_hardware
            .set(overrides.requires_hardware.as_ref(), source);
        self.timeout.set(overrides.timeout.as_ref(), source);
    }

    fn fill_defaults(&mut self, profile: Option<&ExecutionProfile>, globals: &GlobalDefaults) {
        let suite = self.suite;
        self.category
            .fill(suite.default_category.as_ref(), MetadataSource::SuiteDefault);
        self.priority
            .fill(suite.default_priority.as_ref(), MetadataSource::SuiteDefault);
        self.platforms
            .fill(suite.default_platforms.as_ref(), MetadataSource::SuiteDefault);

        if let Some(profile) = profile {
            self.timeout
                .fill(profile.timeout.as_ref(), MetadataSource::Profile);
        }

        let defaults = &globals.defaults;
        self.category
            .fill(defaults.category.as_ref(), MetadataSource::Global);
        self.priority
            .fill(defaults.priority.as_ref(), MetadataSource::Global);
        self.platforms
            .fill(defaults.platforms.as_ref(), MetadataSource::Global);
        self.requires_hardware
            .fill(defaults.requires_hardware.as_ref(), MetadataSource::Global);
        self.timeout
            .fill(defaults.timeout.as_ref(), MetadataSource::Global);

        self.category
            .fill(Some(&FALLBACK_CATEGORY.to_string()), MetadataSource::BuiltIn);
        self.priority
            .fill(Some(&FALLBACK_PRIORITY), MetadataSource::BuiltIn);
        self.platforms
            .fill(Some(&PlatformSet::All), MetadataSource::BuiltIn);
        self.requires_hardware
            .fill(Some(&false), MetadataSource::BuiltIn);
    }

    fn finish(self) -> ResolvedTest {
        let key = self.key();
        let mut provenance = Vec::with_capacity(5);
        let category = self
            .category
            .finish(Field::Category, &mut provenance)
            .unwrap_or_else(|| FALLBACK_CATEGORY.to_string());
        let priority = self
            .priority
            .finish(Field::Priority, &mut provenance)
            .unwrap_or(FALLBACK_PRIORITY);
        let platforms = self
            .platforms
            .finish(Field::Platforms, &mut provenance)
            .unwrap_or_default();
        let requires_hardware = self
            .requires_hardware
            .finish(Field::RequiresHardware, &mut provenance)
            .unwrap_or(false);
        let timeout = self.timeout.finish(Field::Timeout, &mut provenance);

        ResolvedTest {
            key,
            description: self.spec.description.clone(),
            category,
            priority,
            platforms,
            requires_hardware,
            timeout,
            provenance,
        }
    }
}

/// Adds a candidate, replacing an earlier selection of the same test in place.
fn upsert<'a>(
    order: &mut Vec<Working<'a>>,
    positions: &mut HashMap<TestKey, usize>,
    working: Working<'a>,
) {
    let key = working.key();
    if let Some(&at) = positions.get(&key) {
        debug!(test = %key, "later inclusion replaces earlier selection");
        order[at] = working;
    } else {
        positions.insert(key, order.len());
        order.push(working);
    }
}

/// Resolves the ordered test set for `platform`.
///
/// Without a profile every test of every suite is a candidate. With one,
/// only tests selected by its inclusions are. Tests whose platforms do not
/// admit `platform.name` or that fail a filter are dropped silently.
///
/// Unknown suites or test names are `DanglingReference` errors. The store
/// rejects them at load time already; the check here covers profiles built
/// in code.
pub fn resolve(
    platform: &PlatformConfig,
    profile: Option<&ExecutionProfile>,
    suites: &[SuiteDefinition],
    globals: &GlobalDefaults,
    filters: &CliFilters,
) -> ConfigResult<Vec<ResolvedTest>> {
    let by_name: HashMap<&str, &SuiteDefinition> =
        suites.iter().map(|suite| (suite.name.as_str(), suite)).collect();

    let unknown_suite = filters
        .suite
        .as_deref()
        .filter(|suite| !by_name.contains_key(suite));
    if let Some(suite) = unknown_suite {
        let mut known: Vec<&str> = by_name.keys().copied().collect();
        known.sort_unstable();
        return Err(ConfigError::dangling(
            PathBuf::from("<command line>"),
            "--suite",
            format!("unknown suite '{suite}' (known: {})", known.join(", ")),
        ));
    }

    let mut order: Vec<Working<'_>> = Vec::new();
    let mut positions: HashMap<TestKey, usize> = HashMap::new();
    match profile {
        None => {
            for suite in suites {
                for spec in &suite.tests {
                    upsert(&mut order, &mut positions, Working::new(suite, spec));
                }
            }
        }
        Some(profile) => {
            for (index, inclusion) in profile.include.iter().enumerate() {
                let field = format!("include[{index}]");
                let suite = by_name.get(inclusion.suite.as_str()).copied().ok_or_else(|| {
                    ConfigError::dangling(
                        &profile.source,
                        format!("{field}.suite"),
                        format!("unknown suite '{}'", inclusion.suite),
                    )
                })?;

                let specs: Vec<&TestSpec> = match &inclusion.tests {
                    None => suite.tests.iter().collect(),
                    Some(names) => names
                        .iter()
                        .enumerate()
                        .map(|(j, name)| {
                            suite.test(name).ok_or_else(|| {
                                ConfigError::dangling(
                                    &profile.source,
                                    format!("{field}.tests[{j}]"),
                                    format!("suite '{}' has no test '{name}'", suite.name),
                                )
                            })
                        })
                        .collect::<ConfigResult<_>>()?,
                };

                for spec in specs {
                    let mut working = Working::new(suite, spec);
                    working.apply(&inclusion.overrides, MetadataSource::Inclusion { index });
                    upsert(&mut order, &mut positions, working);
                }
            }
        }
    }

    let resolved = order
        .into_iter()
        .map(|mut working| {
            working.apply(&filters.overrides, MetadataSource::Cli);
            working.fill_defaults(profile, globals);
            working.finish()
        })
        .filter(|test| {
            let admitted = test.platforms.admits(&platform.name);
            if !admitted {
                debug!(test = %test.key, platforms = %test.platforms, "excluded by platform");
            }
            admitted
        })
        .filter(|test| filters.admits(test))
        .collect();

    Ok(resolved)
}
