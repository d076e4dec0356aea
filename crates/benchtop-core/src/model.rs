//! Test metadata entities shared by both registry layouts.
//!
//! Everything here is immutable once loaded. Optional fields on `TestSpec`
//! and `OverrideSet` are `None` when the document does not set them; the
//! resolver fills them from lower-precedence levels.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Test priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [
        Priority::Critical,
        Priority::High,
        Priority::Medium,
        Priority::Low,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    /// Report severity used when the globals catalog does not name one.
    pub fn default_severity(self) -> &'static str {
        match self {
            Priority::Critical => "blocker",
            Priority::High => "critical",
            Priority::Medium => "normal",
            Priority::Low => "minor",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown priority '{s}' (expected one of: critical, high, medium, low)")
            })
    }
}

/// The platforms a test applies to: every platform, or a concrete list.
///
/// In documents this is a list of names where the sentinel `all` anywhere
/// in the list means every platform. A bare string is accepted as a
/// one-element list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PlatformSet {
    #[default]
    All,
    Only(Vec<String>),
}

impl PlatformSet {
    pub const ALL_SENTINEL: &'static str = "all";

    /// Builds a set from names, collapsing to `All` when the sentinel is
    /// present and dropping duplicates while keeping first-seen order.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            let name = name.trim();
            if name.eq_ignore_ascii_case(Self::ALL_SENTINEL) {
                return PlatformSet::All;
            }
            if !out.iter().any(|existing| existing == name) {
                out.push(name.to_string());
            }
        }
        PlatformSet::Only(out)
    }

    pub fn only(name: impl Into<String>) -> Self {
        PlatformSet::Only(vec![name.into()])
    }

    /// True for the sentinel or when `platform` is listed.
    pub fn admits(&self, platform: &str) -> bool {
        match self {
            PlatformSet::All => true,
            PlatformSet::Only(names) => names.iter().any(|name| name == platform),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, PlatformSet::All)
    }

    /// An explicit empty list. Rejected by validation.
    pub fn is_empty(&self) -> bool {
        matches!(self, PlatformSet::Only(names) if names.is_empty())
    }

    pub fn names(&self) -> Vec<&str> {
        match self {
            PlatformSet::All => vec![Self::ALL_SENTINEL],
            PlatformSet::Only(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

impl fmt::Display for PlatformSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.names().join(", "))
    }
}

impl Serialize for PlatformSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.names())
    }
}

impl<'de> Deserialize<'de> for PlatformSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::One(name) => PlatformSet::from_names([name]),
            Repr::Many(names) => PlatformSet::from_names(names),
        })
    }
}

/// One test's declared metadata.
///
/// `name` must match a test implementation known to the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestSpec {
    pub name: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<PlatformSet>,

    #[serde(
        default,
        alias = "requirements_hardware",
        skip_serializing_if = "Option::is_none"
    )]
    pub requires_hardware: Option<bool>,

    /// Timeout in seconds.
    #[serde(default, alias = "max_duration", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl TestSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            category: None,
            priority: None,
            platforms: None,
            requires_hardware: None,
            timeout: None,
        }
    }
}

/// A partial `TestSpec` applied by an inclusion or from the command line.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideSet {
    #[serde(default, alias = "max_duration", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<PlatformSet>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    #[serde(
        default,
        alias = "requirements_hardware",
        skip_serializing_if = "Option::is_none"
    )]
    pub requires_hardware: Option<bool>,
}

impl OverrideSet {
    pub fn is_empty(&self) -> bool {
        self == &OverrideSet::default()
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_platforms(mut self, platforms: PlatformSet) -> Self {
        self.platforms = Some(platforms);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_requires_hardware(mut self, requires: bool) -> Self {
        self.requires_hardware = Some(requires);
        self
    }
}

/// A named group of tests with suite-level defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteDefinition {
    pub name: String,
    pub description: String,
    pub default_platforms: Option<PlatformSet>,
    pub default_category: Option<String>,
    pub default_priority: Option<Priority>,
    pub tests: Vec<TestSpec>,
    /// The document the suite was read from.
    pub source: PathBuf,
}

impl SuiteDefinition {
    pub fn test(&self, name: &str) -> Option<&TestSpec> {
        self.tests.iter().find(|test| test.name == name)
    }

    pub fn summary(&self) -> SuiteSummary {
        SuiteSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            tests: self.tests.len(),
        }
    }
}

/// One suite reference inside a profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Inclusion {
    pub suite: String,

    /// Subset of test names; `None` selects the whole suite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "OverrideSet::is_empty")]
    pub overrides: OverrideSet,
}

impl Inclusion {
    pub fn suite(name: impl Into<String>) -> Self {
        Self {
            suite: name.into(),
            tests: None,
            overrides: OverrideSet::default(),
        }
    }

    pub fn with_tests<I, S>(mut self, tests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tests = Some(tests.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_overrides(mut self, overrides: OverrideSet) -> Self {
        self.overrides = overrides;
        self
    }
}

/// A named scenario selecting and overriding suites.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionProfile {
    pub name: String,
    pub description: String,
    /// Profile-level timeout in seconds.
    pub timeout: Option<u64>,
    pub include: Vec<Inclusion>,
    pub source: PathBuf,
}

impl ExecutionProfile {
    pub fn summary(&self) -> ProfileSummary {
        ProfileSummary {
            name: self.name.clone(),
            description: self.description.clone(),
            timeout: self.timeout,
            inclusions: self.include.len(),
        }
    }
}

/// Listing entry for `--list-profiles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub name: String,
    pub description: String,
    pub timeout: Option<u64>,
    pub inclusions: usize,
}

/// Listing entry for `--list-suites`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuiteSummary {
    pub name: String,
    pub description: String,
    pub tests: usize,
}

/// Lowest-precedence values for fields no other level sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldDefaults {
    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub priority: Option<Priority>,

    #[serde(default)]
    pub platforms: Option<PlatformSet>,

    #[serde(default, alias = "requirements_hardware")]
    pub requires_hardware: Option<bool>,

    #[serde(default, alias = "max_duration")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryInfo {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub execution_order: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorityInfo {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity_level: Option<String>,
}

/// Optional restrictions on the open category and priority sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default)]
    pub valid_categories: Option<Vec<String>>,
    #[serde(default)]
    pub valid_priorities: Option<Vec<Priority>>,
}

impl ValidationRules {
    pub fn allows_category(&self, category: &str) -> bool {
        self.valid_categories
            .as_ref()
            .is_none_or(|valid| valid.iter().any(|c| c == category))
    }

    pub fn allows_priority(&self, priority: Priority) -> bool {
        self.valid_priorities
            .as_ref()
            .is_none_or(|valid| valid.contains(&priority))
    }
}

/// The globals document: fallback values plus the category/priority catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalDefaults {
    #[serde(default)]
    pub defaults: FieldDefaults,

    #[serde(default)]
    pub categories: BTreeMap<String, CategoryInfo>,

    #[serde(default)]
    pub priorities: BTreeMap<Priority, PriorityInfo>,

    #[serde(default)]
    pub validation: ValidationRules,
}

impl GlobalDefaults {
    /// Report severity for a priority, preferring the catalog's value.
    pub fn severity(&self, priority: Priority) -> &str {
        self.priorities
            .get(&priority)
            .and_then(|info| info.severity_level.as_deref())
            .unwrap_or_else(|| priority.default_severity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_set_collapses_sentinel() {
        assert_eq!(
            PlatformSet::from_names(["ecu_platform_a", "all"]),
            PlatformSet::All
        );
        assert_eq!(
            PlatformSet::from_names(["a", "b", "a"]),
            PlatformSet::Only(vec!["a".to_string(), "b".to_string()])
        );
        assert!(PlatformSet::from_names(Vec::<String>::new()).is_empty());
    }

    #[test]
    fn test_platform_set_admits() {
        assert!(PlatformSet::All.admits("ecu_platform_b"));
        let only_a = PlatformSet::only("ecu_platform_a");
        assert!(only_a.admits("ecu_platform_a"));
        assert!(!only_a.admits("ecu_platform_b"));
    }

    #[test]
    fn test_platform_set_accepts_bare_string() {
        let set: PlatformSet = serde_yaml::from_str("mock_platform").unwrap();
        assert_eq!(set, PlatformSet::only("mock_platform"));
        let set: PlatformSet = serde_yaml::from_str("[all]").unwrap();
        assert!(set.is_all());
    }

    #[test]
    fn test_test_spec_aliases() {
        let spec: TestSpec = serde_yaml::from_str(
            "name: test_can_loopback\nrequirements_hardware: true\nmax_duration: 30\n",
        )
        .unwrap();
        assert_eq!(spec.requires_hardware, Some(true));
        assert_eq!(spec.timeout, Some(30));
        assert_eq!(spec.category, None);
    }

    #[test]
    fn test_priority_parse_and_severity() {
        assert_eq!("HIGH".parse::<Priority>(), Ok(Priority::High));
        assert!("urgent".parse::<Priority>().is_err());

        let mut globals = GlobalDefaults::default();
        assert_eq!(globals.severity(Priority::Critical), "blocker");
        globals.priorities.insert(
            Priority::Low,
            PriorityInfo {
                description: String::new(),
                severity_level: Some("trivial".to_string()),
            },
        );
        assert_eq!(globals.severity(Priority::Low), "trivial");
    }

    #[test]
    fn test_validation_rules_open_by_default() {
        let rules = ValidationRules::default();
        assert!(rules.allows_category("anything"));

        let rules = ValidationRules {
            valid_categories: Some(vec!["smoke".to_string()]),
            valid_priorities: Some(vec![Priority::High]),
        };
        assert!(rules.allows_category("smoke"));
        assert!(!rules.allows_category("soak"));
        assert!(!rules.allows_priority(Priority::Low));
    }
}
