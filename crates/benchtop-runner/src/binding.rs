//! Binds an [`ExecutionPlan`] to the registered test implementations.
//!
//! This is the only place that speaks the engine's marker vocabulary. Plan
//! annotations become markers, registered tests the plan did not select are
//! collected as excluded, and planned tests without an implementation are
//! collected as unimplemented so the run reports them instead of dropping
//! them.

use std::collections::HashSet;
use std::fmt;

use benchtop_core::{Annotation, ExecutionPlan, ResolvedTest, TestKey};
use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::case::HardwareTest;

/// Reason shown for registered tests the plan did not select.
pub const EXCLUDED_REASON: &str = "excluded by selection";

/// A marker attached to a collected test.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Marker {
    /// A plain tag such as `smoke`, `can_bus`, `platform_mock_platform`.
    Tag(String),
    /// Wall-clock limit in seconds.
    Timeout(u64),
}

impl Marker {
    pub fn tag(name: impl Into<String>) -> Self {
        Marker::Tag(name.into())
    }

    pub fn is_tag(&self, name: &str) -> bool {
        matches!(self, Marker::Tag(tag) if tag == name)
    }

    pub fn from_annotation(annotation: &Annotation) -> Self {
        match annotation {
            Annotation::Category(category) => Marker::tag(category),
            Annotation::Suite(suite) => Marker::tag(suite),
            Annotation::Priority(priority) => Marker::tag(priority.as_str()),
            Annotation::Platform(platform) => Marker::Tag(format!("platform_{platform}")),
            Annotation::AllPlatforms => Marker::tag("all_platforms"),
            Annotation::RequiresHardware => Marker::tag("requires_hardware"),
            Annotation::Timeout(seconds) => Marker::Timeout(*seconds),
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Marker::Tag(tag) => f.write_str(tag),
            Marker::Timeout(seconds) => write!(f, "timeout({seconds})"),
        }
    }
}

impl Serialize for Marker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One entry of a collection.
pub enum Collected<'a> {
    /// Planned and implemented.
    Selected {
        test: &'a ResolvedTest,
        markers: Vec<Marker>,
        implementation: &'a dyn HardwareTest,
    },
    /// Planned, but nothing is registered under its key.
    Unimplemented {
        test: &'a ResolvedTest,
        markers: Vec<Marker>,
    },
    /// Registered, but not in the plan.
    Excluded { key: TestKey },
}

impl Collected<'_> {
    pub fn key(&self) -> &TestKey {
        match self {
            Collected::Selected { test, .. } | Collected::Unimplemented { test, .. } => &test.key,
            Collected::Excluded { key } => key,
        }
    }

    pub fn markers(&self) -> &[Marker] {
        match self {
            Collected::Selected { markers, .. } | Collected::Unimplemented { markers, .. } => {
                markers
            }
            Collected::Excluded { .. } => &[],
        }
    }
}

/// The plan's tests in execution order, followed by the excluded ones in
/// registration order.
pub struct Collection<'a> {
    pub items: Vec<Collected<'a>>,
}

impl Collection<'_> {
    /// Number of entries that will actually execute.
    pub fn runnable_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, Collected::Selected { .. }))
            .count()
    }

    pub fn excluded_count(&self) -> usize {
        self.items
            .iter()
            .filter(|item| matches!(item, Collected::Excluded { .. }))
            .count()
    }
}

/// Markers for one planned test.
pub fn markers_for(plan: &ExecutionPlan, test: &ResolvedTest) -> Vec<Marker> {
    match plan.annotations_for(&test.key) {
        Some(annotations) => annotations.iter().map(Marker::from_annotation).collect(),
        None => Annotation::for_test(test)
            .iter()
            .map(Marker::from_annotation)
            .collect(),
    }
}

/// Keeps the planned tests that carry every `wanted` marker, compared by
/// display form (`smoke`, `platform_ecu_platform_a`, `timeout(60)`).
/// Returns how many tests were dropped.
pub fn select_by_markers(plan: &mut ExecutionPlan, wanted: &[String]) -> usize {
    if wanted.is_empty() {
        return 0;
    }
    let view: &ExecutionPlan = plan;
    let keep: HashSet<TestKey> = view
        .resolved_tests
        .iter()
        .filter(|test| {
            let markers: Vec<String> = markers_for(view, test)
                .iter()
                .map(ToString::to_string)
                .collect();
            wanted.iter().all(|marker| markers.contains(marker))
        })
        .map(|test| test.key.clone())
        .collect();
    let before = plan.len();
    plan.retain(|test| keep.contains(&test.key));
    let dropped = before - plan.len();
    debug!(markers = ?wanted, dropped, "applied marker selection");
    dropped
}

/// Matches plan entries to registered tests.
///
/// When two registered tests share a key the first one wins.
pub fn collect<'a>(plan: &'a ExecutionPlan, tests: &'a [Box<dyn HardwareTest>]) -> Collection<'a> {
    let mut seen = HashSet::new();
    let mut registered: Vec<&'a dyn HardwareTest> = Vec::with_capacity(tests.len());
    for test in tests {
        if seen.insert(test.key()) {
            registered.push(test.as_ref());
        } else {
            warn!(test = %test.key(), "duplicate test registration ignored");
        }
    }

    let mut items = Vec::with_capacity(registered.len().max(plan.len()));
    for resolved in &plan.resolved_tests {
        let markers = markers_for(plan, resolved);
        match registered.iter().find(|test| test.key() == resolved.key) {
            Some(implementation) => items.push(Collected::Selected {
                test: resolved,
                markers,
                implementation: *implementation,
            }),
            None => {
                warn!(test = %resolved.key, "planned test has no registered implementation");
                items.push(Collected::Unimplemented {
                    test: resolved,
                    markers,
                });
            }
        }
    }

    for test in registered {
        let key = test.key();
        if plan.test(&key.suite, &key.name).is_none() {
            debug!(test = %key, "{}", EXCLUDED_REASON);
            items.push(Collected::Excluded { key });
        }
    }

    Collection { items }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::{TestCase, TestContext};
    use crate::error::TestResult;
    use benchtop_core::{PlatformConfig, PlatformSet, PlatformSource, Priority};
    use std::collections::BTreeMap;

    fn noop(_ctx: &mut TestContext<'_>) -> TestResult {
        Ok(())
    }

    fn resolved(suite: &str, name: &str) -> ResolvedTest {
        ResolvedTest {
            key: TestKey::new(suite, name),
            description: String::new(),
            category: "smoke".to_string(),
            priority: Priority::Critical,
            platforms: PlatformSet::only("mock_platform"),
            requires_hardware: true,
            timeout: Some(60),
            provenance: Vec::new(),
        }
    }

    fn plan(tests: Vec<ResolvedTest>) -> ExecutionPlan {
        ExecutionPlan {
            platform: PlatformConfig::new("mock_platform"),
            platform_source: PlatformSource::Default,
            profile: None,
            per_test_annotations: Vec::new(),
            resolved_tests: tests,
            environment_overlay: BTreeMap::new(),
        }
    }

    #[test]
    fn test_markers_from_annotations() {
        let test = resolved("can_bus", "test_can_initialization");
        let markers: Vec<String> = markers_for(&plan(vec![]), &test)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            markers,
            vec![
                "smoke",
                "can_bus",
                "critical",
                "platform_mock_platform",
                "requires_hardware",
                "timeout(60)"
            ]
        );
    }

    #[test]
    fn test_all_platforms_marker() {
        let mut test = resolved("diagnostics", "test_diag_session");
        test.platforms = PlatformSet::All;
        let markers = markers_for(&plan(vec![]), &test);
        assert!(markers.contains(&Marker::tag("all_platforms")));
        assert!(!markers.iter().any(|m| m.to_string().starts_with("platform_")));
    }

    #[test]
    fn test_collect_orders_plan_then_excluded() {
        let tests: Vec<Box<dyn HardwareTest>> = vec![
            Box::new(TestCase::new("can_bus", "test_can_filters", noop)),
            Box::new(TestCase::new("can_bus", "test_can_initialization", noop)),
            Box::new(TestCase::new("serial", "test_serial_echo", noop)),
        ];
        let plan = plan(vec![
            resolved("serial", "test_serial_echo"),
            resolved("can_bus", "test_can_initialization"),
            resolved("gpio", "test_gpio_unknown"),
        ]);

        let collection = collect(&plan, &tests);
        let keys: Vec<String> = collection
            .items
            .iter()
            .map(|item| item.key().to_string())
            .collect();
        assert_eq!(
            keys,
            vec![
                "serial::test_serial_echo",
                "can_bus::test_can_initialization",
                "gpio::test_gpio_unknown",
                "can_bus::test_can_filters",
            ]
        );
        assert_eq!(collection.runnable_count(), 2);
        assert_eq!(collection.excluded_count(), 1);
        assert!(matches!(
            &collection.items[2],
            Collected::Unimplemented { test, .. }
                if test.key == TestKey::new("gpio", "test_gpio_unknown")
        ));
        assert!(collection.items[3].markers().is_empty());
    }

    #[test]
    fn test_select_by_markers_requires_every_marker() {
        let mut regression = resolved("can_bus", "test_can_send_receive");
        regression.category = "regression".to_string();
        let mut plan = plan(vec![
            resolved("can_bus", "test_can_initialization"),
            regression,
            resolved("serial", "test_serial_echo"),
        ]);

        assert_eq!(select_by_markers(&mut plan, &[]), 0);
        assert_eq!(plan.len(), 3);

        let wanted = vec!["smoke".to_string(), "can_bus".to_string()];
        assert_eq!(select_by_markers(&mut plan, &wanted), 2);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan.resolved_tests[0].name(), "test_can_initialization");

        let wanted = vec!["timeout(60)".to_string(), "platform_mock_platform".to_string()];
        assert_eq!(select_by_markers(&mut plan, &wanted), 0);
    }

    #[test]
    fn test_duplicate_registration_first_wins() {
        let tests: Vec<Box<dyn HardwareTest>> = vec![
            Box::new(TestCase::new("can_bus", "test_can_filters", noop)),
            Box::new(TestCase::new("can_bus", "test_can_filters", noop)),
        ];
        let plan = plan(vec![]);
        let collection = collect(&plan, &tests);
        assert_eq!(collection.items.len(), 1);
    }

    #[test]
    fn test_marker_serializes_as_string() {
        let json = serde_json::to_value(vec![Marker::tag("smoke"), Marker::Timeout(5)]).unwrap();
        assert_eq!(json, serde_json::json!(["smoke", "timeout(5)"]));
    }
}
