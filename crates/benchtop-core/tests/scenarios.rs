mod common;

use benchtop_core::{
    Annotation, CliFilters, ConfigError, ConfigStore, ExecutionPlanner, Field, MetadataSource,
    PlanRequest, PlatformSet, Priority, ResolvedTest,
};
use common::{monolithic_config, split_config, write};

fn names(tests: &[ResolvedTest]) -> Vec<String> {
    tests.iter().map(|t| t.key.to_string()).collect()
}

fn with_profile(profile: &str) -> PlanRequest {
    PlanRequest {
        profile: Some(profile.to_string()),
        ..PlanRequest::default()
    }
}

#[test]
fn test_scenario_single_inclusion_with_overrides() {
    for root in [split_config(), monolithic_config()] {
        let store = ConfigStore::open(root.path()).unwrap();
        let plan = ExecutionPlanner::new(&store)
            .plan(&with_profile("smoke"))
            .unwrap();

        assert_eq!(plan.platform.name, "mock_platform");
        assert_eq!(names(&plan.resolved_tests), vec!["can_bus::test_can_initialization"]);

        let test = &plan.resolved_tests[0];
        assert_eq!(test.platforms, PlatformSet::only("mock_platform"));
        assert_eq!(test.timeout, Some(60));
        assert_eq!(test.category, "smoke");
        assert_eq!(test.priority, Priority::Critical);
        assert_eq!(test.source_of(Field::Category), Some(MetadataSource::Test));
        assert_eq!(
            test.source_of(Field::Timeout),
            Some(MetadataSource::Inclusion { index: 0 })
        );
    }
}

#[test]
fn test_scenario_full_suite_inclusion_overrides_hardware_flag() {
    let root = split_config();
    let store = ConfigStore::open(root.path()).unwrap();
    let plan = ExecutionPlanner::new(&store)
        .plan(&with_profile("smoke_extended"))
        .unwrap();

    assert_eq!(
        names(&plan.resolved_tests),
        vec![
            "can_bus::test_can_initialization",
            "diagnostics::test_diag_session",
            "diagnostics::test_diag_dtc_read",
        ]
    );

    let session = plan.test("diagnostics", "test_diag_session").unwrap();
    assert!(!session.requires_hardware);
    assert_eq!(session.category, "smoke");
    assert_eq!(session.priority, Priority::High);
    assert_eq!(session.timeout, Some(300));

    let dtc = plan.test("diagnostics", "test_diag_dtc_read").unwrap();
    assert!(!dtc.requires_hardware);
    assert_eq!(dtc.category, "integration");
    assert_eq!(dtc.priority, Priority::Medium);
    assert_eq!(dtc.timeout, Some(45));
    assert_eq!(dtc.platforms, PlatformSet::All);

    assert!(
        !plan
            .annotations_for(&dtc.key)
            .unwrap()
            .contains(&Annotation::RequiresHardware)
    );
}

#[test]
fn test_scenario_legacy_mode_category_filter_on_platform_b() {
    let root = monolithic_config();
    let store = ConfigStore::open(root.path()).unwrap();
    let plan = ExecutionPlanner::new(&store)
        .plan(&PlanRequest {
            platform: Some("ecu_platform_b".to_string()),
            filters: CliFilters::default().with_category("smoke"),
            ..PlanRequest::default()
        })
        .unwrap();

    assert_eq!(
        names(&plan.resolved_tests),
        vec![
            "can_bus::test_can_initialization",
            "can_bus::test_can_filters",
            "diagnostics::test_diag_session",
        ]
    );
    assert!(plan.resolved_tests.iter().all(|t| t.category == "smoke"));
}

#[test]
fn test_zero_matches_is_an_empty_plan() {
    let root = split_config();
    let store = ConfigStore::open(root.path()).unwrap();
    let plan = ExecutionPlanner::new(&store)
        .plan(&PlanRequest {
            filters: CliFilters::default().with_category("performance"),
            ..PlanRequest::default()
        })
        .unwrap();
    assert!(plan.is_empty());
}

#[test]
fn test_subset_with_unknown_test_fails_before_resolution() {
    let root = split_config();
    write(
        root.path(),
        "test_registry/execution/hil.yaml",
        "include:\n  - suite: serial\n    tests: [test_serial_echo, test_serial_flood]\n",
    );
    match ConfigStore::open(root.path()).unwrap_err() {
        ConfigError::DanglingReference { field, .. } => assert_eq!(field, "include[0].tests[1]"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_overlapping_inclusions_last_declared_wins() {
    let root = split_config();
    write(
        root.path(),
        "test_registry/execution/nightly.yaml",
        r"
include:
  - suite: serial
    overrides:
      priority: critical
      timeout: 10
  - suite: can_bus
    tests: [test_can_initialization]
  - suite: serial
    tests: [test_serial_timeout]
    overrides:
      timeout: 20
",
    );
    let store = ConfigStore::open(root.path()).unwrap();
    let plan = ExecutionPlanner::new(&store)
        .plan(&PlanRequest {
            platform: Some("ecu_platform_a".to_string()),
            profile: Some("nightly".to_string()),
            ..PlanRequest::default()
        })
        .unwrap();

    assert_eq!(
        names(&plan.resolved_tests),
        vec![
            "serial::test_serial_echo",
            "serial::test_serial_timeout",
            "can_bus::test_can_initialization",
        ]
    );
    let echo = plan.test("serial", "test_serial_echo").unwrap();
    assert_eq!(echo.priority, Priority::Critical);
    assert_eq!(echo.timeout, Some(10));

    let timeout = plan.test("serial", "test_serial_timeout").unwrap();
    assert_eq!(timeout.timeout, Some(20));
    assert_eq!(timeout.priority, Priority::Low);
    assert_eq!(
        timeout.source_of(Field::Timeout),
        Some(MetadataSource::Inclusion { index: 2 })
    );
}

#[test]
fn test_repeated_planning_is_identical() {
    let root = split_config();
    let store = ConfigStore::open(root.path()).unwrap();
    let planner = ExecutionPlanner::new(&store);
    let first = planner.plan(&with_profile("smoke_extended")).unwrap();
    let second = planner.plan(&with_profile("smoke_extended")).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}
