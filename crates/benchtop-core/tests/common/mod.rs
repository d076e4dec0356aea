//! Shared config fixtures: the same registry written in either layout.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use tempfile::TempDir;

pub const MOCK_PLATFORM: &str = r"
platform:
  name: mock_platform
  version: '1.0'
  vendor: Benchtop
interfaces:
  can:
    type: mock
    channel: vcan0
  serial:
    type: mock
    port: /dev/null
";

pub const ECU_PLATFORM_A: &str = r"
platform:
  name: ecu_platform_a
interfaces:
  can:
    type: socketcan
    channel: can0
";

pub const ECU_PLATFORM_B: &str = r"
platform:
  name: ecu_platform_b
interfaces:
  can:
    type: socketcan
    channel: can1
";

pub const GLOBALS: &str = r"
categories:
  smoke:
    description: Quick sanity checks
    execution_order: 1
  regression:
    description: Full regression
    execution_order: 2
priorities:
  critical:
    severity_level: blocker
defaults:
  category: regression
  priority: medium
  platforms: [all]
  requires_hardware: false
";

pub const CAN_BUS_SUITE: &str = r"
suite_info:
  name: can_bus
  description: CAN bus communication
  default_platforms: [all]
tests:
  - name: test_can_initialization
    description: Bring the bus up
    category: smoke
    priority: critical
  - name: test_can_send_receive
    category: regression
    priority: high
    platforms: [ecu_platform_a, mock_platform]
    requires_hardware: true
  - name: test_can_filters
    category: smoke
    platforms: [ecu_platform_b]
";

pub const DIAGNOSTICS_SUITE: &str = r"
suite_info:
  name: diagnostics
  description: UDS diagnostics
  default_category: integration
tests:
  - name: test_diag_session
    category: smoke
    priority: high
    requirements_hardware: true
  - name: test_diag_dtc_read
    requires_hardware: true
    max_duration: 45
";

pub const SERIAL_SUITE: &str = r"
suite_info:
  description: UART console
  default_priority: low
tests:
  - name: test_serial_echo
    category: smoke
    platforms: [ecu_platform_a]
  - name: test_serial_timeout
    category: integration
";

pub const SMOKE_PROFILE: &str = r"
execution_profile:
  name: smoke
  description: Fast smoke run
include:
  - suite: can_bus
    tests: [test_can_initialization]
    overrides:
      platforms: [mock_platform]
      timeout: 60
";

pub const SMOKE_EXTENDED_PROFILE: &str = r"
execution_profile:
  name: smoke_extended
  description: Smoke run plus diagnostics
  timeout: 300
include:
  - suite: can_bus
    tests: [test_can_initialization]
    overrides:
      platforms: [mock_platform]
      timeout: 60
  - suite: diagnostics
    overrides:
      requirements_hardware: false
";

pub const MONOLITHIC_REGISTRY: &str = r"
categories:
  smoke:
    description: Quick sanity checks
    execution_order: 1
  regression:
    description: Full regression
    execution_order: 2
priorities:
  critical:
    severity_level: blocker
defaults:
  category: regression
  priority: medium
  platforms: [all]
  requires_hardware: false
test_suites:
  serial:
    description: UART console
    priority: low
    tests:
      - name: test_serial_echo
        category: smoke
        platforms: [ecu_platform_a]
      - name: test_serial_timeout
        category: integration
  can_bus:
    description: CAN bus communication
    platforms: [all]
    tests:
      - name: test_can_initialization
        description: Bring the bus up
        category: smoke
        priority: critical
      - name: test_can_send_receive
        category: regression
        priority: high
        platforms: [ecu_platform_a, mock_platform]
        requires_hardware: true
      - name: test_can_filters
        category: smoke
        platforms: [ecu_platform_b]
  diagnostics:
    description: UDS diagnostics
    category: integration
    tests:
      - name: test_diag_session
        category: smoke
        priority: high
        requirements_hardware: true
      - name: test_diag_dtc_read
        requires_hardware: true
        max_duration: 45
execution_profiles:
  smoke:
    description: Fast smoke run
    include:
      - suite: can_bus
        tests: [test_can_initialization]
        overrides:
          platforms: [mock_platform]
          timeout: 60
  smoke_extended:
    description: Smoke run plus diagnostics
    timeout: 300
    include:
      - suite: can_bus
        tests: [test_can_initialization]
        overrides:
          platforms: [mock_platform]
          timeout: 60
      - suite: diagnostics
        overrides:
          requirements_hardware: false
";

pub fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn write_platforms(root: &Path) {
    write(root, "hardware/mock_platform.yaml", MOCK_PLATFORM);
    write(root, "hardware/ecu_platform_a.yaml", ECU_PLATFORM_A);
    write(root, "hardware/ecu_platform_b.yaml", ECU_PLATFORM_B);
}

pub fn split_config() -> TempDir {
    let root = TempDir::new().unwrap();
    write_platforms(root.path());
    write(root.path(), "test_registry/_globals.yaml", GLOBALS);
    write(root.path(), "test_registry/suites/can_bus.yaml", CAN_BUS_SUITE);
    write(root.path(), "test_registry/suites/diagnostics.yaml", DIAGNOSTICS_SUITE);
    write(root.path(), "test_registry/suites/serial.yaml", SERIAL_SUITE);
    write(root.path(), "test_registry/execution/smoke.yaml", SMOKE_PROFILE);
    write(
        root.path(),
        "test_registry/execution/smoke_extended.yaml",
        SMOKE_EXTENDED_PROFILE,
    );
    root
}

pub fn monolithic_config() -> TempDir {
    let root = TempDir::new().unwrap();
    write_platforms(root.path());
    write(root.path(), "test_registry.yaml", MONOLITHIC_REGISTRY);
    root
}
