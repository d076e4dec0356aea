use std::fs;
use std::sync::Arc;

use benchtop_adapters::{AdapterRegistry, HardwareFacade, MOCK_LINE_RESPONSE};
use benchtop_core::ConfigStore;
use benchtop_proto::{AdapterVariant, CanFrame};
use tempfile::TempDir;

fn config_root(platforms: &[(&str, &str)]) -> TempDir {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("hardware")).unwrap();
    for (name, body) in platforms {
        fs::write(root.path().join(format!("hardware/{name}.yaml")), body).unwrap();
    }
    root
}

#[test]
fn test_mock_platform_end_to_end() {
    let root = config_root(&[(
        "mock_platform",
        r"
platform:
  name: mock_platform
interfaces:
  can:
    type: mock
    channel: vcan0
  serial:
    type: mock
  gpio:
    type: mock
    pins:
      ignition: 17
",
    )]);
    let store = ConfigStore::open(root.path()).unwrap();
    let platform = store.load_platform("mock_platform").unwrap();

    let mut facade = HardwareFacade::new(platform, Arc::new(AdapterRegistry::builtin()));
    let result = facade.initialize().unwrap();
    assert!(result.success, "{}", result.error_message());
    assert_eq!(facade.interface_names(), vec!["can", "serial", "gpio"]);

    let can = facade.can("can").unwrap();
    assert!(can.send(&CanFrame::new(0x7DF, [0x02, 0x01, 0x00])).success);
    assert_eq!(can.receive(None).map(|f| f.id), Some(0x7E7));

    let serial = facade.serial("serial").unwrap();
    assert!(serial.write(b"AT\r\n").success);
    assert_eq!(serial.read_line(None).as_deref(), Some(MOCK_LINE_RESPONSE));

    let gpio = facade.gpio("gpio").unwrap();
    let ignition = gpio.pin_by_name("ignition").unwrap();
    assert!(gpio.set_pin(ignition, true).success);
    assert_eq!(gpio.get_pin(ignition), Some(true));

    assert!(facade.cleanup().success);
    assert!(!facade.is_initialized());
}

#[test]
fn test_mixed_platform_forces_mock_per_interface() {
    let root = config_root(&[(
        "ecu_platform_a",
        r"
platform:
  name: ecu_platform_a
interfaces:
  can:
    type: socketcan
    channel: benchtop-test-no-such-can
  gpio:
    type: mock
",
    )]);
    let store = ConfigStore::open(root.path()).unwrap();
    let platform = store.load_platform("ecu_platform_a").unwrap();
    let registry = Arc::new(AdapterRegistry::builtin());

    // The live CAN channel does not exist, so initialization fails as data.
    let mut facade = HardwareFacade::new(platform.clone(), Arc::clone(&registry));
    let result = facade.initialize().unwrap();
    assert!(!result.success);
    assert!(result.error_message().starts_with("can: CAN channel"));
    assert!(facade.interface_names().is_empty());

    let mut facade = HardwareFacade::new(platform, registry).with_forced_mock(true);
    assert!(facade.initialize().unwrap().success);
    assert_eq!(
        facade.interface("can").unwrap().variant(),
        AdapterVariant::Mock
    );
}
