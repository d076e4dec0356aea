//! Hardware Facade: one adapter per configured interface, for one session.

use std::sync::Arc;

use benchtop_core::PlatformConfig;
use benchtop_proto::{Adapter, AdapterError, CanBus, GpioBank, OperationResult, SerialPort};
use tracing::{debug, info, warn};

use crate::registry::AdapterRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FacadeState {
    Created,
    Ready,
    Failed,
    Closed,
}

/// Owns the adapters of one platform for one test session.
///
/// `initialize` brings every interface up or none: on the first failure the
/// interfaces already initialized are cleaned up in reverse order and the
/// facade holds no adapters. `cleanup` is idempotent. Dropping an
/// initialized facade cleans it up as well.
#[derive(Debug)]
pub struct HardwareFacade {
    platform: PlatformConfig,
    registry: Arc<AdapterRegistry>,
    force_mock: bool,
    adapters: Vec<(String, Box<dyn Adapter>)>,
    state: FacadeState,
}

impl HardwareFacade {
    pub fn new(platform: PlatformConfig, registry: Arc<AdapterRegistry>) -> Self {
        Self {
            platform,
            registry,
            force_mock: false,
            adapters: Vec::new(),
            state: FacadeState::Created,
        }
    }

    /// Uses the mock variant for every interface.
    pub fn with_forced_mock(mut self, force: bool) -> Self {
        self.force_mock = force;
        self
    }

    pub fn platform(&self) -> &PlatformConfig {
        &self.platform
    }

    pub fn is_initialized(&self) -> bool {
        self.state == FacadeState::Ready
    }

    /// Constructs and initializes every interface in declaration order.
    ///
    /// Device-level failures come back as a failed aggregate result, with
    /// each interface's outcome in the error and log text. Construction
    /// errors (unknown interface, missing variant, bad parameters) are
    /// returned as `Err` after the same rollback.
    pub fn initialize(&mut self) -> Result<OperationResult, AdapterError> {
        match self.state {
            FacadeState::Ready => {
                return Ok(OperationResult::ok().with_log("hardware already initialized"));
            }
            FacadeState::Closed => {
                warn!(platform = %self.platform.name, "re-initializing a closed facade");
            }
            FacadeState::Created | FacadeState::Failed => {}
        }

        info!(
            platform = %self.platform.name,
            interfaces = self.platform.interfaces.len(),
            "initializing hardware"
        );

        let registry = Arc::clone(&self.registry);
        let mut results: Vec<(String, OperationResult)> = Vec::new();
        for iface in &self.platform.interfaces {
            let mut adapter = match registry.create(&iface.name, iface, self.force_mock) {
                Ok(adapter) => adapter,
                Err(err) => {
                    warn!(interface = %iface.name, error = %err, "adapter construction failed");
                    let rollback = Self::rollback(&mut self.adapters);
                    self.state = FacadeState::Failed;
                    debug!(success = rollback.success, "rollback after construction failure");
                    return Err(err);
                }
            };

            let result = adapter.initialize();
            let succeeded = result.success;
            results.push((iface.name.clone(), result));
            if succeeded {
                self.adapters.push((iface.name.clone(), adapter));
            } else {
                warn!(interface = %iface.name, "interface failed to initialize");
                let cleanup = adapter.cleanup();
                if !cleanup.success {
                    results.push((format!("{} cleanup", iface.name), cleanup));
                }
                let rollback = Self::rollback(&mut self.adapters);
                if !rollback.success {
                    results.push(("rollback".to_string(), rollback));
                }
                self.state = FacadeState::Failed;
                return Ok(OperationResult::aggregate(results));
            }
        }

        self.state = FacadeState::Ready;
        Ok(OperationResult::aggregate(results))
    }

    /// Cleans up every constructed adapter, last first. Individual failures
    /// are collected into the result; calling again is a no-op.
    pub fn cleanup(&mut self) -> OperationResult {
        if self.adapters.is_empty() {
            if self.state == FacadeState::Ready {
                self.state = FacadeState::Closed;
            }
            return OperationResult::ok();
        }
        info!(platform = %self.platform.name, "cleaning up hardware");
        let result = Self::rollback(&mut self.adapters);
        self.state = FacadeState::Closed;
        result
    }

    fn rollback(adapters: &mut Vec<(String, Box<dyn Adapter>)>) -> OperationResult {
        let results: Vec<(String, OperationResult)> = adapters
            .drain(..)
            .rev()
            .map(|(name, mut adapter)| {
                let result = adapter.cleanup();
                if !result.success {
                    warn!(interface = %name, error = result.error_message(), "cleanup failed");
                }
                (name, result)
            })
            .collect();
        OperationResult::aggregate(results)
    }

    /// Names of the interfaces currently held.
    pub fn interface_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn interface(&self, name: &str) -> Result<&dyn Adapter, AdapterError> {
        match self.adapters.iter().find(|(n, _)| n == name) {
            Some((_, adapter)) => Ok(adapter.as_ref()),
            None => Err(self.missing(name)),
        }
    }

    pub fn interface_mut(&mut self, name: &str) -> Result<&mut dyn Adapter, AdapterError> {
        match self.adapters.iter().position(|(n, _)| n == name) {
            Some(index) => Ok(self.adapters[index].1.as_mut()),
            None => Err(self.missing(name)),
        }
    }

    pub fn can(&mut self, name: &str) -> Result<&mut dyn CanBus, AdapterError> {
        self.interface_mut(name)?
            .can_bus()
            .ok_or_else(|| mismatch(name, "CAN"))
    }

    pub fn serial(&mut self, name: &str) -> Result<&mut dyn SerialPort, AdapterError> {
        self.interface_mut(name)?
            .serial_port()
            .ok_or_else(|| mismatch(name, "serial"))
    }

    pub fn gpio(&mut self, name: &str) -> Result<&mut dyn GpioBank, AdapterError> {
        self.interface_mut(name)?
            .gpio_bank()
            .ok_or_else(|| mismatch(name, "GPIO"))
    }

    fn missing(&self, name: &str) -> AdapterError {
        if self.platform.interface(name).is_some() {
            AdapterError::NotInitialized {
                interface: name.to_string(),
            }
        } else {
            AdapterError::NotConfigured {
                interface: name.to_string(),
                platform: self.platform.name.clone(),
            }
        }
    }
}

fn mismatch(name: &str, capability: &'static str) -> AdapterError {
    AdapterError::CapabilityMismatch {
        interface: name.to_string(),
        capability,
    }
}

impl Drop for HardwareFacade {
    fn drop(&mut self) {
        if !self.adapters.is_empty() {
            debug!(platform = %self.platform.name, "facade dropped while initialized");
            let _ = self.cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AdapterRegistration;
    use benchtop_core::InterfaceConfig;
    use benchtop_proto::{AdapterVariant, CanFrame};
    use std::sync::Mutex;

    /// Records lifecycle calls so rollback order can be asserted.
    #[derive(Debug)]
    struct Recording {
        name: String,
        fail_init: bool,
        fail_cleanup: bool,
        log: Arc<Mutex<Vec<String>>>,
        ready: bool,
    }

    impl Adapter for Recording {
        fn interface(&self) -> &str {
            &self.name
        }

        fn variant(&self) -> AdapterVariant {
            AdapterVariant::Mock
        }

        fn initialize(&mut self) -> OperationResult {
            self.log.lock().unwrap().push(format!("init {}", self.name));
            if self.fail_init {
                OperationResult::failure("device busy")
            } else {
                self.ready = true;
                OperationResult::ok()
            }
        }

        fn cleanup(&mut self) -> OperationResult {
            self.log.lock().unwrap().push(format!("cleanup {}", self.name));
            self.ready = false;
            if self.fail_cleanup {
                OperationResult::failure("stuck")
            } else {
                OperationResult::ok()
            }
        }

        fn is_ready(&self) -> bool {
            self.ready
        }
    }

    /// Registers `a`, `b`, `c`; interfaces whose `type` is `failing` fail
    /// to initialize, `sticky` fail to clean up, `wedged` fail both.
    fn recording_registry(log: &Arc<Mutex<Vec<String>>>) -> Arc<AdapterRegistry> {
        let mut registry = AdapterRegistry::new();
        for name in ["a", "b", "c"] {
            let log = Arc::clone(log);
            registry.register(AdapterRegistration::new(
                name,
                move |config: &InterfaceConfig| {
                    Ok(Box::new(Recording {
                        name: config.name.clone(),
                        fail_init: matches!(config.kind.as_str(), "failing" | "wedged"),
                        fail_cleanup: matches!(config.kind.as_str(), "sticky" | "wedged"),
                        log: Arc::clone(&log),
                        ready: false,
                    }) as Box<dyn Adapter>)
                },
            ));
        }
        Arc::new(registry)
    }

    fn platform(kinds: [&str; 3]) -> PlatformConfig {
        ["a", "b", "c"]
            .into_iter()
            .zip(kinds)
            .fold(PlatformConfig::new("bench"), |p, (name, kind)| {
                p.with_interface(InterfaceConfig::new(name, kind))
            })
    }

    fn count(log: &Arc<Mutex<Vec<String>>>, entry: &str) -> usize {
        log.lock().unwrap().iter().filter(|e| *e == entry).count()
    }

    #[test]
    fn test_initialize_all_then_cleanup_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut facade =
            HardwareFacade::new(platform(["ok", "ok", "ok"]), recording_registry(&log));

        let result = facade.initialize().unwrap();
        assert!(result.success);
        assert!(facade.is_initialized());
        assert_eq!(facade.interface_names(), vec!["a", "b", "c"]);

        assert!(facade.cleanup().success);
        assert!(facade.cleanup().success);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["init a", "init b", "init c", "cleanup c", "cleanup b", "cleanup a"]
        );
    }

    #[test]
    fn test_failure_on_second_interface_rolls_back_first_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut facade =
            HardwareFacade::new(platform(["ok", "failing", "ok"]), recording_registry(&log));

        let result = facade.initialize().unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("b: device busy"));
        assert!(!facade.is_initialized());
        assert!(facade.interface_names().is_empty());

        facade.cleanup();
        drop(facade);

        assert_eq!(count(&log, "cleanup a"), 1);
        assert_eq!(count(&log, "init c"), 0);
        assert_eq!(count(&log, "cleanup c"), 0);
    }

    #[test]
    fn test_failed_interface_cleanup_error_is_reported() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut facade =
            HardwareFacade::new(platform(["ok", "wedged", "ok"]), recording_registry(&log));

        let result = facade.initialize().unwrap();
        assert!(!result.success);
        assert_eq!(
            result.error.as_deref(),
            Some("b: device busy; b cleanup: stuck")
        );
        assert_eq!(count(&log, "cleanup b"), 1);
        assert_eq!(count(&log, "cleanup a"), 1);
    }

    #[test]
    fn test_cleanup_collects_errors_without_stopping() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut facade =
            HardwareFacade::new(platform(["sticky", "ok", "ok"]), recording_registry(&log));
        assert!(facade.initialize().unwrap().success);

        let result = facade.cleanup();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("a: stuck"));
        assert_eq!(count(&log, "cleanup b"), 1);
        assert_eq!(count(&log, "cleanup c"), 1);
    }

    #[test]
    fn test_drop_cleans_up() {
        let log = Arc::new(Mutex::new(Vec::new()));
        {
            let mut facade =
                HardwareFacade::new(platform(["ok", "ok", "ok"]), recording_registry(&log));
            facade.initialize().unwrap();
        }
        assert_eq!(count(&log, "cleanup a"), 1);
        assert_eq!(count(&log, "cleanup c"), 1);
    }

    #[test]
    fn test_unknown_interface_is_construction_error_with_rollback() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let platform = PlatformConfig::new("bench")
            .with_interface(InterfaceConfig::new("a", "ok"))
            .with_interface(InterfaceConfig::new("lin", "ok"));
        let mut facade = HardwareFacade::new(platform, recording_registry(&log));

        let err = facade.initialize().unwrap_err();
        assert!(matches!(err, AdapterError::NotRegistered { .. }));
        assert_eq!(count(&log, "cleanup a"), 1);
    }

    #[test]
    fn test_lookup_errors_are_typed() {
        let platform = PlatformConfig::new("mock_platform")
            .with_interface(InterfaceConfig::new("can", "mock"))
            .with_interface(InterfaceConfig::new("serial", "mock"));
        let mut facade = HardwareFacade::new(platform, Arc::new(AdapterRegistry::builtin()));

        assert!(matches!(
            facade.can("can"),
            Err(AdapterError::NotInitialized { .. })
        ));

        assert!(facade.initialize().unwrap().success);
        assert!(matches!(
            facade.interface("gpio"),
            Err(AdapterError::NotConfigured { .. })
        ));
        assert!(matches!(
            facade.serial("can"),
            Err(AdapterError::CapabilityMismatch { capability: "serial", .. })
        ));

        let can = facade.can("can").unwrap();
        assert!(can.send(&CanFrame::new(0x100, [1, 2])).success);
        assert_eq!(can.receive(None).map(|f| f.data), Some(vec![2, 3]));
    }

    #[test]
    fn test_forced_mock_overrides_live_interfaces() {
        let platform = PlatformConfig::new("ecu_platform_a").with_interface(
            InterfaceConfig::new("serial", "uart").with_param("port", "/dev/ttyUSB0"),
        );
        let mut facade = HardwareFacade::new(platform, Arc::new(AdapterRegistry::builtin()))
            .with_forced_mock(true);
        assert!(facade.initialize().unwrap().success);
        assert_eq!(
            facade.interface("serial").unwrap().variant(),
            AdapterVariant::Mock
        );
    }
}
