//! GPIO adapters.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use benchtop_core::InterfaceConfig;
use benchtop_proto::{Adapter, AdapterError, AdapterVariant, GpioBank, OperationResult};
use serde::Deserialize;
use tracing::{debug, info};

use crate::registry::AdapterRegistration;

const INTERFACE: &str = "gpio";

pub(crate) fn registration() -> AdapterRegistration {
    AdapterRegistration::new(INTERFACE, create_live).with_mock(create_mock)
}

fn create_live(config: &InterfaceConfig) -> Result<Box<dyn Adapter>, AdapterError> {
    Ok(Box::new(GpioAdapter::from_config(config)?))
}

fn create_mock(config: &InterfaceConfig) -> Result<Box<dyn Adapter>, AdapterError> {
    Ok(Box::new(MockGpioAdapter::from_config(config)?))
}

#[derive(Debug, Deserialize)]
struct GpioSettings {
    /// Pin aliases, e.g. `ignition: 17`.
    #[serde(default)]
    pins: BTreeMap<String, u32>,
    #[serde(default = "default_sysfs_root")]
    sysfs_root: PathBuf,
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys/class/gpio")
}

fn settings(config: &InterfaceConfig) -> Result<GpioSettings, AdapterError> {
    config.settings().map_err(|err| AdapterError::InvalidConfig {
        interface: config.name.clone(),
        message: err.to_string(),
    })
}

/// Sysfs GPIO (`/sys/class/gpio/gpioN/value`).
#[derive(Debug)]
pub struct GpioAdapter {
    pins: BTreeMap<String, u32>,
    root: PathBuf,
    ready: bool,
}

impl GpioAdapter {
    pub fn from_config(config: &InterfaceConfig) -> Result<Self, AdapterError> {
        let settings = settings(config)?;
        Ok(Self {
            pins: settings.pins,
            root: settings.sysfs_root,
            ready: false,
        })
    }

    fn value_path(&self, pin: u32) -> PathBuf {
        self.root.join(format!("gpio{pin}")).join("value")
    }

    /// Exports the pin through `export` if its directory is missing.
    fn ensure_exported(&self, pin: u32) -> std::io::Result<()> {
        if self.root.join(format!("gpio{pin}")).exists() {
            return Ok(());
        }
        fs::write(self.root.join("export"), pin.to_string())
    }
}

impl Adapter for GpioAdapter {
    fn interface(&self) -> &str {
        INTERFACE
    }

    fn variant(&self) -> AdapterVariant {
        AdapterVariant::Live
    }

    fn initialize(&mut self) -> OperationResult {
        if !self.root.is_dir() {
            return OperationResult::failure(format!(
                "GPIO sysfs not available at {}",
                self.root.display()
            ));
        }
        self.ready = true;
        info!(root = %self.root.display(), pins = self.pins.len(), "GPIO sysfs present");
        OperationResult::ok()
    }

    fn cleanup(&mut self) -> OperationResult {
        self.ready = false;
        OperationResult::ok()
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn gpio_bank(&mut self) -> Option<&mut dyn GpioBank> {
        Some(self)
    }
}

impl GpioBank for GpioAdapter {
    fn set_pin(&mut self, pin: u32, value: bool) -> OperationResult {
        if !self.ready {
            return OperationResult::failure("GPIO not initialized");
        }
        let written = self
            .ensure_exported(pin)
            .and_then(|()| fs::write(self.value_path(pin), if value { "1" } else { "0" }));
        match written {
            Ok(()) => OperationResult::ok(),
            Err(err) => OperationResult::failure(format!("failed to set GPIO {pin}: {err}")),
        }
    }

    fn get_pin(&self, pin: u32) -> Option<bool> {
        if !self.ready {
            return None;
        }
        let raw = fs::read_to_string(self.value_path(pin)).ok()?;
        match raw.trim() {
            "1" => Some(true),
            "0" => Some(false),
            _ => None,
        }
    }

    fn pin_by_name(&self, name: &str) -> Option<u32> {
        self.pins.get(name).copied()
    }
}

/// In-memory pin bank seeded low from the `pins` table.
#[derive(Debug)]
pub struct MockGpioAdapter {
    pins: BTreeMap<String, u32>,
    states: BTreeMap<u32, bool>,
    ready: bool,
}

impl MockGpioAdapter {
    pub fn from_config(config: &InterfaceConfig) -> Result<Self, AdapterError> {
        Ok(Self {
            pins: settings(config)?.pins,
            states: BTreeMap::new(),
            ready: false,
        })
    }
}

impl Adapter for MockGpioAdapter {
    fn interface(&self) -> &str {
        INTERFACE
    }

    fn variant(&self) -> AdapterVariant {
        AdapterVariant::Mock
    }

    fn initialize(&mut self) -> OperationResult {
        self.states = self.pins.values().map(|&pin| (pin, false)).collect();
        self.ready = true;
        info!(pins = self.pins.len(), "mock GPIO initialized");
        OperationResult::ok().with_log("Mock GPIO initialized")
    }

    fn cleanup(&mut self) -> OperationResult {
        self.ready = false;
        self.states.clear();
        OperationResult::ok()
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn gpio_bank(&mut self) -> Option<&mut dyn GpioBank> {
        Some(self)
    }
}

impl GpioBank for MockGpioAdapter {
    fn set_pin(&mut self, pin: u32, value: bool) -> OperationResult {
        if !self.ready {
            return OperationResult::failure("Not initialized");
        }
        debug!(pin, value, "mock GPIO set");
        self.states.insert(pin, value);
        OperationResult::ok()
    }

    /// Unknown pins read low.
    fn get_pin(&self, pin: u32) -> Option<bool> {
        self.ready
            .then(|| self.states.get(&pin).copied().unwrap_or(false))
    }

    fn pin_by_name(&self, name: &str) -> Option<u32> {
        self.pins.get(name).copied()
    }
}
