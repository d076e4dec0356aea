//! Adapter Registry.
//!
//! Each adapter module contributes one [`AdapterRegistration`] to the
//! built-in table. Adding an interface means adding a module and a line to
//! `BUILTIN`; nothing in the facade or the runner changes.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use benchtop_core::InterfaceConfig;
use benchtop_proto::{Adapter, AdapterError, AdapterVariant};
use serde::Serialize;
use tracing::info;

use crate::{can, gpio, serial};

/// Builds an adapter from its interface parameters.
pub type AdapterFactory =
    Arc<dyn Fn(&InterfaceConfig) -> Result<Box<dyn Adapter>, AdapterError> + Send + Sync>;

/// The live constructor and optional mock constructor for one interface.
#[derive(Clone)]
pub struct AdapterRegistration {
    pub interface: String,
    pub live: AdapterFactory,
    pub mock: Option<AdapterFactory>,
}

impl AdapterRegistration {
    pub fn new<F>(interface: impl Into<String>, live: F) -> Self
    where
        F: Fn(&InterfaceConfig) -> Result<Box<dyn Adapter>, AdapterError> + Send + Sync + 'static,
    {
        Self {
            interface: interface.into(),
            live: Arc::new(live),
            mock: None,
        }
    }

    pub fn with_mock<F>(mut self, mock: F) -> Self
    where
        F: Fn(&InterfaceConfig) -> Result<Box<dyn Adapter>, AdapterError> + Send + Sync + 'static,
    {
        self.mock = Some(Arc::new(mock));
        self
    }
}

impl fmt::Debug for AdapterRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterRegistration")
            .field("interface", &self.interface)
            .field("mock", &self.mock.is_some())
            .finish_non_exhaustive()
    }
}

/// Listing entry for `--list-adapters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdapterAvailability {
    pub interface: String,
    pub live: bool,
    pub mock: bool,
}

const BUILTIN: &[fn() -> AdapterRegistration] =
    &[can::registration, serial::registration, gpio::registration];

/// Interface name to constructors.
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    entries: BTreeMap<String, AdapterRegistration>,
}

impl AdapterRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every adapter module shipped with this crate.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for registration in BUILTIN {
            registry.register(registration());
        }
        registry
    }

    /// Adds or replaces the registration for an interface.
    pub fn register(&mut self, registration: AdapterRegistration) -> Option<AdapterRegistration> {
        self.entries
            .insert(registration.interface.clone(), registration)
    }

    pub fn discover(&self) -> &BTreeMap<String, AdapterRegistration> {
        &self.entries
    }

    pub fn availability(&self) -> Vec<AdapterAvailability> {
        self.entries
            .values()
            .map(|entry| AdapterAvailability {
                interface: entry.interface.clone(),
                live: true,
                mock: entry.mock.is_some(),
            })
            .collect()
    }

    /// Constructs the adapter for `interface`.
    ///
    /// The mock variant is chosen when `use_mock` is set or the interface's
    /// `type` is `mock`. A missing mock is an error, never a fallback to the
    /// live adapter.
    pub fn create(
        &self,
        interface: &str,
        config: &InterfaceConfig,
        use_mock: bool,
    ) -> Result<Box<dyn Adapter>, AdapterError> {
        let entry = self
            .entries
            .get(interface)
            .ok_or_else(|| AdapterError::NotRegistered {
                interface: interface.to_string(),
                available: self.entries.keys().cloned().collect::<Vec<_>>().join(", "),
            })?;

        let variant = if use_mock || config.is_mock() {
            AdapterVariant::Mock
        } else {
            AdapterVariant::Live
        };
        let factory = match variant {
            AdapterVariant::Live => &entry.live,
            AdapterVariant::Mock => entry.mock.as_ref().ok_or_else(|| AdapterError::Unavailable {
                interface: interface.to_string(),
                variant,
            })?,
        };

        info!(interface, %variant, kind = %config.kind, "constructing adapter");
        factory(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchtop_proto::OperationResult;

    #[derive(Debug)]
    struct Stub {
        variant: AdapterVariant,
    }

    impl Adapter for Stub {
        fn interface(&self) -> &str {
            "spi"
        }

        fn variant(&self) -> AdapterVariant {
            self.variant
        }

        fn initialize(&mut self) -> OperationResult {
            OperationResult::ok()
        }

        fn cleanup(&mut self) -> OperationResult {
            OperationResult::ok()
        }

        fn is_ready(&self) -> bool {
            true
        }
    }

    fn live_only() -> AdapterRegistry {
        let mut registry = AdapterRegistry::new();
        registry.register(AdapterRegistration::new("spi", |_: &InterfaceConfig| {
            Ok(Box::new(Stub {
                variant: AdapterVariant::Live,
            }) as Box<dyn Adapter>)
        }));
        registry
    }

    #[test]
    fn test_builtin_table() {
        let availability = AdapterRegistry::builtin().availability();
        let interfaces: Vec<&str> = availability.iter().map(|a| a.interface.as_str()).collect();
        assert_eq!(interfaces, vec!["can", "gpio", "serial"]);
        assert!(availability.iter().all(|a| a.live && a.mock));
    }

    #[test]
    fn test_mock_selected_by_flag_or_type() {
        let registry = AdapterRegistry::builtin();
        let live_cfg = InterfaceConfig::new("serial", "uart").with_param("port", "/dev/ttyUSB0");
        let mock_cfg = InterfaceConfig::new("serial", "mock");

        let adapter = registry.create("serial", &live_cfg, false).unwrap();
        assert_eq!(adapter.variant(), AdapterVariant::Live);

        let adapter = registry.create("serial", &live_cfg, true).unwrap();
        assert_eq!(adapter.variant(), AdapterVariant::Mock);

        let adapter = registry.create("serial", &mock_cfg, false).unwrap();
        assert_eq!(adapter.variant(), AdapterVariant::Mock);
    }

    #[test]
    fn test_missing_mock_is_unavailable_not_fallback() {
        let registry = live_only();
        let cfg = InterfaceConfig::new("spi", "spidev");
        assert!(registry.create("spi", &cfg, false).is_ok());

        let err = registry.create("spi", &cfg, true).unwrap_err();
        assert!(matches!(
            err,
            AdapterError::Unavailable {
                variant: AdapterVariant::Mock,
                ..
            }
        ));
        let forced = InterfaceConfig::new("spi", "mock");
        assert!(registry.create("spi", &forced, false).is_err());
    }

    #[test]
    fn test_unknown_interface() {
        let err = AdapterRegistry::builtin()
            .create("lin", &InterfaceConfig::new("lin", "mock"), true)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "no adapter registered for interface 'lin' (registered: can, gpio, serial)"
        );
    }
}
