use thiserror::Error;

use crate::adapter::AdapterVariant;

/// Errors raised while selecting, constructing, or looking up adapters.
///
/// These are programming or configuration mistakes. Device-level failures
/// are reported through `OperationResult` instead.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// No adapter module is registered for the interface name.
    #[error("no adapter registered for interface '{interface}' (registered: {available})")]
    NotRegistered { interface: String, available: String },

    /// The requested variant does not exist for a registered interface.
    #[error("{variant} adapter for interface '{interface}' is unavailable")]
    Unavailable {
        interface: String,
        variant: AdapterVariant,
    },

    /// The interface parameters do not have the shape the adapter expects.
    #[error("invalid configuration for interface '{interface}': {message}")]
    InvalidConfig { interface: String, message: String },

    /// Lookup of an interface the platform does not configure.
    #[error("interface '{interface}' is not configured on platform '{platform}'")]
    NotConfigured { interface: String, platform: String },

    /// Lookup of a configured interface before the facade initialized it.
    #[error("interface '{interface}' has not been initialized")]
    NotInitialized { interface: String },

    /// The interface exists but does not offer the requested capability.
    #[error("interface '{interface}' does not provide the {capability} capability")]
    CapabilityMismatch {
        interface: String,
        capability: &'static str,
    },
}
