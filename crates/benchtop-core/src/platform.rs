//! Hardware platform descriptions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::error::{ConfigError, ConfigResult};

/// Identification block of a platform file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub description: String,
}

/// Free-form defaults tests may read at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestParameters {
    /// Seconds.
    pub default_timeout: f64,
    /// Seconds.
    pub long_timeout: f64,
    pub retry_count: u32,
    /// Seconds.
    pub retry_delay: f64,
    pub log_level: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Default for TestParameters {
    fn default() -> Self {
        Self {
            default_timeout: 5.0,
            long_timeout: 30.0,
            retry_count: 3,
            retry_delay: 1.0,
            log_level: "INFO".to_string(),
            extra: BTreeMap::new(),
        }
    }
}

/// One named interface's parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterfaceConfig {
    pub name: String,
    /// The `type` discriminator; `mock` forces the mock adapter.
    #[serde(rename = "type")]
    pub kind: String,
    pub params: Mapping,
}

impl InterfaceConfig {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            params: Mapping::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(Value::from(key), value.into());
        self
    }

    pub fn is_mock(&self) -> bool {
        self.kind.eq_ignore_ascii_case("mock")
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Deserializes the parameters into an adapter's settings type.
    pub fn settings<T: DeserializeOwned>(&self) -> Result<T, serde_yaml::Error> {
        serde_yaml::from_value(Value::Mapping(self.params.clone()))
    }
}

/// A loaded platform: identification, interfaces in declaration order, and
/// test parameters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlatformConfig {
    /// The selector the platform was loaded under (the file stem).
    pub name: String,
    pub info: PlatformInfo,
    pub interfaces: Vec<InterfaceConfig>,
    pub test_parameters: TestParameters,
    #[serde(skip)]
    pub source: PathBuf,
}

#[derive(Deserialize)]
struct PlatformDocument {
    #[serde(default)]
    platform: PlatformInfo,
    #[serde(default)]
    interfaces: Mapping,
    #[serde(default)]
    test_parameters: TestParameters,
}

impl PlatformConfig {
    /// An empty platform, mostly useful for tests and tooling.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            info: PlatformInfo {
                name: name.clone(),
                ..PlatformInfo::default()
            },
            name,
            interfaces: Vec::new(),
            test_parameters: TestParameters::default(),
            source: PathBuf::new(),
        }
    }

    pub fn with_interface(mut self, interface: InterfaceConfig) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn interface(&self, name: &str) -> Option<&InterfaceConfig> {
        self.interfaces.iter().find(|iface| iface.name == name)
    }

    pub fn interface_names(&self) -> Vec<&str> {
        self.interfaces.iter().map(|iface| iface.name.as_str()).collect()
    }

    /// True when every interface is forced to its mock variant.
    pub fn is_mock(&self) -> bool {
        !self.interfaces.is_empty() && self.interfaces.iter().all(InterfaceConfig::is_mock)
    }

    pub(crate) fn from_yaml(name: &str, path: &Path, text: &str) -> ConfigResult<Self> {
        let Some(doc) = crate::store::document::parse::<PlatformDocument>(path, text)? else {
            return Err(ConfigError::schema(path, "<document>", "platform file is empty"));
        };

        let mut interfaces = Vec::with_capacity(doc.interfaces.len());
        for (key, value) in doc.interfaces {
            let iface = match key {
                Value::String(iface) => iface,
                other => {
                    return Err(ConfigError::schema(
                        path,
                        "interfaces",
                        format!("interface names must be strings, found {other:?}"),
                    ));
                }
            };
            let field = format!("interfaces.{iface}");
            let mut params = match value {
                Value::Mapping(params) => params,
                _ => {
                    return Err(ConfigError::schema(
                        path,
                        field,
                        "expected a mapping of parameters",
                    ));
                }
            };
            let kind = match params.remove("type") {
                Some(Value::String(kind)) => kind,
                Some(other) => {
                    return Err(ConfigError::schema(
                        path,
                        format!("{field}.type"),
                        format!("expected a string, found {other:?}"),
                    ));
                }
                None => {
                    return Err(ConfigError::schema(
                        path,
                        format!("{field}.type"),
                        "missing interface type",
                    ));
                }
            };
            interfaces.push(InterfaceConfig {
                name: iface,
                kind,
                params,
            });
        }

        if !doc.platform.name.is_empty() && doc.platform.name != name {
            tracing::warn!(
                selector = name,
                declared = %doc.platform.name,
                "platform file declares a different name; filtering uses the selector"
            );
        }

        Ok(Self {
            name: name.to_string(),
            info: doc.platform,
            interfaces,
            test_parameters: doc.test_parameters,
            source: path.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ECU_A: &str = r#"
platform:
  name: ecu_platform_a
  version: "2.1"
  vendor: Acme
interfaces:
  serial:
    type: uart
    port: /dev/ttyUSB0
    baudrate: 115200
  can:
    type: socketcan
    channel: can0
    bitrate: 500000
  gpio:
    type: mock
test_parameters:
  default_timeout: 10.0
  custom_flag: true
"#;

    #[test]
    fn test_interfaces_keep_declaration_order() {
        let platform =
            PlatformConfig::from_yaml("ecu_platform_a", Path::new("ecu_platform_a.yaml"), ECU_A)
                .unwrap();
        assert_eq!(platform.interface_names(), vec!["serial", "can", "gpio"]);
        assert_eq!(platform.info.vendor, "Acme");
        assert!(!platform.is_mock());

        let can = platform.interface("can").unwrap();
        assert_eq!(can.kind, "socketcan");
        assert!(can.param("type").is_none());
        assert_eq!(can.param("bitrate"), Some(&Value::from(500_000)));
        assert!(platform.interface("gpio").unwrap().is_mock());
    }

    #[test]
    fn test_test_parameters_defaults_and_extras() {
        let platform =
            PlatformConfig::from_yaml("ecu_platform_a", Path::new("ecu_platform_a.yaml"), ECU_A)
                .unwrap();
        let params = &platform.test_parameters;
        assert!((params.default_timeout - 10.0).abs() < f64::EPSILON);
        assert!((params.long_timeout - 30.0).abs() < f64::EPSILON);
        assert_eq!(params.retry_count, 3);
        assert_eq!(params.extra.get("custom_flag"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_missing_interface_type_is_schema_violation() {
        let err = PlatformConfig::from_yaml(
            "bench",
            Path::new("bench.yaml"),
            "interfaces:\n  can:\n    channel: can0\n",
        )
        .unwrap_err();
        match err {
            ConfigError::SchemaViolation { field, .. } => assert_eq!(field, "interfaces.can.type"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_settings_deserialize_params() {
        #[derive(Deserialize)]
        struct Serial {
            port: String,
            #[serde(default)]
            baudrate: u32,
        }

        let iface = InterfaceConfig::new("serial", "uart")
            .with_param("port", "/dev/ttyUSB1")
            .with_param("baudrate", 9600);
        let settings: Serial = iface.settings().unwrap();
        assert_eq!(settings.port, "/dev/ttyUSB1");
        assert_eq!(settings.baudrate, 9600);
    }
}
