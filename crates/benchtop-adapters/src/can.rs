//! CAN bus adapters.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use benchtop_core::InterfaceConfig;
use benchtop_proto::{Adapter, AdapterError, AdapterVariant, CanBus, CanFrame, OperationResult};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::registry::AdapterRegistration;

const INTERFACE: &str = "can";

/// Offset a simulated ECU adds to a request id for its response.
pub const MOCK_RESPONSE_OFFSET: u32 = 0x08;

pub(crate) fn registration() -> AdapterRegistration {
    AdapterRegistration::new(INTERFACE, create_live).with_mock(create_mock)
}

fn create_live(config: &InterfaceConfig) -> Result<Box<dyn Adapter>, AdapterError> {
    Ok(Box::new(CanAdapter::from_config(config)?))
}

fn create_mock(config: &InterfaceConfig) -> Result<Box<dyn Adapter>, AdapterError> {
    Ok(Box::new(MockCanAdapter::from_config(config)?))
}

#[derive(Debug, Deserialize)]
struct CanSettings {
    #[serde(default = "default_channel")]
    channel: String,
    #[serde(default = "default_bitrate")]
    bitrate: u32,
    #[serde(default)]
    fd_enabled: bool,
    /// Where network interfaces are listed; overridable for benches with
    /// unusual sysfs mounts.
    #[serde(default = "default_net_root")]
    net_root: PathBuf,
}

fn default_channel() -> String {
    "can0".to_string()
}

fn default_bitrate() -> u32 {
    500_000
}

fn default_net_root() -> PathBuf {
    PathBuf::from("/sys/class/net")
}

fn settings(config: &InterfaceConfig) -> Result<CanSettings, AdapterError> {
    config.settings().map_err(|err| AdapterError::InvalidConfig {
        interface: config.name.clone(),
        message: err.to_string(),
    })
}

/// Acceptance filter as `(id, mask)`.
type Filter = (u32, u32);

fn accepts(filters: &[Filter], id: u32) -> bool {
    filters.is_empty() || filters.iter().any(|(fid, mask)| id & mask == fid & mask)
}

/// SocketCAN-backed adapter.
///
/// Initialization checks that the channel exists as a network interface.
/// Frame I/O needs a raw CAN socket backend, which this build does not
/// link, so `send` reports a failed result and `receive` yields nothing.
#[derive(Debug)]
pub struct CanAdapter {
    settings: CanSettings,
    filters: Vec<Filter>,
    ready: bool,
}

impl CanAdapter {
    pub fn from_config(config: &InterfaceConfig) -> Result<Self, AdapterError> {
        Ok(Self {
            settings: settings(config)?,
            filters: Vec::new(),
            ready: false,
        })
    }

    pub fn channel(&self) -> &str {
        &self.settings.channel
    }
}

impl Adapter for CanAdapter {
    fn interface(&self) -> &str {
        INTERFACE
    }

    fn variant(&self) -> AdapterVariant {
        AdapterVariant::Live
    }

    fn initialize(&mut self) -> OperationResult {
        let node = self.settings.net_root.join(&self.settings.channel);
        if !node.exists() {
            return OperationResult::failure(format!(
                "CAN channel '{}' not found at {}",
                self.settings.channel,
                node.display()
            ));
        }
        self.ready = true;
        info!(channel = %self.settings.channel, bitrate = self.settings.bitrate, "CAN channel present");
        OperationResult::ok().with_log(format!(
            "CAN channel {} at {} bit/s{}",
            self.settings.channel,
            self.settings.bitrate,
            if self.settings.fd_enabled { " (FD)" } else { "" }
        ))
    }

    fn cleanup(&mut self) -> OperationResult {
        self.ready = false;
        self.filters.clear();
        OperationResult::ok()
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn can_bus(&mut self) -> Option<&mut dyn CanBus> {
        Some(self)
    }
}

impl CanBus for CanAdapter {
    fn send(&mut self, frame: &CanFrame) -> OperationResult {
        if !self.ready {
            return OperationResult::failure("CAN bus not initialized");
        }
        OperationResult::failure(format!(
            "cannot transmit id 0x{:X} on {}: no raw CAN socket backend in this build",
            frame.id, self.settings.channel
        ))
    }

    fn receive(&mut self, _timeout: Option<Duration>) -> Option<CanFrame> {
        None
    }

    fn add_filter(&mut self, id: u32, mask: u32) -> OperationResult {
        self.filters.push((id, mask));
        OperationResult::ok()
    }

    fn clear_filters(&mut self) -> OperationResult {
        self.filters.clear();
        OperationResult::ok()
    }

    fn filters(&self) -> Vec<u32> {
        self.filters.iter().map(|(id, _)| *id).collect()
    }
}

/// Simulated CAN bus.
///
/// Every accepted frame queues a response with id `+0x08` and each data byte
/// incremented by one, the way a request/response ECU would answer.
#[derive(Debug)]
pub struct MockCanAdapter {
    channel: String,
    filters: Vec<Filter>,
    queue: VecDeque<CanFrame>,
    sent: usize,
    received: usize,
    ready: bool,
}

impl MockCanAdapter {
    pub fn from_config(config: &InterfaceConfig) -> Result<Self, AdapterError> {
        let settings = settings(config)?;
        Ok(Self {
            channel: settings.channel,
            filters: Vec::new(),
            queue: VecDeque::new(),
            sent: 0,
            received: 0,
            ready: false,
        })
    }

    pub fn sent_count(&self) -> usize {
        self.sent
    }

    pub fn received_count(&self) -> usize {
        self.received
    }

    /// Drops queued responses, returning how many there were.
    pub fn flush(&mut self) -> usize {
        let count = self.queue.len();
        self.queue.clear();
        count
    }
}

impl Adapter for MockCanAdapter {
    fn interface(&self) -> &str {
        INTERFACE
    }

    fn variant(&self) -> AdapterVariant {
        AdapterVariant::Mock
    }

    fn initialize(&mut self) -> OperationResult {
        self.ready = true;
        info!(channel = %self.channel, "mock CAN initialized");
        OperationResult::ok().with_log("Mock CAN interface initialized")
    }

    fn cleanup(&mut self) -> OperationResult {
        self.ready = false;
        self.queue.clear();
        OperationResult::ok()
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn can_bus(&mut self) -> Option<&mut dyn CanBus> {
        Some(self)
    }
}

impl CanBus for MockCanAdapter {
    fn send(&mut self, frame: &CanFrame) -> OperationResult {
        if !self.ready {
            return OperationResult::failure("Mock CAN not initialized");
        }
        self.sent += 1;
        debug!(id = frame.id, data = ?frame.data, "mock CAN TX");

        let response = CanFrame {
            id: frame.id.wrapping_add(MOCK_RESPONSE_OFFSET),
            data: frame.data.iter().map(|b| b.wrapping_add(1)).collect(),
            extended: frame.extended,
        };
        if accepts(&self.filters, response.id) {
            self.queue.push_back(response);
        }

        OperationResult::ok_with(json!({ "id": frame.id, "dlc": frame.data.len() }))
            .with_log(format!("Mock sent ID 0x{:X}", frame.id))
    }

    fn receive(&mut self, _timeout: Option<Duration>) -> Option<CanFrame> {
        if !self.ready {
            return None;
        }
        let frame = self.queue.pop_front()?;
        self.received += 1;
        Some(frame)
    }

    fn add_filter(&mut self, id: u32, mask: u32) -> OperationResult {
        self.filters.push((id, mask));
        OperationResult::ok()
    }

    fn clear_filters(&mut self) -> OperationResult {
        self.filters.clear();
        OperationResult::ok()
    }

    fn filters(&self) -> Vec<u32> {
        self.filters.iter().map(|(id, _)| *id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mock() -> MockCanAdapter {
        let mut adapter =
            MockCanAdapter::from_config(&InterfaceConfig::new("can", "mock")).unwrap();
        assert!(adapter.initialize().is_success());
        adapter
    }

    #[test]
    fn test_mock_echoes_incremented_response() {
        let mut can = mock();
        let result = can.send(&CanFrame::new(0x7E0, [0x02, 0x10, 0xFF]));
        assert!(result.is_success());
        assert_eq!(result.data, Some(json!({ "id": 0x7E0, "dlc": 3 })));

        let response = can.receive(Some(Duration::from_millis(10))).unwrap();
        assert_eq!(response.id, 0x7E8);
        assert_eq!(response.data, vec![0x03, 0x11, 0x00]);
        assert!(can.receive(None).is_none());
        assert_eq!((can.sent_count(), can.received_count()), (1, 1));
    }

    #[test]
    fn test_mock_filters_drop_unmatched_responses() {
        let mut can = mock();
        can.add_filter(0x108, 0x7FF);
        assert_eq!(can.filters(), vec![0x108]);

        can.send(&CanFrame::new(0x200, [1]));
        assert!(can.receive(None).is_none());
        can.send(&CanFrame::new(0x100, [1]));
        assert_eq!(can.receive(None).map(|f| f.id), Some(0x108));

        can.clear_filters();
        assert!(can.filters().is_empty());
    }

    #[test]
    fn test_mock_requires_initialize() {
        let mut can = MockCanAdapter::from_config(&InterfaceConfig::new("can", "mock")).unwrap();
        let result = can.send(&CanFrame::new(0x100, [0]));
        assert!(!result.is_success());
        assert_eq!(result.error_message(), "Mock CAN not initialized");
        assert!(!can.is_ready());
    }

    #[test]
    fn test_live_checks_channel_node() {
        let net = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(net.path().join("can0")).unwrap();

        let config = InterfaceConfig::new("can", "socketcan")
            .with_param("channel", "can0")
            .with_param("net_root", net.path().to_string_lossy().into_owned());
        let mut present = CanAdapter::from_config(&config).unwrap();
        assert!(present.initialize().is_success());
        assert!(present.is_ready());

        let config = InterfaceConfig::new("can", "socketcan")
            .with_param("channel", "can9")
            .with_param("net_root", net.path().to_string_lossy().into_owned());
        let mut absent = CanAdapter::from_config(&config).unwrap();
        let result = absent.initialize();
        assert!(!result.is_success());
        assert!(result.error_message().contains("can9"));
    }

    #[test]
    fn test_bad_parameter_shape_is_invalid_config() {
        let config = InterfaceConfig::new("can", "socketcan").with_param("bitrate", "fast");
        assert!(matches!(
            CanAdapter::from_config(&config),
            Err(AdapterError::InvalidConfig { .. })
        ));
    }
}
