//! Serial/UART adapters.

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use benchtop_core::InterfaceConfig;
use benchtop_proto::{Adapter, AdapterError, AdapterVariant, OperationResult, SerialPort};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::registry::AdapterRegistration;

const INTERFACE: &str = "serial";

/// What the simulated device answers to any line request.
pub const MOCK_LINE_RESPONSE: &str = "OK\r\n";

pub(crate) fn registration() -> AdapterRegistration {
    AdapterRegistration::new(INTERFACE, create_live).with_mock(create_mock)
}

fn create_live(config: &InterfaceConfig) -> Result<Box<dyn Adapter>, AdapterError> {
    Ok(Box::new(SerialAdapter::from_config(config)?))
}

fn create_mock(config: &InterfaceConfig) -> Result<Box<dyn Adapter>, AdapterError> {
    Ok(Box::new(MockSerialAdapter::from_config(config)?))
}

#[derive(Debug, Deserialize)]
struct SerialSettings {
    #[serde(default)]
    port: Option<String>,
    #[serde(default = "default_baudrate")]
    baudrate: u32,
    /// Seconds.
    #[serde(default = "default_timeout")]
    timeout: f64,
}

fn default_baudrate() -> u32 {
    115_200
}

fn default_timeout() -> f64 {
    1.0
}

fn settings(config: &InterfaceConfig) -> Result<SerialSettings, AdapterError> {
    config.settings().map_err(|err| AdapterError::InvalidConfig {
        interface: config.name.clone(),
        message: err.to_string(),
    })
}

/// Lists the ports the OS reports, for the "device not found" message.
fn available_ports() -> String {
    match serialport::available_ports() {
        Ok(ports) if ports.is_empty() => "no serial ports detected".to_string(),
        Ok(ports) => {
            let names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
            format!("available: {}", names.join(", "))
        }
        Err(err) => format!("could not enumerate serial ports: {err}"),
    }
}

type PortReader = BufReader<Box<dyn serialport::SerialPort>>;

/// Serial adapter over a real UART.
///
/// The port is opened at the configured baud rate with the configured read
/// timeout. Line reads go through a buffered reader so bytes that arrive
/// after a newline stay available to the next `read`.
pub struct SerialAdapter {
    port: String,
    baudrate: u32,
    timeout: Duration,
    handle: Option<Mutex<PortReader>>,
}

impl fmt::Debug for SerialAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialAdapter")
            .field("port", &self.port)
            .field("baudrate", &self.baudrate)
            .field("timeout", &self.timeout)
            .field("open", &self.handle.is_some())
            .finish()
    }
}

impl SerialAdapter {
    pub fn from_config(config: &InterfaceConfig) -> Result<Self, AdapterError> {
        let settings = settings(config)?;
        let port = settings.port.ok_or_else(|| AdapterError::InvalidConfig {
            interface: config.name.clone(),
            message: "missing `port`".to_string(),
        })?;
        let timeout = Duration::try_from_secs_f64(settings.timeout).map_err(|err| {
            AdapterError::InvalidConfig {
                interface: config.name.clone(),
                message: format!("invalid `timeout`: {err}"),
            }
        })?;
        Ok(Self {
            port,
            baudrate: settings.baudrate,
            timeout,
            handle: None,
        })
    }
}

impl Adapter for SerialAdapter {
    fn interface(&self) -> &str {
        INTERFACE
    }

    fn variant(&self) -> AdapterVariant {
        AdapterVariant::Live
    }

    fn initialize(&mut self) -> OperationResult {
        if !Path::new(&self.port).exists() {
            return OperationResult::failure(format!(
                "serial port {} does not exist ({})",
                self.port,
                available_ports()
            ));
        }
        match serialport::new(self.port.as_str(), self.baudrate)
            .timeout(self.timeout)
            .open()
        {
            Ok(port) => {
                self.handle = Some(Mutex::new(BufReader::new(port)));
                info!(port = %self.port, baudrate = self.baudrate, "serial port opened");
                OperationResult::ok()
                    .with_log(format!("Opened {} at {} baud", self.port, self.baudrate))
            }
            Err(err) => OperationResult::failure(format!(
                "failed to open serial port {}: {err}",
                self.port
            )),
        }
    }

    fn cleanup(&mut self) -> OperationResult {
        self.handle = None;
        OperationResult::ok()
    }

    fn is_ready(&self) -> bool {
        self.handle.is_some()
    }

    fn serial_port(&mut self) -> Option<&mut dyn SerialPort> {
        Some(self)
    }
}

impl SerialPort for SerialAdapter {
    fn write(&mut self, data: &[u8]) -> OperationResult {
        let Some(handle) = self.handle.as_mut() else {
            return OperationResult::failure("serial port not open");
        };
        let handle = handle.get_mut().unwrap_or_else(PoisonError::into_inner);
        let port = handle.get_mut();
        match port.write_all(data).and_then(|()| port.flush()) {
            Ok(()) => OperationResult::ok_with(data.len()),
            Err(err) => OperationResult::failure(format!("serial write failed: {err}")),
        }
    }

    /// Returns `size` bytes, or an empty vector when they do not arrive
    /// within the port timeout.
    fn read(&mut self, size: usize) -> Option<Vec<u8>> {
        let handle = self.handle.as_mut()?;
        let handle = handle.get_mut().unwrap_or_else(PoisonError::into_inner);
        let mut buf = vec![0; size];
        match handle.read_exact(&mut buf) {
            Ok(()) => Some(buf),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Some(Vec::new()),
            Err(err) => {
                warn!(port = %self.port, error = %err, "serial read failed");
                None
            }
        }
    }

    fn read_line(&mut self, timeout: Option<Duration>) -> Option<String> {
        let handle = self.handle.as_mut()?;
        let handle = handle.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(timeout) = timeout {
            handle.get_mut().set_timeout(timeout).ok()?;
        }
        let mut line = String::new();
        let read = handle.read_line(&mut line);
        if timeout.is_some() {
            let _ = handle.get_mut().set_timeout(self.timeout);
        }
        match read {
            Ok(0) => None,
            Ok(_) => Some(line),
            Err(err) => {
                debug!(port = %self.port, error = %err, "serial line read ended");
                None
            }
        }
    }

    fn flush(&mut self) {
        if let Some(handle) = self.handle.as_mut() {
            let handle = handle.get_mut().unwrap_or_else(PoisonError::into_inner);
            let _ = handle.get_mut().flush();
        }
    }
}

/// Loopback serial port: written bytes become readable, and line reads
/// answer `OK\r\n`.
#[derive(Debug)]
pub struct MockSerialAdapter {
    port: String,
    buffer: Vec<u8>,
    ready: bool,
}

impl MockSerialAdapter {
    pub fn from_config(config: &InterfaceConfig) -> Result<Self, AdapterError> {
        let settings = settings(config)?;
        Ok(Self {
            port: settings
                .port
                .unwrap_or_else(|| "mock".to_string()),
            buffer: Vec::new(),
            ready: false,
        })
    }
}

impl Adapter for MockSerialAdapter {
    fn interface(&self) -> &str {
        INTERFACE
    }

    fn variant(&self) -> AdapterVariant {
        AdapterVariant::Mock
    }

    fn initialize(&mut self) -> OperationResult {
        self.ready = true;
        info!(port = %self.port, "mock serial initialized");
        OperationResult::ok().with_log("Mock serial initialized")
    }

    fn cleanup(&mut self) -> OperationResult {
        self.ready = false;
        self.buffer.clear();
        OperationResult::ok()
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn serial_port(&mut self) -> Option<&mut dyn SerialPort> {
        Some(self)
    }
}

impl SerialPort for MockSerialAdapter {
    fn write(&mut self, data: &[u8]) -> OperationResult {
        if !self.ready {
            return OperationResult::failure("Not initialized");
        }
        debug!(bytes = data.len(), "mock serial TX");
        self.buffer.extend_from_slice(data);
        OperationResult::ok_with(data.len())
    }

    /// Returns `size` bytes, or an empty vector when fewer are buffered.
    fn read(&mut self, size: usize) -> Option<Vec<u8>> {
        if !self.ready {
            return None;
        }
        if self.buffer.len() < size {
            return Some(Vec::new());
        }
        Some(self.buffer.drain(..size).collect())
    }

    fn read_line(&mut self, _timeout: Option<Duration>) -> Option<String> {
        self.ready.then(|| MOCK_LINE_RESPONSE.to_string())
    }

    fn flush(&mut self) {
        self.buffer.clear();
    }
}
