//! Serial port channel implementation

use crate::core::port::{ByteStreamPort, DataReadyHook, PortError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Poll cadence of the watcher thread that synthesizes "bytes ready"
/// notifications from the pull-only serial API.
const WATCH_INTERVAL: Duration = Duration::from_millis(5);

/// Serial port parity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SerialParity {
    /// No parity
    #[default]
    None,
    /// Odd parity
    Odd,
    /// Even parity
    Even,
}

impl std::str::FromStr for SerialParity {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "odd" | "o" => Ok(Self::Odd),
            "even" | "e" => Ok(Self::Even),
            _ => Ok(Self::None),
        }
    }
}

/// Serial port configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g., COM3, /dev/ttyUSB0)
    pub port: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Data bits (5, 6, 7, 8)
    pub data_bits: u8,
    /// Stop bits (1, 2)
    pub stop_bits: u8,
    /// Parity
    pub parity: SerialParity,
}

impl SerialConfig {
    /// Create a new serial configuration with 8N1 framing
    pub fn new(port: &str, baud_rate: u32) -> Self {
        Self {
            port: port.to_string(),
            baud_rate,
            data_bits: 8,
            stop_bits: 1,
            parity: SerialParity::None,
        }
    }

    /// Set data bits
    #[must_use]
    pub fn data_bits(mut self, bits: u8) -> Self {
        self.data_bits = bits;
        self
    }

    /// Set stop bits
    #[must_use]
    pub fn stop_bits(mut self, bits: u8) -> Self {
        self.stop_bits = bits;
        self
    }

    /// Set parity
    #[must_use]
    pub fn parity(mut self, parity: SerialParity) -> Self {
        self.parity = parity;
        self
    }

    fn describe(&self) -> String {
        format!(
            "{} @ {} baud ({}{}{})",
            self.port,
            self.baud_rate,
            self.data_bits,
            match self.parity {
                SerialParity::None => "N",
                SerialParity::Odd => "O",
                SerialParity::Even => "E",
            },
            self.stop_bits,
        )
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new("COM1", 9600)
    }
}

struct Watcher {
    stop: crossbeam_channel::Sender<()>,
    handle: JoinHandle<()>,
}

/// Serial port channel
///
/// Wraps a `serialport` handle behind [`ByteStreamPort`]. A watcher thread
/// converts the pull-only serial API into the edge-triggered "bytes became
/// available" hook: it fires once whenever the inbound count rises from zero.
pub struct SerialChannel {
    config: Mutex<SerialConfig>,
    port: Arc<Mutex<Option<Box<dyn SerialPort + Send>>>>,
    hook: Arc<Mutex<Option<DataReadyHook>>>,
    watcher: Mutex<Option<Watcher>>,
}

impl SerialChannel {
    /// Create a channel for `config`; the port stays closed until
    /// [`ByteStreamPort::open`] is called.
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config: Mutex::new(config),
            port: Arc::new(Mutex::new(None)),
            hook: Arc::new(Mutex::new(None)),
            watcher: Mutex::new(None),
        }
    }

    /// Replace the port configuration, closing the port first if it is open.
    pub fn reconfigure(&self, config: SerialConfig) {
        self.close();
        *self.config.lock() = config;
    }

    /// Current configuration.
    pub fn config(&self) -> SerialConfig {
        self.config.lock().clone()
    }

    /// Human-readable connection summary.
    pub fn connection_info(&self) -> String {
        self.config.lock().describe()
    }

    fn spawn_watcher(&self) -> Result<(), PortError> {
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let port = Arc::clone(&self.port);
        let hook = Arc::clone(&self.hook);
        let handle = thread::Builder::new()
            .name("sertalk-ready-watch".into())
            .spawn(move || watch_loop(&stop_rx, &port, &hook))?;
        *self.watcher.lock() = Some(Watcher {
            stop: stop_tx,
            handle,
        });
        Ok(())
    }
}

fn watch_loop(
    stop: &crossbeam_channel::Receiver<()>,
    port: &Mutex<Option<Box<dyn SerialPort + Send>>>,
    hook: &Mutex<Option<DataReadyHook>>,
) {
    let mut last = 0usize;
    loop {
        match stop.recv_timeout(WATCH_INTERVAL) {
            Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
        }
        let available = {
            let guard = port.lock();
            match guard.as_ref() {
                Some(handle) => handle.bytes_to_read().map_or(0, |n| n as usize),
                None => break,
            }
        };
        if last == 0 && available > 0 {
            let ready = hook.lock().clone();
            if let Some(ready) = ready {
                ready();
            }
        }
        last = available;
    }
}

impl ByteStreamPort for SerialChannel {
    fn open(&self) -> Result<(), PortError> {
        // Reopening closes the previous handle first, as the historical
        // implementation did.
        self.close();

        let config = self.config.lock().clone();

        let data_bits = match config.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            _ => DataBits::Eight,
        };
        let stop_bits = match config.stop_bits {
            2 => StopBits::Two,
            _ => StopBits::One,
        };
        let parity = match config.parity {
            SerialParity::Odd => Parity::Odd,
            SerialParity::Even => Parity::Even,
            SerialParity::None => Parity::None,
        };

        let handle = serialport::new(&config.port, config.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => PortError::NotFound(config.port.clone()),
                serialport::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => {
                    PortError::PermissionDenied(config.port.clone())
                }
                _ => PortError::Io(e.into()),
            })?;

        *self.port.lock() = Some(handle);
        self.spawn_watcher()?;

        tracing::info!("opened {}", config.describe());
        Ok(())
    }

    fn close(&self) {
        if let Some(watcher) = self.watcher.lock().take() {
            drop(watcher.stop);
            let _ = watcher.handle.join();
        }
        *self.port.lock() = None;
    }

    fn is_open(&self) -> bool {
        self.port.lock().is_some()
    }

    fn write_all(&self, bytes: &[u8]) -> Result<(), PortError> {
        let mut guard = self.port.lock();
        let handle = guard.as_mut().ok_or(PortError::NotOpen)?;
        handle.write_all(bytes).map_err(PortError::Io)?;
        handle.flush().map_err(PortError::Io)?;
        Ok(())
    }

    fn bytes_available(&self) -> Result<usize, PortError> {
        let guard = self.port.lock();
        let handle = guard.as_ref().ok_or(PortError::NotOpen)?;
        let count = handle
            .bytes_to_read()
            .map_err(|e| PortError::Io(e.into()))?;
        Ok(count as usize)
    }

    fn read_available(&self, max: usize) -> Result<Vec<u8>, PortError> {
        let mut guard = self.port.lock();
        let handle = guard.as_mut().ok_or(PortError::NotOpen)?;
        let mut buffer = vec![0u8; max];
        match handle.read(&mut buffer) {
            Ok(n) => {
                buffer.truncate(n);
                Ok(buffer)
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(PortError::Io(e)),
        }
    }

    fn discard_inbound(&self) -> Result<(), PortError> {
        let guard = self.port.lock();
        let handle = guard.as_ref().ok_or(PortError::NotOpen)?;
        handle
            .clear(ClearBuffer::Input)
            .map_err(|e| PortError::Io(e.into()))
    }

    fn set_data_ready_hook(&self, hook: DataReadyHook) {
        *self.hook.lock() = Some(hook);
    }
}

impl Drop for SerialChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// List the names of the serial ports available on this system.
pub fn available_ports() -> Result<Vec<String>, PortError> {
    let ports = serialport::available_ports().map_err(|e| PortError::Io(e.into()))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_9600_8n1() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 9600);
        assert_eq!(config.data_bits, 8);
        assert_eq!(config.stop_bits, 1);
        assert_eq!(config.parity, SerialParity::None);
    }

    #[test]
    fn test_config_builder() {
        let config = SerialConfig::new("/dev/ttyUSB0", 115_200)
            .data_bits(7)
            .stop_bits(2)
            .parity(SerialParity::Even);
        assert_eq!(config.describe(), "/dev/ttyUSB0 @ 115200 baud (7E2)");
    }

    #[test]
    fn test_parity_from_str() {
        assert_eq!("odd".parse::<SerialParity>(), Ok(SerialParity::Odd));
        assert_eq!("E".parse::<SerialParity>(), Ok(SerialParity::Even));
        assert_eq!("none".parse::<SerialParity>(), Ok(SerialParity::None));
        assert_eq!("bogus".parse::<SerialParity>(), Ok(SerialParity::None));
    }

    #[test]
    fn test_closed_channel_refuses_io() {
        let channel = SerialChannel::new(SerialConfig::default());
        assert!(!channel.is_open());
        assert!(matches!(channel.write_all(b"x"), Err(PortError::NotOpen)));
        assert!(matches!(channel.bytes_available(), Err(PortError::NotOpen)));
    }
}
