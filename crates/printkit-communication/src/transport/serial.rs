//! Serial port transport
//!
//! Provides port enumeration and the serial implementation of [`Transport`]:
//! a blocking reader thread frames inbound bytes into lines and forwards
//! them over a channel; writes go through the shared port handle.

use super::{LineFramer, PortEnumerator, Transport};
use parking_lot::Mutex;
use printkit_core::TransportError;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Valid baud speeds for printer connections
pub const BAUD_RATES: &[u32] = &[9600, 19200, 38400, 57600, 115200, 250000];

/// Read timeout for the blocking reader thread
const READ_TIMEOUT: Duration = Duration::from_millis(10);

/// List available serial ports on the system
///
/// Returns the names of ports matching printer controller patterns:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Vec<String> {
    match serialport::available_ports() {
        Ok(ports) => ports
            .iter()
            .map(|port| port.port_name.clone())
            .filter(|name| is_valid_printer_port(name))
            .collect(),
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Vec::new()
        }
    }
}

/// Check if a port name matches printer controller patterns
fn is_valid_printer_port(port_name: &str) -> bool {
    if port_name.starts_with("COM") && port_name[3..].chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    if port_name.starts_with("/dev/ttyUSB") || port_name.starts_with("/dev/ttyACM") {
        return true;
    }

    if port_name.starts_with("/dev/cu.usbserial-") || port_name.starts_with("/dev/cu.usbmodem") {
        return true;
    }

    false
}

/// System port enumerator backed by [`list_ports`]
pub struct SystemPorts;

impl PortEnumerator for SystemPorts {
    fn ports(&self) -> Vec<String> {
        list_ports()
    }
}

/// Serial transport backed by the `serialport` crate
pub struct SerialTransport {
    port: Arc<Mutex<Box<dyn serialport::SerialPort>>>,
    closed: Arc<AtomicBool>,
    lines: Option<mpsc::UnboundedReceiver<Vec<u8>>>,
}

impl SerialTransport {
    /// Open `port` at `baud` and start the reader thread
    pub fn open(port_name: &str, baud: u32) -> Result<Self, TransportError> {
        let port = serialport::new(port_name, baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| map_open_error(port_name, e))?;

        let reader = port.try_clone().map_err(|e| TransportError::Io {
            reason: e.to_string(),
        })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let reader_closed = closed.clone();

        std::thread::Builder::new()
            .name(format!("printkit-read-{}", port_name))
            .spawn(move || read_loop(reader, tx, reader_closed))
            .map_err(|e| TransportError::Io {
                reason: e.to_string(),
            })?;

        Ok(Self {
            port: Arc::new(Mutex::new(port)),
            closed,
            lines: Some(rx),
        })
    }
}

/// Blocking read loop: frame inbound bytes and forward complete lines
fn read_loop(
    mut reader: Box<dyn serialport::SerialPort>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
    closed: Arc<AtomicBool>,
) {
    let mut framer = LineFramer::new();
    let mut buf = [0u8; 1024];

    loop {
        if closed.load(Ordering::Relaxed) {
            break;
        }

        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                for line in framer.push(&buf[..n]) {
                    if tx.send(line).is_err() {
                        return;
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => {
                tracing::warn!("Serial read failed: {}", e);
                break;
            }
        }
    }
    // Dropping tx closes the line channel, which the scheduler treats as a
    // lost connection unless it initiated the close itself.
}

/// Map a `serialport` open failure onto the transport error taxonomy
fn map_open_error(port_name: &str, error: serialport::Error) -> TransportError {
    match error.kind() {
        serialport::ErrorKind::NoDevice => TransportError::NotFound {
            port: port_name.to_string(),
        },
        serialport::ErrorKind::Io(kind)
            if matches!(
                kind,
                std::io::ErrorKind::PermissionDenied | std::io::ErrorKind::AddrInUse
            ) =>
        {
            TransportError::Busy {
                port: port_name.to_string(),
            }
        }
        _ => TransportError::Io {
            reason: error.to_string(),
        },
    }
}

impl Transport for SerialTransport {
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(TransportError::Closed);
        }

        let mut port = self.port.lock();
        port.write_all(data)
            .and_then(|_| port.flush())
            .map_err(|e| TransportError::Io {
                reason: e.to_string(),
            })
    }

    fn take_lines(&mut self) -> Option<mpsc::UnboundedReceiver<Vec<u8>>> {
        self.lines.take()
    }

    fn close(&mut self) {
        self.closed.store(true, Ordering::Relaxed);
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baud_rates_are_canonical() {
        assert_eq!(BAUD_RATES, &[9600, 19200, 38400, 57600, 115200, 250000]);
    }

    #[test]
    fn printer_port_patterns() {
        assert!(is_valid_printer_port("COM3"));
        assert!(is_valid_printer_port("/dev/ttyUSB0"));
        assert!(is_valid_printer_port("/dev/ttyACM1"));
        assert!(is_valid_printer_port("/dev/cu.usbmodem14101"));
        assert!(!is_valid_printer_port("/dev/ttyS0"));
        assert!(!is_valid_printer_port("COMX"));
    }

    #[test]
    fn open_missing_port_is_not_found() {
        let result = SerialTransport::open("/dev/printkit-no-such-port", 115200);
        assert!(matches!(
            result,
            Err(TransportError::NotFound { .. }) | Err(TransportError::Io { .. })
        ));
    }
}
