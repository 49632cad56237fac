//! # printkit communication
//!
//! Serial transport, firmware dialects, and the printer session for
//! printkit. A [`Session`] opens a port, detects the firmware dialect in
//! use, paces command emission against the firmware's acknowledgements, and
//! surfaces state, temperature, and print progress as events.
//!
//! General workflow:
//! - Connect to a serial port with [`Session::open`]
//! - Let [`Session::detect_firmware`] pick the dialect, or load one by name
//! - Send commands to the device (`push_command`, `print`, ...)
//! - [`Session::close`] when you are all done

pub mod firmware;
pub mod job;
pub mod queue;
pub mod session;
pub mod transport;

pub use firmware::{DialectRegistry, FirmwareDialect, MarlinDialect, RepetierDialect, ReplyKind};
pub use job::PrintJob;
pub use queue::{CommandQueue, Priority, QueueEntry};
pub use session::Session;
pub use transport::serial::{list_ports, SerialTransport, SystemPorts, BAUD_RATES};
pub use transport::{LineFramer, PortEnumerator, Transport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Valid baud speeds for printer connections
pub fn list_bauds() -> Vec<u32> {
    BAUD_RATES.to_vec()
}

/// Names of the built-in firmware dialects
pub fn list_firmware_dialects() -> Vec<String> {
    DialectRegistry::with_builtin().names()
}
