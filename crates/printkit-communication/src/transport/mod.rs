//! Transport contract consumed by the session scheduler
//!
//! A transport is a bidirectional byte stream: writes go out whole or fail,
//! and inbound bytes are framed on newline and delivered in arrival order
//! over a channel. The serial implementation lives in [`serial`]; tests
//! substitute their own mock.

pub mod serial;

use printkit_core::TransportError;
use tokio::sync::mpsc;

/// A bidirectional line-oriented byte stream
pub trait Transport: Send {
    /// Write the full buffer to the device, or fail
    fn write(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Take the inbound line channel
    ///
    /// Lines are framed on `\n` with the terminator and any `\r` stripped.
    /// Yields `Some` exactly once; the scheduler takes the receiver when the
    /// session starts.
    fn take_lines(&mut self) -> Option<mpsc::UnboundedReceiver<Vec<u8>>>;

    /// Close the stream. Idempotent.
    fn close(&mut self);
}

/// Snapshot provider for the port watcher
pub trait PortEnumerator: Send {
    /// Names of the currently available ports
    fn ports(&self) -> Vec<String>;
}

/// Incremental newline framer for inbound bytes
///
/// Carries the unterminated tail between reads. `\r` bytes are stripped so
/// both `\n` and `\r\n` terminated streams frame identically.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    /// Create an empty framer
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every complete line they terminate
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut lines = Vec::new();
        for &byte in bytes {
            match byte {
                b'\n' => lines.push(std::mem::take(&mut self.buffer)),
                b'\r' => {}
                other => self.buffer.push(other),
            }
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_on_newline() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"ok T:2").is_empty());
        let lines = framer.push(b"00\nwait\n");
        assert_eq!(lines, vec![b"ok T:200".to_vec(), b"wait".to_vec()]);
    }

    #[test]
    fn strips_carriage_returns() {
        let mut framer = LineFramer::new();
        let lines = framer.push(b"ok\r\nstart\r\n");
        assert_eq!(lines, vec![b"ok".to_vec(), b"start".to_vec()]);
    }

    #[test]
    fn partial_line_is_held_back() {
        let mut framer = LineFramer::new();
        assert!(framer.push(b"echo: busy").is_empty());
        assert_eq!(framer.push(b"\n"), vec![b"echo: busy".to_vec()]);
    }
}
