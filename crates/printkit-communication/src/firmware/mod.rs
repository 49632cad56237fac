//! Firmware dialect implementations
//!
//! A dialect is the firmware-specific strategy for recognising replies and
//! encoding outgoing lines. Dialects are statically registered by name, with
//! optional runtime registration; firmware auto-detection matches registered
//! names against the device's `M115` reply.

pub mod marlin;
pub mod repetier;

pub use marlin::MarlinDialect;
pub use repetier::RepetierDialect;

use printkit_core::Temperature;
use std::sync::Arc;

/// Classification of a single inbound reply line
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyKind {
    /// Acknowledgement: the firmware is ready for the next command
    Ack,
    /// The firmware is idle; not an acknowledgement of a specific command
    Wait,
    /// A parsed temperature report
    TemperatureReport(Temperature),
    /// Anything else; forwarded to observers only
    Other,
}

/// Capability set implemented by each firmware dialect
pub trait FirmwareDialect: Send + Sync {
    /// Stable identifier used for discovery and selection
    fn name(&self) -> &str;

    /// Final on-wire form of an outgoing line
    fn encode(&self, line: &str) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(line.len() + 1);
        bytes.extend_from_slice(line.as_bytes());
        bytes.push(b'\n');
        bytes
    }

    /// Classify an inbound reply line
    fn classify(&self, reply: &str) -> ReplyKind;

    /// Whether a reply also acknowledges the in-flight command
    ///
    /// A temperature report produced in answer to a poll carries its
    /// acknowledgement in the same line; dialects whose reports embed the
    /// ack token override this so the pipeline does not stall on polls.
    fn is_acknowledgement(&self, reply: &str) -> bool {
        matches!(self.classify(reply), ReplyKind::Ack)
    }
}

/// Registry of available firmware dialects
///
/// Holds the built-in set plus any dialects registered at runtime.
/// Lookup is by case-insensitive name; detection is a case-insensitive
/// substring match of registered names against a reply line.
pub struct DialectRegistry {
    dialects: Vec<Arc<dyn FirmwareDialect>>,
}

impl DialectRegistry {
    /// Create a registry holding the built-in dialects
    pub fn with_builtin() -> Self {
        Self {
            dialects: vec![
                Arc::new(RepetierDialect::new()),
                Arc::new(MarlinDialect::new()),
            ],
        }
    }

    /// Register an additional dialect
    ///
    /// A dialect with the same name replaces the earlier registration.
    pub fn register(&mut self, dialect: Arc<dyn FirmwareDialect>) {
        self.dialects
            .retain(|d| !d.name().eq_ignore_ascii_case(dialect.name()));
        self.dialects.push(dialect);
    }

    /// Names of all registered dialects
    pub fn names(&self) -> Vec<String> {
        self.dialects.iter().map(|d| d.name().to_string()).collect()
    }

    /// Look up a dialect by case-insensitive name
    pub fn get(&self, name: &str) -> Option<Arc<dyn FirmwareDialect>> {
        self.dialects
            .iter()
            .find(|d| d.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Match a reply line against registered dialect names
    pub fn detect(&self, reply: &str) -> Option<Arc<dyn FirmwareDialect>> {
        let lowered = reply.to_ascii_lowercase();
        self.dialects
            .iter()
            .find(|d| lowered.contains(&d.name().to_ascii_lowercase()))
            .cloned()
    }
}

impl Default for DialectRegistry {
    fn default() -> Self {
        Self::with_builtin()
    }
}
