//! Marlin dialect
//!
//! Marlin speaks the same ok/wait acknowledgement protocol and temperature
//! report format as Repetier, so the reply classification is shared. The
//! dialect exists as its own name for detection against Marlin's
//! `FIRMWARE_NAME` banner.

use super::repetier::{classify_reply, contains_token};
use super::{FirmwareDialect, ReplyKind};

/// Marlin firmware dialect
#[derive(Debug, Default)]
pub struct MarlinDialect;

impl MarlinDialect {
    /// Create the dialect
    pub fn new() -> Self {
        Self
    }
}

impl FirmwareDialect for MarlinDialect {
    fn name(&self) -> &str {
        "Marlin"
    }

    fn classify(&self, reply: &str) -> ReplyKind {
        classify_reply(reply)
    }

    fn is_acknowledgement(&self, reply: &str) -> bool {
        contains_token(reply, "ok")
    }
}
