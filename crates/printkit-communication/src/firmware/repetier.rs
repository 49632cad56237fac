//! Repetier dialect
//!
//! The baseline dialect for ok/wait flow control. Replies containing the
//! token `ok` or `wait` are acknowledgement-class; replies carrying `T:` or
//! `B:` fields are parsed as temperature reports. The textual protocol is
//! liberal in practice, so a malformed report degrades silently to `Other`
//! rather than stalling the pipeline.

use super::{FirmwareDialect, ReplyKind};
use printkit_core::Temperature;

/// Repetier firmware dialect
#[derive(Debug, Default)]
pub struct RepetierDialect;

impl RepetierDialect {
    /// Create the dialect
    pub fn new() -> Self {
        Self
    }
}

impl FirmwareDialect for RepetierDialect {
    fn name(&self) -> &str {
        "Repetier"
    }

    fn classify(&self, reply: &str) -> ReplyKind {
        classify_reply(reply)
    }

    fn is_acknowledgement(&self, reply: &str) -> bool {
        contains_token(reply, "ok")
    }
}

/// Shared ok/wait classification used by the Repetier-family dialects
pub(crate) fn classify_reply(reply: &str) -> ReplyKind {
    if reply.contains("T:") || reply.contains("B:") {
        return match parse_temperature_report(reply) {
            Some(report) => ReplyKind::TemperatureReport(report),
            None => {
                tracing::debug!("Malformed temperature report: {:?}", reply);
                ReplyKind::Other
            }
        };
    }

    if contains_token(reply, "ok") {
        return ReplyKind::Ack;
    }
    if contains_token(reply, "wait") {
        return ReplyKind::Wait;
    }

    ReplyKind::Other
}

/// Check for a whitespace-delimited token, case-insensitively
pub(crate) fn contains_token(line: &str, token: &str) -> bool {
    line.split_whitespace()
        .any(|t| t.eq_ignore_ascii_case(token))
}

/// Parse a report of the form `ok T:185.4 /185.0 B:60.5 /60.0`
///
/// Splits on whitespace, locates each token-prefixed field and its following
/// `/target` field. Returns `None` unless at least one complete
/// current/target pair parses.
pub(crate) fn parse_temperature_report(line: &str) -> Option<Temperature> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut report = Temperature::default();
    let mut found = false;

    for (i, token) in tokens.iter().enumerate() {
        if let Some(current) = token.strip_prefix("T:") {
            report.extruder_current = current.parse().ok()?;
            report.extruder_target = parse_target(tokens.get(i + 1))?;
            found = true;
        } else if let Some(current) = token.strip_prefix("B:") {
            report.bed_current = current.parse().ok()?;
            report.bed_target = parse_target(tokens.get(i + 1))?;
            found = true;
        }
    }

    found.then_some(report)
}

fn parse_target(token: Option<&&str>) -> Option<f32> {
    token?.strip_prefix('/')?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_ack_and_wait() {
        let dialect = RepetierDialect::new();
        assert_eq!(dialect.classify("ok"), ReplyKind::Ack);
        assert_eq!(dialect.classify("ok 0"), ReplyKind::Ack);
        assert_eq!(dialect.classify("wait"), ReplyKind::Wait);
        assert_eq!(dialect.classify("start"), ReplyKind::Other);
    }

    #[test]
    fn ack_requires_a_whole_token() {
        let dialect = RepetierDialect::new();
        assert_eq!(dialect.classify("tokamak"), ReplyKind::Other);
        assert_eq!(dialect.classify("X:12.00 Y:34.00 Z:0.20 E:5.00 ok"), ReplyKind::Ack);
    }

    #[test]
    fn parses_full_temperature_report() {
        let dialect = RepetierDialect::new();
        let expected = Temperature {
            extruder_current: 185.4,
            extruder_target: 185.0,
            bed_current: 60.5,
            bed_target: 60.0,
        };
        assert_eq!(
            dialect.classify("ok T:185.4 /185.0 B:60.5 /60.0"),
            ReplyKind::TemperatureReport(expected)
        );
    }

    #[test]
    fn parses_bed_only_report() {
        match classify_reply("B:60.0 /60.0") {
            ReplyKind::TemperatureReport(report) => {
                assert_eq!(report.bed_current, 60.0);
                assert_eq!(report.bed_target, 60.0);
                assert_eq!(report.extruder_current, 0.0);
            }
            other => panic!("unexpected classification: {:?}", other),
        }
    }

    #[test]
    fn malformed_report_degrades_to_other() {
        assert_eq!(classify_reply("ok T:garbage /185.0"), ReplyKind::Other);
        assert_eq!(classify_reply("T:185.4"), ReplyKind::Other);
        assert_eq!(classify_reply("T:185.4 185.0"), ReplyKind::Other);
    }

    #[test]
    fn parsing_is_idempotent() {
        let line = "ok T:201.3 /200.0 B:59.9 /60.0";
        let first = parse_temperature_report(line);
        let second = parse_temperature_report(line);
        assert!(first.is_some());
        assert_eq!(first, second);
    }
}
