//! Temperature record for the hotend and heated bed
//!
//! The record is written only by the firmware dialect's reply parser, on the
//! scheduler task. Observers receive copies via `temperature_changed` events.

use serde::{Deserialize, Serialize};

/// Current and target temperatures as last reported by the firmware
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    /// Current extruder temperature in °C
    pub extruder_current: f32,
    /// Target extruder temperature in °C
    pub extruder_target: f32,
    /// Current bed temperature in °C
    pub bed_current: f32,
    /// Target bed temperature in °C
    pub bed_target: f32,
}

impl Temperature {
    /// Apply a parsed report, returning true when any field changed
    pub fn apply(&mut self, report: Temperature) -> bool {
        let changed = *self != report;
        *self = report;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_reports_change() {
        let mut temp = Temperature::default();
        let report = Temperature {
            extruder_current: 185.4,
            extruder_target: 185.0,
            bed_current: 60.5,
            bed_target: 60.0,
        };
        assert!(temp.apply(report));
        assert_eq!(temp, report);
        // Re-applying an identical report is not a change.
        assert!(!temp.apply(report));
    }
}
