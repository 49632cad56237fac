//! Data models for printer state, axes, units, and scheduler configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::str::FromStr;

/// States the printer can be in
///
/// Initial state is `Disconnected`. No state is terminal for a session;
/// every state can be left via an explicit action or a disconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrinterState {
    /// Not connected to a printer
    Disconnected,
    /// Attempting to connect, firmware not yet probed
    Connecting,
    /// Connected and ready for commands
    Idle,
    /// Printing or working
    Busy,
    /// A print job is paused
    Paused,
    /// The printer reported an error or an emergency stop was issued
    Error,
    /// Stopping a print and draining the queue
    Stopping,
    /// A print job is starting
    StartingPrint,
    /// A print job just finished
    FinishedPrint,
}

impl Default for PrinterState {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl fmt::Display for PrinterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Idle => write!(f, "Idle"),
            Self::Busy => write!(f, "Busy"),
            Self::Paused => write!(f, "Paused"),
            Self::Error => write!(f, "Error"),
            Self::Stopping => write!(f, "Stopping"),
            Self::StartingPrint => write!(f, "StartingPrint"),
            Self::FinishedPrint => write!(f, "FinishedPrint"),
        }
    }
}

impl PrinterState {
    /// True while a connection is held open
    pub fn is_connected(self) -> bool {
        !matches!(self, Self::Disconnected | Self::Connecting)
    }

    /// True in the states that permit outgoing traffic
    pub fn permits_dequeue(self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Busy | Self::Paused | Self::StartingPrint | Self::Stopping
        )
    }
}

/// Printer axes as a bit-flag set over {X, Y, Z, E}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Axis(u8);

impl Axis {
    /// No axes
    pub const NONE: Axis = Axis(0);
    /// X axis: X motor
    pub const X: Axis = Axis(1);
    /// Y axis: Y motor
    pub const Y: Axis = Axis(1 << 1);
    /// Z axis: Z motor
    pub const Z: Axis = Axis(1 << 2);
    /// E axis: extruder motor 0
    pub const E: Axis = Axis(1 << 3);

    /// Check whether all axes in `other` are set
    pub fn contains(self, other: Axis) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// True when no axis is set
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// The letters of the set axes, in X, Y, Z, E order
    pub fn letters(self) -> Vec<char> {
        [(Self::X, 'X'), (Self::Y, 'Y'), (Self::Z, 'Z'), (Self::E, 'E')]
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, letter)| *letter)
            .collect()
    }

    /// The letter of a single-axis value
    ///
    /// Returns `None` for an empty or multi-axis set.
    pub fn letter(self) -> Option<char> {
        let letters = self.letters();
        match letters.as_slice() {
            [single] => Some(*single),
            _ => None,
        }
    }
}

impl BitOr for Axis {
    type Output = Axis;

    fn bitor(self, rhs: Axis) -> Axis {
        Axis(self.0 | rhs.0)
    }
}

impl BitOrAssign for Axis {
    fn bitor_assign(&mut self, rhs: Axis) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "none");
        }
        for letter in self.letters() {
            write!(f, "{}", letter)?;
        }
        Ok(())
    }
}

/// Measurement units
///
/// Affects only the unit-selection command issued on change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    /// Metric units (millimeters)
    Metric,
    /// Imperial units (inches)
    Imperial,
}

impl Default for Units {
    fn default() -> Self {
        Self::Metric
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Metric => write!(f, "Metric"),
            Self::Imperial => write!(f, "Imperial"),
        }
    }
}

impl FromStr for Units {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "metric" | "mm" => Ok(Self::Metric),
            "imperial" | "inch" | "in" => Ok(Self::Imperial),
            _ => Err(format!("Unknown units: {}", s)),
        }
    }
}

/// Configuration for the session scheduler's periodic tickers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Milliseconds between serial port rescans; 0 disables the watcher
    pub serial_poll_interval_ms: u16,
    /// Milliseconds between command dispatch ticks
    pub command_tick_ms: u16,
    /// Milliseconds between temperature polls; 0 disables polling
    pub temperature_poll_ms: u16,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            serial_poll_interval_ms: 0,
            command_tick_ms: 100,
            temperature_poll_ms: 5000,
        }
    }
}
