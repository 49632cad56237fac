//! Static G/M-code catalogue
//!
//! A pure mapping of the opcodes this library emits to their textual forms
//! and human-readable descriptions. Built once; no mutable state.

use std::fmt;

/// Motion-class commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GCommand {
    G0,
    G1,
    G20,
    G21,
    G28,
    G90,
    G91,
}

/// Machine-class commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MCommand {
    M84,
    M104,
    M105,
    M106,
    M109,
    M112,
    M114,
    M115,
    M117,
    M140,
    M190,
    M220,
    M221,
}

fn build_command(code: &'static str, args: &[&str]) -> String {
    let mut line = String::from(code);
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

impl GCommand {
    /// The opcode text, e.g. `G28`
    pub fn code(self) -> &'static str {
        match self {
            Self::G0 => "G0",
            Self::G1 => "G1",
            Self::G20 => "G20",
            Self::G21 => "G21",
            Self::G28 => "G28",
            Self::G90 => "G90",
            Self::G91 => "G91",
        }
    }

    /// The command line to send, with `args` appended space-separated
    pub fn command(self, args: &[&str]) -> String {
        build_command(self.code(), args)
    }

    /// Human-readable description of the command
    pub fn description(self) -> &'static str {
        match self {
            Self::G0 => "Rapid linear move",
            Self::G1 => "Linear move",
            Self::G20 => "Set units to inches",
            Self::G21 => "Set units to millimeters",
            Self::G28 => "Move to origin (home)",
            Self::G90 => "Set to absolute positioning",
            Self::G91 => "Set to relative positioning",
        }
    }
}

impl MCommand {
    /// The opcode text, e.g. `M105`
    pub fn code(self) -> &'static str {
        match self {
            Self::M84 => "M84",
            Self::M104 => "M104",
            Self::M105 => "M105",
            Self::M106 => "M106",
            Self::M109 => "M109",
            Self::M112 => "M112",
            Self::M114 => "M114",
            Self::M115 => "M115",
            Self::M117 => "M117",
            Self::M140 => "M140",
            Self::M190 => "M190",
            Self::M220 => "M220",
            Self::M221 => "M221",
        }
    }

    /// The command line to send, with `args` appended space-separated
    pub fn command(self, args: &[&str]) -> String {
        build_command(self.code(), args)
    }

    /// Human-readable description of the command
    pub fn description(self) -> &'static str {
        match self {
            Self::M84 => "Stop idle hold",
            Self::M104 => "Set extruder temperature",
            Self::M105 => "Get extruder temperature",
            Self::M106 => "Fan on",
            Self::M109 => "Set extruder temperature and wait",
            Self::M112 => "Emergency stop",
            Self::M114 => "Get current position",
            Self::M115 => "Get firmware version and capabilities",
            Self::M117 => "Display message",
            Self::M140 => "Set bed temperature (fast)",
            Self::M190 => "Wait for bed temperature to reach target",
            Self::M220 => "Set speed factor override percentage",
            Self::M221 => "Set extrude factor override percentage",
        }
    }
}

impl fmt::Display for GCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl fmt::Display for MCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
