//! Wire protocol of the matrix: command catalogue, port validation,
//! acknowledgement rule and reply parsers.
//!
//! Nothing in here performs I/O. Both the tokio and the blocking client feed
//! raw replies through the same functions, so they cannot disagree on what a
//! reply means.

mod parse;
pub(crate) mod reply;

use std::fmt;

use crate::error::{Error, Result};

pub use parse::{parse_device_status, parse_port_states, parse_video_status};
pub(crate) use parse::routing_line;

/// Highest port number the two-digit wire format can address.
pub const MAX_PORTS: u8 = 99;

/// A command understood by the matrix.
///
/// Every wire string already ends with the `.` the device uses as its
/// command terminator; nothing else is appended when sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Command {
    /// `PowerON.`
    PowerOn,
    /// `PowerOFF.`
    PowerOff,
    /// `/*Name.`
    Name,
    /// `/*Type.`
    Type,
    /// `/^Version.`
    Version,
    /// `STA.`
    Status,
    /// `STA_VIDEO.`
    VideoStatus,
    /// `STA_PHDBT.`
    HdbtPowerStatus,
    /// `STA_IN.`
    InputStatus,
    /// `STA_OUT.`
    OutputStatus,
    /// `STA_HDCP.`
    HdcpStatus,
    /// `STA_DS.`
    DownscalingStatus,
    /// `OUT{output:02}:{input:02}.`
    Route {
        /// Input port (1-indexed).
        input: u8,
        /// Output port (1-indexed).
        output: u8,
    },
    /// `@OUT{output:02}.`
    OutputOn(u8),
    /// `$OUT{output:02}.`
    OutputOff(u8),
}

impl Command {
    /// The exact ASCII text sent to the device.
    #[must_use]
    pub fn wire(&self) -> String {
        match self {
            Self::PowerOn => "PowerON.".to_string(),
            Self::PowerOff => "PowerOFF.".to_string(),
            Self::Name => "/*Name.".to_string(),
            Self::Type => "/*Type.".to_string(),
            Self::Version => "/^Version.".to_string(),
            Self::Status => "STA.".to_string(),
            Self::VideoStatus => "STA_VIDEO.".to_string(),
            Self::HdbtPowerStatus => "STA_PHDBT.".to_string(),
            Self::InputStatus => "STA_IN.".to_string(),
            Self::OutputStatus => "STA_OUT.".to_string(),
            Self::HdcpStatus => "STA_HDCP.".to_string(),
            Self::DownscalingStatus => "STA_DS.".to_string(),
            Self::Route { input, output } => format!("OUT{output:02}:{input:02}."),
            Self::OutputOn(output) => format!("@OUT{output:02}."),
            Self::OutputOff(output) => format!("$OUT{output:02}."),
        }
    }

    /// Check port arguments against the device layout.
    pub fn validate(&self, layout: PortLayout) -> Result<()> {
        match *self {
            Self::Route { input, output } => {
                layout.check_input(input)?;
                layout.check_output(output)
            }
            Self::OutputOn(output) | Self::OutputOff(output) => layout.check_output(output),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire())
    }
}

/// Number of inputs and outputs of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortLayout {
    inputs: u8,
    outputs: u8,
}

impl PortLayout {
    /// Create a layout; both counts must be in `1..=99`.
    pub fn new(inputs: u8, outputs: u8) -> Result<Self> {
        for (label, count) in [("input", inputs), ("output", outputs)] {
            if !(1..=MAX_PORTS).contains(&count) {
                return Err(Error::validation(format!(
                    "{label} count must be between 1 and {MAX_PORTS}, got {count}"
                )));
            }
        }
        Ok(Self { inputs, outputs })
    }

    /// Number of HDMI inputs.
    #[must_use]
    pub const fn inputs(self) -> u8 {
        self.inputs
    }

    /// Number of HDMI outputs.
    #[must_use]
    pub const fn outputs(self) -> u8 {
        self.outputs
    }

    pub(crate) fn check_input(self, input: u8) -> Result<()> {
        if (1..=self.inputs).contains(&input) {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "input must be between 1 and {}, got {input}",
                self.inputs
            )))
        }
    }

    pub(crate) fn check_output(self, output: u8) -> Result<()> {
        if (1..=self.outputs).contains(&output) {
            Ok(())
        } else {
            Err(Error::validation(format!(
                "output must be between 1 and {}, got {output}",
                self.outputs
            )))
        }
    }
}

impl Default for PortLayout {
    fn default() -> Self {
        Self {
            inputs: 4,
            outputs: 4,
        }
    }
}

const REJECTION_MARKERS: [&str; 4] = ["error", "fail", "invalid", "unknown"];

/// Accept `reply` as an acknowledgement of `command` or reject it.
///
/// The firmware has no fixed OK token; anything non-empty that does not
/// complain counts.
pub(crate) fn acknowledge(command: &Command, reply: String) -> Result<String> {
    let lower = reply.to_ascii_lowercase();
    if reply.is_empty() || REJECTION_MARKERS.iter().any(|m| lower.contains(m)) {
        return Err(Error::rejected(command.wire(), reply));
    }
    Ok(reply)
}
