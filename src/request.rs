//! Typed requests.
//!
//! A [`Request`] pairs one [`Command`] with the decoding of its reply. Every
//! named client method (`power_on`, `get_video_status_parsed`, ...) is a thin
//! wrapper that builds one of these and hands it to `execute`, which is
//! shared by the tokio and the blocking client.

use crate::{
    error::{Error, Result},
    protocol::{self, Command},
    types::{DeviceStatus, PortStates, RoutingMap},
};

/// A command plus the interpretation of its reply.
pub trait Request {
    /// Decoded reply type.
    type Output;

    /// Command to send. Port arguments are validated before anything is sent.
    fn command(&self) -> Command;

    /// Turn the trimmed reply text into the output.
    fn decode(&self, reply: String) -> Result<Self::Output>;
}

/// Send a command and return the trimmed reply as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query(pub Command);

impl Request for Query {
    type Output = String;

    fn command(&self) -> Command {
        self.0
    }

    fn decode(&self, reply: String) -> Result<String> {
        Ok(reply)
    }
}

/// Send a command that must be acknowledged; returns the acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledged(pub Command);

impl Request for Acknowledged {
    type Output = String;

    fn command(&self) -> Command {
        self.0
    }

    fn decode(&self, reply: String) -> Result<String> {
        protocol::acknowledge(&self.0, reply)
    }
}

/// Route `input` to `output`.
///
/// Besides the usual acknowledgement rule, a reply that reports the output
/// on a different input is a rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// Input port (1-indexed).
    pub input: u8,
    /// Output port (1-indexed).
    pub output: u8,
}

impl Request for Route {
    type Output = String;

    fn command(&self) -> Command {
        Command::Route {
            input: self.input,
            output: self.output,
        }
    }

    fn decode(&self, reply: String) -> Result<String> {
        let command = self.command();
        let reply = protocol::acknowledge(&command, reply)?;

        let contradicted = reply
            .lines()
            .filter_map(protocol::routing_line)
            .any(|(output, input)| output == self.output && input != self.input);
        if contradicted {
            return Err(Error::rejected(command.wire(), reply));
        }
        Ok(reply)
    }
}

/// `STA_VIDEO.` parsed into a [`RoutingMap`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VideoRouting;

impl Request for VideoRouting {
    type Output = RoutingMap;

    fn command(&self) -> Command {
        Command::VideoStatus
    }

    fn decode(&self, reply: String) -> Result<RoutingMap> {
        protocol::parse_video_status(&reply)
    }
}

/// Which per-port status to query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PortQuery {
    /// `STA_PHDBT.`
    HdbtPower,
    /// `STA_IN.`
    Inputs,
    /// `STA_OUT.`
    Outputs,
    /// `STA_HDCP.`
    Hdcp,
    /// `STA_DS.`
    Downscaling,
}

impl PortQuery {
    /// Command that answers this query.
    #[must_use]
    pub fn command(self) -> Command {
        match self {
            Self::HdbtPower => Command::HdbtPowerStatus,
            Self::Inputs => Command::InputStatus,
            Self::Outputs => Command::OutputStatus,
            Self::Hdcp => Command::HdcpStatus,
            Self::Downscaling => Command::DownscalingStatus,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::HdbtPower => "hdbt power status",
            Self::Inputs => "input status",
            Self::Outputs => "output status",
            Self::Hdcp => "hdcp status",
            Self::Downscaling => "downscaling status",
        }
    }
}

/// A per-port status query parsed into [`PortStates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortStatus(pub PortQuery);

impl Request for PortStatus {
    type Output = PortStates;

    fn command(&self) -> Command {
        self.0.command()
    }

    fn decode(&self, reply: String) -> Result<PortStates> {
        protocol::parse_port_states(&reply, self.0.label())
    }
}

/// `STA.` parsed into a [`DeviceStatus`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStatusQuery;

impl Request for DeviceStatusQuery {
    type Output = DeviceStatus;

    fn command(&self) -> Command {
        Command::Status
    }

    fn decode(&self, reply: String) -> Result<DeviceStatus> {
        protocol::parse_device_status(&reply)
    }
}
