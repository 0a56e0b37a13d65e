use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// State of a single port as reported by one of the `STA_*` queries.
///
/// The device words vary per query (`ON`, `Connect`, `Enable`, `Link`, ...);
/// they all collapse to on/off here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    /// Powered, connected, enabled, or active.
    On,
    /// Unpowered, disconnected, disabled, or inactive.
    Off,
}

impl PortState {
    /// `true` for [`PortState::On`].
    #[must_use]
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl From<bool> for PortState {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

/// Port → state mapping parsed from a per-port status query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortStates(BTreeMap<u8, PortState>);

impl PortStates {
    /// Create an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// State of `port`, if reported.
    #[must_use]
    pub fn get(&self, port: u8) -> Option<PortState> {
        self.0.get(&port).copied()
    }

    /// Whether `port` was reported as on.
    #[must_use]
    pub fn is_on(&self, port: u8) -> bool {
        self.get(port).is_some_and(PortState::is_on)
    }

    /// Number of ports reported.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no port was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(port, state)` pairs in port order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, PortState)> + '_ {
        self.0.iter().map(|(p, s)| (*p, *s))
    }

    pub(crate) fn insert(&mut self, port: u8, state: PortState) {
        self.0.insert(port, state);
    }
}

impl FromIterator<(u8, PortState)> for PortStates {
    fn from_iter<T: IntoIterator<Item = (u8, PortState)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Flat record decoded from the `STA.` reply.
///
/// Every field is optional: the device firmware decides what it prints and
/// anything not recognised stays `None` / empty. `raw` always keeps the
/// trimmed reply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    /// Configured device name.
    pub name: Option<String>,
    /// Model / type identifier.
    pub device_type: Option<String>,
    /// Firmware version string.
    pub firmware_version: Option<String>,
    /// Main power state.
    pub power: Option<PortState>,
    /// Per-output enable state.
    #[serde(default)]
    pub outputs: PortStates,
    /// Per-port HDCP state.
    #[serde(default)]
    pub hdcp: PortStates,
    /// Per-output downscaling state.
    #[serde(default)]
    pub downscaling: PortStates,
    /// Trimmed reply text.
    pub raw: String,
}

impl DeviceStatus {
    pub(crate) fn has_fields(&self) -> bool {
        self.name.is_some()
            || self.device_type.is_some()
            || self.firmware_version.is_some()
            || self.power.is_some()
            || !self.outputs.is_empty()
            || !self.hdcp.is_empty()
            || !self.downscaling.is_empty()
    }
}
