use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Output port → input port assignment currently active on the matrix.
///
/// Ports are 1-indexed. The map is rebuilt from the device on every query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoutingMap(BTreeMap<u8, u8>);

impl RoutingMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Input routed to `output`, if the device reported it.
    #[must_use]
    pub fn input_for(&self, output: u8) -> Option<u8> {
        self.0.get(&output).copied()
    }

    /// Outputs currently fed by `input`, in ascending order.
    pub fn outputs_for(&self, input: u8) -> impl Iterator<Item = u8> + '_ {
        self.0
            .iter()
            .filter(move |(_, i)| **i == input)
            .map(|(o, _)| *o)
    }

    /// Number of outputs reported.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no output was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate `(output, input)` pairs in output order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.0.iter().map(|(o, i)| (*o, *i))
    }

    /// Borrow the underlying map.
    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<u8, u8> {
        &self.0
    }

    pub(crate) fn insert(&mut self, output: u8, input: u8) {
        self.0.insert(output, input);
    }
}

impl From<BTreeMap<u8, u8>> for RoutingMap {
    fn from(map: BTreeMap<u8, u8>) -> Self {
        Self(map)
    }
}

impl FromIterator<(u8, u8)> for RoutingMap {
    fn from_iter<T: IntoIterator<Item = (u8, u8)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<RoutingMap> for BTreeMap<u8, u8> {
    fn from(map: RoutingMap) -> Self {
        map.0
    }
}
