//! Public data types.

mod routing;
mod status;

pub use routing::RoutingMap;
pub use status::{DeviceStatus, PortState, PortStates};
