//! `hdmimatrix` - Async-first client for AVGear-style HDMI matrix switches.
//!
//! The matrix is controlled over a plain TCP socket with short ASCII
//! commands (`PowerON.`, `OUT01:03.`, `STA_VIDEO.`, ...) and answers with
//! free-form text. This crate provides:
//! - connection management with bounded connect/reply timeouts
//! - typed commands with port validation
//! - tolerant parsers turning status text into routing and per-port maps
//! - the same API in two flavours: tokio ([`Client`], feature `async`) and
//!   blocking ([`BlockingClient`], feature `blocking`)
//! - a scripted fake matrix for tests (feature `mock`)
//!
//! ## Quick start
//!
//! ```no_run
//! use hdmimatrix::{Client, Endpoint};
//! # async fn demo() -> hdmimatrix::Result<()> {
//! let mut matrix = Client::new(Endpoint::new("192.168.0.178", 4001));
//!
//! let mut session = matrix.session().await?;
//! session.power_on().await?;
//! session.route_input_to_output(2, 1).await?;
//!
//! for (output, input) in session.get_video_status_parsed().await?.iter() {
//!     println!("output {output} <- input {input}");
//! }
//! session.close().await;
//! # Ok(()) }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod transport;

pub mod error;
pub mod protocol;
pub mod request;
pub mod types;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

/// Tokio-based asynchronous client API.
#[cfg(feature = "async")]
pub use crate::client::tokio::{Client, Session};

/// Blocking (synchronous) client API.
#[cfg(feature = "blocking")]
pub use crate::client::blocking::{Client as BlockingClient, Session as BlockingSession};

/// Module-style exports for the blocking client.
#[cfg(feature = "blocking")]
pub mod blocking {
    pub use crate::client::blocking::{Client, Session};
}

pub use client::{
    ClientBuilder, ConnectOptions, DEFAULT_HOST, DEFAULT_PORT, Endpoint, ReadOptions,
};
pub use error::{Error, ErrorKind, Result};
pub use protocol::{Command, PortLayout};
pub use types::{DeviceStatus, PortState, PortStates, RoutingMap};
