//! Client configuration shared by the tokio and the blocking adapter.

#[cfg(feature = "blocking")]
pub(crate) mod blocking;
#[cfg(feature = "async")]
pub(crate) mod tokio;

use std::{fmt, time::Duration};

use crate::protocol::PortLayout;

/// Factory default address of AVGear matrices.
pub const DEFAULT_HOST: &str = "192.168.0.178";

/// Factory default TCP control port.
pub const DEFAULT_PORT: u16 = 4001;

/// Network address of a matrix.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    /// Create a TCP endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Hostname or IP.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// How a reply is delimited.
///
/// The firmware does not frame its replies, so by default a reply ends once
/// the socket has been quiet for `idle_timeout`. Devices known to finish
/// every reply with a fixed token can set `terminator` to return earlier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Quiet period that ends a reply once data has started arriving.
    pub idle_timeout: Duration,

    /// Upper bound for the whole reply.
    ///
    /// If nothing at all arrives within it, the command fails with
    /// [`crate::Error::Timeout`].
    pub response_timeout: Duration,

    /// Reply is complete as soon as the text ends with this (trailing
    /// whitespace ignored). `None` or empty disables the check.
    pub terminator: Option<String>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_millis(500),
            response_timeout: Duration::from_secs(2),
            terminator: None,
        }
    }
}

/// Options controlling connection and exchange behaviour.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Bound for establishing the TCP connection.
    pub connect_timeout: Duration,

    /// How long to wait for (and discard) the welcome banner after
    /// connecting. Zero skips the wait.
    pub banner_timeout: Duration,

    /// Port counts used to validate routing arguments.
    pub layout: PortLayout,

    /// Reply delimiting.
    pub read: ReadOptions,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            banner_timeout: Duration::from_secs(1),
            layout: PortLayout::default(),
            read: ReadOptions::default(),
        }
    }
}

/// Client builder.
///
/// The same builder produces either flavour of client; nothing is dialled
/// until `connect` is called.
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    endpoint: Endpoint,
    options: ConnectOptions,
}

impl ClientBuilder {
    /// Start from default options.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            options: ConnectOptions::default(),
        }
    }

    /// Set the connect timeout.
    ///
    /// With `Duration::ZERO` every connect attempt fails at once with a
    /// timed-out [`Error::Connect`](crate::Error::Connect).
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.options.connect_timeout = timeout;
        self
    }

    /// Set how long to wait for the welcome banner.
    #[must_use]
    pub fn banner_timeout(mut self, timeout: Duration) -> Self {
        self.options.banner_timeout = timeout;
        self
    }

    /// Set the port layout (defaults to 4x4).
    #[must_use]
    pub fn layout(mut self, layout: PortLayout) -> Self {
        self.options.layout = layout;
        self
    }

    /// Set the reply idle period.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.options.read.idle_timeout = timeout;
        self
    }

    /// Set the overall reply timeout.
    #[must_use]
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.options.read.response_timeout = timeout;
        self
    }

    /// End replies on a fixed token instead of waiting for the idle period.
    #[must_use]
    pub fn terminator(mut self, terminator: impl Into<String>) -> Self {
        self.options.read.terminator = Some(terminator.into());
        self
    }

    /// Options collected so far.
    #[must_use]
    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Build a disconnected tokio client.
    #[cfg(feature = "async")]
    #[must_use]
    pub fn build(self) -> tokio::Client {
        tokio::Client::with_options(self.endpoint, self.options)
    }

    /// Build and connect a tokio client.
    #[cfg(feature = "async")]
    pub async fn connect(self) -> crate::Result<tokio::Client> {
        let mut client = self.build();
        client.connect().await?;
        Ok(client)
    }

    /// Build a disconnected blocking client.
    #[cfg(feature = "blocking")]
    #[must_use]
    pub fn build_blocking(self) -> blocking::Client {
        blocking::Client::with_options(self.endpoint, self.options)
    }

    /// Build and connect a blocking client.
    #[cfg(feature = "blocking")]
    pub fn connect_blocking(self) -> crate::Result<blocking::Client> {
        let mut client = self.build_blocking();
        client.connect()?;
        Ok(client)
    }
}
