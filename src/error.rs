//! Error model for the `hdmimatrix` crate.

use std::time::Duration;

use thiserror::Error;

/// Convenience result type.
pub type Result<T> = std::result::Result<T, Error>;

/// High-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The socket could not be established, is not open, or broke.
    Connection,
    /// No reply (or no connection) within the configured bound.
    Timeout,
    /// An argument was rejected before anything was sent.
    Validation,
    /// The device answered without acknowledging the command.
    CommandRejected,
    /// A status reply did not contain a single usable line.
    Parse,
}

/// Structured error type.
///
/// Both execution modes (tokio and blocking) surface exactly the same
/// variants for the same device behaviour.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Opening the TCP connection failed or did not finish in time.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// `host:port` that was dialled.
        endpoint: String,
        /// Lower-level error.
        #[source]
        source: std::io::Error,
    },

    /// A command was issued on a client that is not connected.
    #[error("not connected to the matrix; call connect() first")]
    NotConnected,

    /// The device closed the connection before replying.
    #[error("connection closed by the matrix")]
    Disconnected,

    /// Socket failure while a command was in flight.
    #[error("I/O error: {source}")]
    Io {
        /// Lower-level error.
        #[from]
        source: std::io::Error,
    },

    /// No reply arrived within the response timeout.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Wire command that was waiting for a reply.
        operation: String,
        /// Timeout value.
        timeout: Duration,
    },

    /// An argument is out of range or malformed.
    #[error("invalid argument: {message}")]
    Validation {
        /// Human readable message.
        message: String,
    },

    /// The device replied, but not with an acknowledgement.
    #[error("matrix rejected '{command}': {reply:?}")]
    CommandRejected {
        /// Wire command that was sent.
        command: String,
        /// Trimmed reply text (empty when nothing usable came back).
        reply: String,
    },

    /// Not a single line of a status reply could be decoded.
    #[error("could not parse {what} reply: {message}")]
    Parse {
        /// Which reply was being parsed.
        what: &'static str,
        /// Human readable message.
        message: String,
    },
}

impl Error {
    /// Returns a coarse error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connect { .. } | Self::NotConnected | Self::Disconnected | Self::Io { .. } => {
                ErrorKind::Connection
            }
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::CommandRejected { .. } => ErrorKind::CommandRejected,
            Self::Parse { .. } => ErrorKind::Parse,
        }
    }

    /// Whether the client dropped its connection because of this error.
    ///
    /// After such an error the caller has to `connect()` again. Reply
    /// timeouts are included, so a late reply never reaches the next command.
    #[must_use]
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(
            self,
            Self::Disconnected | Self::Io { .. } | Self::Timeout { .. }
        )
    }

    pub(crate) fn connect(endpoint: impl ToString, source: std::io::Error) -> Self {
        Self::Connect {
            endpoint: endpoint.to_string(),
            source,
        }
    }

    pub(crate) fn connect_timed_out(endpoint: impl ToString, timeout: Duration) -> Self {
        Self::connect(
            endpoint,
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("no connection within {timeout:?}"),
            ),
        )
    }

    pub(crate) fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn rejected(command: impl Into<String>, reply: impl Into<String>) -> Self {
        Self::CommandRejected {
            command: command.into(),
            reply: reply.into(),
        }
    }

    pub(crate) fn parse(what: &'static str, message: impl Into<String>) -> Self {
        Self::Parse {
            what,
            message: message.into(),
        }
    }
}
