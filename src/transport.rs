//! Socket transport.
//!
//! Dialling with a bounded timeout and discarding the welcome banner, for
//! both execution modes. Reading replies lives with the adapters.

use std::time::Duration;

use crate::{
    client::Endpoint,
    error::{Error, Result},
};

#[cfg(any(feature = "async", feature = "blocking"))]
use crate::protocol::reply::RECV_BUFFER;

/// Connect to a matrix.
///
/// Refusal and timeout both surface as [`Error::Connect`]; a zero
/// `timeout` fails without dialling.
#[cfg(feature = "async")]
pub(crate) async fn connect(
    endpoint: &Endpoint,
    timeout: Duration,
) -> Result<tokio::net::TcpStream> {
    if timeout.is_zero() {
        return Err(Error::connect_timed_out(endpoint, timeout));
    }

    let addr = (endpoint.host(), endpoint.port());
    let stream = tokio::time::timeout(timeout, tokio::net::TcpStream::connect(addr))
        .await
        .map_err(|_elapsed| Error::connect_timed_out(endpoint, timeout))?
        .map_err(|e| Error::connect(endpoint, e))?;
    // Best effort: disable Nagle for request/response latency.
    let _ = stream.set_nodelay(true);
    Ok(stream)
}

/// Read and drop whatever the device greets us with.
///
/// Not every firmware sends a banner, so silence is fine.
#[cfg(feature = "async")]
pub(crate) async fn discard_banner(stream: &mut tokio::net::TcpStream, wait: Duration) {
    use tokio::io::AsyncReadExt;

    if wait.is_zero() {
        return;
    }

    let mut buf = [0u8; RECV_BUFFER];
    if let Ok(Ok(n)) = tokio::time::timeout(wait, stream.read(&mut buf)).await {
        #[cfg(feature = "tracing")]
        tracing::debug!(banner = ?String::from_utf8_lossy(&buf[..n]), "discarding welcome banner");
        let _ = n;
    }
}

/// Connect to a matrix, blocking the calling thread.
#[cfg(feature = "blocking")]
pub(crate) fn connect_blocking(
    endpoint: &Endpoint,
    timeout: Duration,
) -> Result<std::net::TcpStream> {
    use std::net::ToSocketAddrs;

    // `connect_timeout` rejects a zero duration; fail the same way as the
    // async dialer instead.
    if timeout.is_zero() {
        return Err(Error::connect_timed_out(endpoint, timeout));
    }

    let addrs = (endpoint.host(), endpoint.port())
        .to_socket_addrs()
        .map_err(|e| Error::connect(endpoint, e))?;

    let mut last_err = None;
    for addr in addrs {
        match std::net::TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                stream.set_write_timeout(Some(timeout))?;
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(match last_err {
        Some(e) if e.kind() == std::io::ErrorKind::TimedOut => {
            Error::connect_timed_out(endpoint, timeout)
        }
        Some(e) => Error::connect(endpoint, e),
        None => Error::connect(
            endpoint,
            std::io::Error::new(std::io::ErrorKind::NotFound, "host resolved to no address"),
        ),
    })
}

/// Blocking counterpart of [`discard_banner`].
#[cfg(feature = "blocking")]
pub(crate) fn discard_banner_blocking(stream: &mut std::net::TcpStream, wait: Duration) {
    use std::io::Read;

    if wait.is_zero() || stream.set_read_timeout(Some(wait)).is_err() {
        return;
    }

    let mut buf = [0u8; RECV_BUFFER];
    if let Ok(n) = stream.read(&mut buf) {
        #[cfg(feature = "tracing")]
        tracing::debug!(banner = ?String::from_utf8_lossy(&buf[..n]), "discarding welcome banner");
        let _ = n;
    }
}
