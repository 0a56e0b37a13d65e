//! Tokio-based asynchronous client.

use std::ops::{Deref, DerefMut};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
};

use crate::{
    client::{ClientBuilder, ConnectOptions, Endpoint, ReadOptions},
    error::{Error, Result},
    protocol::{
        Command, PortLayout,
        reply::{RECV_BUFFER, Reply, ReplyBuffer, ReadClock, Wait},
    },
    request::{
        Acknowledged, DeviceStatusQuery, PortQuery, PortStatus, Query, Request, Route,
        VideoRouting,
    },
    transport,
    types::{DeviceStatus, PortStates, RoutingMap},
};

/// An async client for one matrix.
///
/// Commands take `&mut self`: the device answers strictly one request at a
/// time, and the borrow checker keeps it that way.
#[derive(Debug)]
pub struct Client {
    endpoint: Endpoint,
    options: ConnectOptions,
    stream: Option<TcpStream>,
}

impl Client {
    /// Disconnected client with default options.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_options(endpoint, ConnectOptions::default())
    }

    /// Disconnected client with explicit options.
    #[must_use]
    pub fn with_options(endpoint: Endpoint, options: ConnectOptions) -> Self {
        Self {
            endpoint,
            options,
            stream: None,
        }
    }

    /// Create a builder for the given endpoint.
    #[must_use]
    pub fn builder(endpoint: Endpoint) -> ClientBuilder {
        ClientBuilder::new(endpoint)
    }

    /// Address this client dials.
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Port layout used for validation.
    #[must_use]
    pub fn layout(&self) -> PortLayout {
        self.options.layout
    }

    /// Number of HDMI inputs.
    #[must_use]
    pub fn input_count(&self) -> u8 {
        self.options.layout.inputs()
    }

    /// Number of HDMI outputs.
    #[must_use]
    pub fn output_count(&self) -> u8 {
        self.options.layout.outputs()
    }

    /// Whether a socket is currently open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Open the connection. A no-op when already connected.
    pub async fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let mut stream = transport::connect(&self.endpoint, self.options.connect_timeout).await?;
        transport::discard_banner(&mut stream, self.options.banner_timeout).await;

        #[cfg(feature = "tracing")]
        tracing::info!(endpoint = %self.endpoint, "connected to matrix");

        self.stream = Some(stream);
        Ok(())
    }

    /// Close the connection. A no-op when already disconnected.
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;

            #[cfg(feature = "tracing")]
            tracing::info!(endpoint = %self.endpoint, "disconnected from matrix");
        }
    }

    /// Connect and return a guard that disconnects when dropped.
    ///
    /// The guard dereferences to the client, so every command is available
    /// on it. Dropping it closes the socket on every exit path, including
    /// `?` and panics; [`Session::close`] does the same gracefully.
    pub async fn session(&mut self) -> Result<Session<'_>> {
        self.connect().await?;
        Ok(Session { client: self })
    }

    /// Connect, run `f`, and disconnect regardless of its outcome.
    pub async fn with_connection<T, F>(&mut self, f: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Client) -> Result<T>,
    {
        let mut session = self.session().await?;
        let result = f(&mut *session).await;
        session.close().await;
        result
    }

    /// Send a raw command and return the trimmed reply.
    ///
    /// Fails with [`Error::NotConnected`] without any I/O when disconnected.
    /// A broken or closed socket, or a reply timeout, drops the connection.
    pub async fn send_command(&mut self, raw: &str) -> Result<String> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::NotConnected);
        };

        match exchange(stream, raw, &self.options.read).await {
            Ok(reply) => {
                if reply.peer_closed {
                    self.stream = None;
                    #[cfg(feature = "tracing")]
                    tracing::info!(endpoint = %self.endpoint, "matrix closed the connection");
                }

                #[cfg(feature = "tracing")]
                tracing::debug!(command = raw, reply = %reply.text, "complete reply");

                Ok(reply.text)
            }
            Err(e) => {
                if e.is_fatal_to_connection() {
                    self.stream = None;
                    #[cfg(feature = "tracing")]
                    tracing::warn!(command = raw, error = %e, "connection lost during request");
                }
                Err(e)
            }
        }
    }

    /// Validate, send and decode a typed request.
    pub async fn execute<R: Request>(&mut self, request: R) -> Result<R::Output> {
        let command = request.command();
        command.validate(self.options.layout)?;
        let reply = self.send_command(&command.wire()).await?;
        request.decode(reply)
    }

    /// Query the device name configured on the matrix.
    pub async fn get_device_name(&mut self) -> Result<String> {
        self.execute(Query(Command::Name)).await
    }

    /// Query the overall device status text.
    pub async fn get_device_status(&mut self) -> Result<String> {
        self.execute(Query(Command::Status)).await
    }

    /// Query the overall device status, parsed.
    pub async fn get_device_status_parsed(&mut self) -> Result<DeviceStatus> {
        self.execute(DeviceStatusQuery).await
    }

    /// Query the device model/type identifier.
    pub async fn get_device_type(&mut self) -> Result<String> {
        self.execute(Query(Command::Type)).await
    }

    /// Query the firmware version.
    pub async fn get_device_version(&mut self) -> Result<String> {
        self.execute(Query(Command::Version)).await
    }

    /// Query the raw video routing status text.
    pub async fn get_video_status(&mut self) -> Result<String> {
        self.execute(Query(Command::VideoStatus)).await
    }

    /// Query the video routing as an output → input map.
    pub async fn get_video_status_parsed(&mut self) -> Result<RoutingMap> {
        self.execute(VideoRouting).await
    }

    /// HDBaseT power status text.
    pub async fn get_hdbt_power_status_raw(&mut self) -> Result<String> {
        self.execute(Query(Command::HdbtPowerStatus)).await
    }

    /// HDBaseT power status per port.
    pub async fn get_hdbt_power_status(&mut self) -> Result<PortStates> {
        self.execute(PortStatus(PortQuery::HdbtPower)).await
    }

    /// Connection status text of the HDMI inputs.
    pub async fn get_input_status_raw(&mut self) -> Result<String> {
        self.execute(Query(Command::InputStatus)).await
    }

    /// Connection status per input.
    ///
    /// A reply without a single port/state line is an [`Error::Parse`].
    pub async fn get_input_status(&mut self) -> Result<PortStates> {
        self.execute(PortStatus(PortQuery::Inputs)).await
    }

    /// Connection status text of the HDMI outputs.
    pub async fn get_output_status_raw(&mut self) -> Result<String> {
        self.execute(Query(Command::OutputStatus)).await
    }

    /// Connection status per output.
    pub async fn get_output_status(&mut self) -> Result<PortStates> {
        self.execute(PortStatus(PortQuery::Outputs)).await
    }

    /// HDCP status text.
    pub async fn get_hdcp_status_raw(&mut self) -> Result<String> {
        self.execute(Query(Command::HdcpStatus)).await
    }

    /// HDCP status per port.
    pub async fn get_hdcp_status(&mut self) -> Result<PortStates> {
        self.execute(PortStatus(PortQuery::Hdcp)).await
    }

    /// Downscaling status text of the outputs.
    pub async fn get_downscaling_status_raw(&mut self) -> Result<String> {
        self.execute(Query(Command::DownscalingStatus)).await
    }

    /// Downscaling status per output.
    pub async fn get_downscaling_status(&mut self) -> Result<PortStates> {
        self.execute(PortStatus(PortQuery::Downscaling)).await
    }

    /// Power the matrix on.
    pub async fn power_on(&mut self) -> Result<String> {
        self.execute(Acknowledged(Command::PowerOn)).await
    }

    /// Power the matrix off.
    pub async fn power_off(&mut self) -> Result<String> {
        self.execute(Acknowledged(Command::PowerOff)).await
    }

    /// Route `input` to `output`.
    ///
    /// Both ports are checked against the layout before anything is sent.
    pub async fn route_input_to_output(&mut self, input: u8, output: u8) -> Result<String> {
        self.execute(Route { input, output }).await
    }

    /// Enable an HDMI output.
    pub async fn output_on(&mut self, output: u8) -> Result<String> {
        self.execute(Acknowledged(Command::OutputOn(output))).await
    }

    /// Disable an HDMI output.
    pub async fn output_off(&mut self, output: u8) -> Result<String> {
        self.execute(Acknowledged(Command::OutputOff(output))).await
    }
}

/// Connected scope of a [`Client`]; see [`Client::session`].
#[derive(Debug)]
pub struct Session<'a> {
    client: &'a mut Client,
}

impl Session<'_> {
    /// Disconnect gracefully and end the scope.
    pub async fn close(self) {
        self.client.disconnect().await;
    }
}

impl Deref for Session<'_> {
    type Target = Client;

    fn deref(&self) -> &Client {
        self.client
    }
}

impl DerefMut for Session<'_> {
    fn deref_mut(&mut self) -> &mut Client {
        self.client
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        // Dropping the stream closes the socket.
        if self.client.stream.take().is_some() {
            #[cfg(feature = "tracing")]
            tracing::info!(endpoint = %self.client.endpoint, "session ended, disconnected");
        }
    }
}

/// Drop bytes that arrived after the previous reply was complete.
fn discard_stale(stream: &TcpStream) -> Result<()> {
    let mut chunk = [0u8; RECV_BUFFER];
    loop {
        match stream.try_read(&mut chunk) {
            Ok(0) => return Err(Error::Disconnected),
            Ok(n) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(stale = ?String::from_utf8_lossy(&chunk[..n]), "discarding unsolicited data");
                let _ = n;
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}

async fn exchange(stream: &mut TcpStream, raw: &str, options: &ReadOptions) -> Result<Reply> {
    discard_stale(stream)?;
    stream.write_all(raw.as_bytes()).await?;
    stream.flush().await?;

    #[cfg(feature = "tracing")]
    tracing::debug!(command = raw, "sent command");

    let mut reply = ReplyBuffer::new(options);
    let mut clock = ReadClock::start(options);
    let mut chunk = [0u8; RECV_BUFFER];

    loop {
        let wait = match clock.next() {
            Wait::For(wait) => wait,
            Wait::Complete => break,
            Wait::TimedOut => return Err(Error::timeout(raw, options.response_timeout)),
        };

        match tokio::time::timeout(wait, stream.read(&mut chunk)).await {
            Err(_elapsed) => continue,
            Ok(Ok(0)) => {
                if reply.is_empty() {
                    return Err(Error::Disconnected);
                }
                reply.mark_closed();
                break;
            }
            Ok(Ok(n)) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(chunk = ?String::from_utf8_lossy(&chunk[..n]), "received data chunk");

                reply.push(&chunk[..n]);
                clock.record_data();
                if reply.is_terminated() {
                    break;
                }
            }
            Ok(Err(e)) => return Err(e.into()),
        }
    }

    Ok(reply.finish())
}
