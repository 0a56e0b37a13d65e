//! Blocking (synchronous) client.
//!
//! Mirrors [`crate::Client`] method for method; only the I/O differs.

use std::{
    io::{self, Read, Write},
    net::{Shutdown, TcpStream},
    ops::{Deref, DerefMut},
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

/// A blocking client for one matrix.
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
    pub fn connect(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let mut stream = transport::connect_blocking(&self.endpoint, self.options.connect_timeout)?;
        transport::discard_banner_blocking(&mut stream, self.options.banner_timeout);

        #[cfg(feature = "tracing")]
        tracing::info!(endpoint = %self.endpoint, "connected to matrix");

        self.stream = Some(stream);
        Ok(())
    }

    /// Close the connection. A no-op when already disconnected.
    pub fn disconnect(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);

            #[cfg(feature = "tracing")]
            tracing::info!(endpoint = %self.endpoint, "disconnected from matrix");
        }
    }

    /// Connect and return a guard that disconnects when dropped.
    pub fn session(&mut self) -> Result<Session<'_>> {
        self.connect()?;
        Ok(Session { client: self })
    }

    /// Connect, run `f`, and disconnect regardless of its outcome.
    pub fn with_connection<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Client) -> Result<T>,
    {
        let mut session = self.session()?;
        f(&mut *session)
    }

    /// Send a raw command and return the trimmed reply.
    ///
    /// Fails with [`Error::NotConnected`] without any I/O when disconnected.
    /// A broken or closed socket, or a reply timeout, drops the connection.
    pub fn send_command(&mut self, raw: &str) -> Result<String> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(Error::NotConnected);
        };

        match exchange(stream, raw, &self.options.read) {
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
    pub fn execute<R: Request>(&mut self, request: R) -> Result<R::Output> {
        let command = request.command();
        command.validate(self.options.layout)?;
        let reply = self.send_command(&command.wire())?;
        request.decode(reply)
    }

    /// Query the device name configured on the matrix.
    pub fn get_device_name(&mut self) -> Result<String> {
        self.execute(Query(Command::Name))
    }

    /// Query the overall device status text.
    pub fn get_device_status(&mut self) -> Result<String> {
        self.execute(Query(Command::Status))
    }

    /// Query the overall device status, parsed.
    pub fn get_device_status_parsed(&mut self) -> Result<DeviceStatus> {
        self.execute(DeviceStatusQuery)
    }

    /// Query the device model/type identifier.
    pub fn get_device_type(&mut self) -> Result<String> {
        self.execute(Query(Command::Type))
    }

    /// Query the firmware version.
    pub fn get_device_version(&mut self) -> Result<String> {
        self.execute(Query(Command::Version))
    }

    /// Query the raw video routing status text.
    pub fn get_video_status(&mut self) -> Result<String> {
        self.execute(Query(Command::VideoStatus))
    }

    /// Query the video routing as an output → input map.
    pub fn get_video_status_parsed(&mut self) -> Result<RoutingMap> {
        self.execute(VideoRouting)
    }

    /// HDBaseT power status text.
    pub fn get_hdbt_power_status_raw(&mut self) -> Result<String> {
        self.execute(Query(Command::HdbtPowerStatus))
    }

    /// HDBaseT power status per port.
    pub fn get_hdbt_power_status(&mut self) -> Result<PortStates> {
        self.execute(PortStatus(PortQuery::HdbtPower))
    }

    /// Connection status text of the HDMI inputs.
    pub fn get_input_status_raw(&mut self) -> Result<String> {
        self.execute(Query(Command::InputStatus))
    }

    /// Connection status per input.
    ///
    /// A reply without a single port/state line is an [`Error::Parse`].
    pub fn get_input_status(&mut self) -> Result<PortStates> {
        self.execute(PortStatus(PortQuery::Inputs))
    }

    /// Connection status text of the HDMI outputs.
    pub fn get_output_status_raw(&mut self) -> Result<String> {
        self.execute(Query(Command::OutputStatus))
    }

    /// Connection status per output.
    pub fn get_output_status(&mut self) -> Result<PortStates> {
        self.execute(PortStatus(PortQuery::Outputs))
    }

    /// HDCP status text.
    pub fn get_hdcp_status_raw(&mut self) -> Result<String> {
        self.execute(Query(Command::HdcpStatus))
    }

    /// HDCP status per port.
    pub fn get_hdcp_status(&mut self) -> Result<PortStates> {
        self.execute(PortStatus(PortQuery::Hdcp))
    }

    /// Downscaling status text of the outputs.
    pub fn get_downscaling_status_raw(&mut self) -> Result<String> {
        self.execute(Query(Command::DownscalingStatus))
    }

    /// Downscaling status per output.
    pub fn get_downscaling_status(&mut self) -> Result<PortStates> {
        self.execute(PortStatus(PortQuery::Downscaling))
    }

    /// Power the matrix on.
    pub fn power_on(&mut self) -> Result<String> {
        self.execute(Acknowledged(Command::PowerOn))
    }

    /// Power the matrix off.
    pub fn power_off(&mut self) -> Result<String> {
        self.execute(Acknowledged(Command::PowerOff))
    }

    /// Route `input` to `output`.
    pub fn route_input_to_output(&mut self, input: u8, output: u8) -> Result<String> {
        self.execute(Route { input, output })
    }

    /// Enable an HDMI output.
    pub fn output_on(&mut self, output: u8) -> Result<String> {
        self.execute(Acknowledged(Command::OutputOn(output)))
    }

    /// Disable an HDMI output.
    pub fn output_off(&mut self, output: u8) -> Result<String> {
        self.execute(Acknowledged(Command::OutputOff(output)))
    }
}

/// Connected scope of a blocking [`Client`]; see [`Client::session`].
#[derive(Debug)]
pub struct Session<'a> {
    client: &'a mut Client,
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
        self.client.disconnect();
    }
}

/// Drop bytes that arrived after the previous reply was complete.
fn discard_stale(stream: &mut TcpStream) -> Result<()> {
    stream.set_nonblocking(true)?;
    let mut chunk = [0u8; RECV_BUFFER];
    let drained = loop {
        match stream.read(&mut chunk) {
            Ok(0) => break Err(Error::Disconnected),
            Ok(n) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(stale = ?String::from_utf8_lossy(&chunk[..n]), "discarding unsolicited data");
                let _ = n;
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => break Err(e.into()),
        }
    };
    stream.set_nonblocking(false)?;
    drained
}

fn exchange(stream: &mut TcpStream, raw: &str, options: &ReadOptions) -> Result<Reply> {
    discard_stale(stream)?;
    stream.write_all(raw.as_bytes())?;
    stream.flush()?;

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

        stream.set_read_timeout(Some(wait))?;
        match stream.read(&mut chunk) {
            Ok(0) => {
                if reply.is_empty() {
                    return Err(Error::Disconnected);
                }
                reply.mark_closed();
                break;
            }
            Ok(n) => {
                #[cfg(feature = "tracing")]
                tracing::trace!(chunk = ?String::from_utf8_lossy(&chunk[..n]), "received data chunk");

                reply.push(&chunk[..n]);
                clock.record_data();
                if reply.is_terminated() {
                    break;
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(reply.finish())
}
