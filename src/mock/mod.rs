//! Fake matrix and transcript replay helpers.
//!
//! This module is intended for:
//! - unit/integration tests of both client flavours
//! - regression tests using recorded device "conversations"
//!
//! Each server runs on its own thread with a private current-thread tokio
//! runtime, so it serves the blocking client and tokio tests alike.
//!
//! It is gated behind `cfg(test)` or the `mock` Cargo feature.

use std::{
    collections::HashMap,
    path::Path,
    sync::{Arc, Mutex, PoisonError},
    thread::JoinHandle,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::oneshot,
};

use crate::{
    client::Endpoint,
    error::{Error, Result},
};

/// Banner a real TMX matrix sends right after accepting a connection.
pub const DEFAULT_BANNER: &str = "Welcome to HDMI Matrix\r\n";

/// Reply the firmware gives to commands it does not know.
pub const UNKNOWN_COMMAND_REPLY: &str = "Command code error!\r\n";

/// How a command should be answered by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MockReply {
    /// Write the text in one go.
    Text(String),

    /// Write the parts one by one with `gap` in between.
    Chunks {
        /// Parts, in order.
        parts: Vec<String>,
        /// Pause between parts.
        gap: Duration,
    },

    /// Say nothing.
    Silent,

    /// Close the connection without replying.
    Close,
}

/// A simple mock script.
#[derive(Debug, Clone)]
pub struct MockScript {
    /// Banner sent after accepting a connection.
    pub banner: Option<String>,

    /// Map from wire command (e.g. `"STA_VIDEO."`) to reply.
    pub replies: HashMap<String, MockReply>,

    /// Reply for commands not in `replies`.
    pub fallback: MockReply,
}

impl MockScript {
    /// Script with the default banner and no replies.
    #[must_use]
    pub fn new() -> Self {
        Self {
            banner: Some(DEFAULT_BANNER.to_string()),
            replies: HashMap::new(),
            fallback: MockReply::Text(UNKNOWN_COMMAND_REPLY.to_string()),
        }
    }

    /// Replace (or remove) the banner.
    #[must_use]
    pub fn banner(mut self, banner: Option<&str>) -> Self {
        self.banner = banner.map(str::to_string);
        self
    }

    /// Answer `command` with `text`.
    #[must_use]
    pub fn reply(mut self, command: impl Into<String>, text: impl Into<String>) -> Self {
        self.replies
            .insert(command.into(), MockReply::Text(text.into()));
        self
    }

    /// Answer `command` with `parts` written `gap` apart.
    #[must_use]
    pub fn reply_chunks<I, S>(mut self, command: impl Into<String>, parts: I, gap: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies.insert(
            command.into(),
            MockReply::Chunks {
                parts: parts.into_iter().map(Into::into).collect(),
                gap,
            },
        );
        self
    }

    /// Never answer `command`.
    #[must_use]
    pub fn silent(mut self, command: impl Into<String>) -> Self {
        self.replies.insert(command.into(), MockReply::Silent);
        self
    }

    /// Hang up when `command` arrives.
    #[must_use]
    pub fn close_on(mut self, command: impl Into<String>) -> Self {
        self.replies.insert(command.into(), MockReply::Close);
        self
    }

    /// Reply used for unscripted commands.
    #[must_use]
    pub fn fallback(mut self, reply: MockReply) -> Self {
        self.fallback = reply;
        self
    }
}

impl Default for MockScript {
    fn default() -> Self {
        Self::new()
    }
}

/// What the mock observed.
#[derive(Debug, Default)]
struct Journal {
    commands: Vec<String>,
    connections: usize,
    closed: usize,
    mismatch: Option<TranscriptMismatch>,
}

type SharedJournal = Arc<Mutex<Journal>>;

fn with_journal<T>(journal: &SharedJournal, f: impl FnOnce(&mut Journal) -> T) -> T {
    let mut guard = journal.lock().unwrap_or_else(PoisonError::into_inner);
    f(&mut guard)
}

/// Listener thread plus its shutdown handle.
#[derive(Debug)]
struct Runner {
    endpoint: Endpoint,
    journal: SharedJournal,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Runner {
    fn spawn<F, Fut>(name: &str, serve: F) -> Result<Self>
    where
        F: FnOnce(TcpListener, SharedJournal, oneshot::Receiver<()>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()>,
    {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        let endpoint = Endpoint::new(addr.ip().to_string(), addr.port());

        let journal = SharedJournal::default();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let thread_journal = journal.clone();
        let thread = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                let Ok(rt) = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                else {
                    return;
                };
                rt.block_on(async move {
                    if let Ok(listener) = TcpListener::from_std(listener) {
                        serve(listener, thread_journal, shutdown_rx).await;
                    }
                });
            })?;

        Ok(Self {
            endpoint,
            journal,
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            thread: Mutex::new(Some(thread)),
        })
    }

    fn shutdown(&self) {
        let tx = self
            .shutdown_tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(tx) = tx {
            let _ = tx.send(());
        }

        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            let _ = thread.join();
        }
    }
}

impl Drop for Runner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A running fake matrix.
///
/// Connections are served one after another until shutdown. Dropping the
/// server shuts it down.
#[derive(Debug)]
pub struct MockServer {
    runner: Runner,
}

impl MockServer {
    /// Start on 127.0.0.1 with an ephemeral port.
    pub fn start(script: MockScript) -> Result<Self> {
        let script = Arc::new(script);
        let runner = Runner::spawn("hdmimatrix-mock", move |listener, journal, shutdown| {
            serve_script(listener, script, journal, shutdown)
        })?;
        Ok(Self { runner })
    }

    /// Endpoint clients should connect to.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        self.runner.endpoint.clone()
    }

    /// Every command received so far, across connections, in order.
    #[must_use]
    pub fn received(&self) -> Vec<String> {
        with_journal(&self.runner.journal, |j| j.commands.clone())
    }

    /// Number of connections accepted so far.
    #[must_use]
    pub fn connections(&self) -> usize {
        with_journal(&self.runner.journal, |j| j.connections)
    }

    /// Number of connections the client has closed so far.
    ///
    /// Connections the mock hangs up itself (see [`MockScript::close_on`])
    /// are not counted.
    #[must_use]
    pub fn closed_connections(&self) -> usize {
        with_journal(&self.runner.journal, |j| j.closed)
    }

    /// Shut down the server and wait for its thread.
    pub fn shutdown(&self) {
        self.runner.shutdown();
    }
}

async fn serve_script(
    listener: TcpListener,
    script: Arc<MockScript>,
    journal: SharedJournal,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => return,
            accepted = listener.accept() => {
                let Ok((stream, _peer)) = accepted else { return };
                with_journal(&journal, |j| j.connections += 1);
                tokio::select! {
                    _ = &mut shutdown => return,
                    _ = handle_connection(stream, &script, &journal) => {}
                }
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, script: &MockScript, journal: &SharedJournal) {
    if let Some(banner) = &script.banner {
        if stream.write_all(banner.as_bytes()).await.is_err() {
            return;
        }
    }

    let mut pending = String::new();
    loop {
        let Ok(command) = recv_command(&mut stream, &mut pending).await else {
            with_journal(journal, |j| j.closed += 1);
            return;
        };
        with_journal(journal, |j| j.commands.push(command.clone()));

        let reply = script.replies.get(&command).unwrap_or(&script.fallback);
        let sent = match reply {
            MockReply::Text(text) => stream.write_all(text.as_bytes()).await,
            MockReply::Chunks { parts, gap } => send_chunks(&mut stream, parts, *gap).await,
            MockReply::Silent => Ok(()),
            MockReply::Close => return,
        };
        // The client hung up while we were still answering.
        if sent.is_err() {
            with_journal(journal, |j| j.closed += 1);
            return;
        }
    }
}

async fn send_chunks(stream: &mut TcpStream, parts: &[String], gap: Duration) -> std::io::Result<()> {
    for (idx, part) in parts.iter().enumerate() {
        if idx > 0 {
            tokio::time::sleep(gap).await;
        }
        stream.write_all(part.as_bytes()).await?;
        stream.flush().await?;
    }
    Ok(())
}

/// Read until the next `.`-terminated command. `pending` carries leftovers
/// between calls, since a client may pipeline several commands in one write.
async fn recv_command(stream: &mut TcpStream, pending: &mut String) -> Result<String> {
    let mut buf = [0u8; 256];
    loop {
        if let Some(end) = pending.find('.') {
            let command: String = pending.drain(..=end).collect();
            return Ok(command.trim().to_string());
        }

        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Err(Error::Disconnected);
        }
        pending.push_str(&String::from_utf8_lossy(&buf[..n]));
    }
}

/// A transcript step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "dir", rename_all = "lowercase")]
pub enum TranscriptStep {
    /// Text sent by the device.
    Server {
        /// Raw text, including any line endings.
        text: String,
    },
    /// A command expected from the client.
    Client {
        /// Wire command, e.g. `"OUT01:03."`.
        text: String,
    },
}

/// A JSONL transcript, suitable for replay.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    /// Ordered transcript steps.
    pub steps: Vec<TranscriptStep>,
}

impl Transcript {
    /// Parse from JSON Lines content.
    pub fn from_jsonl_str(s: &str) -> Result<Self> {
        let mut steps = Vec::new();
        for (idx, line) in s.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let step: TranscriptStep = serde_json::from_str(line)
                .map_err(|e| Error::parse("transcript", format!("line {}: {e}", idx + 1)))?;
            steps.push(step);
        }

        Ok(Self { steps })
    }

    /// Load a transcript from a JSONL file.
    pub fn from_jsonl_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_jsonl_str(&data)
    }
}

/// The client deviated from the transcript.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("transcript step {step}: expected {expected:?}, got {got:?}")]
pub struct TranscriptMismatch {
    /// Zero-based index of the failing step.
    pub step: usize,
    /// Command the transcript expected.
    pub expected: String,
    /// Command actually received (empty if the client hung up).
    pub got: String,
}

/// Replay a transcript by acting as the matrix for a single connection.
///
/// The server sends/receives text exactly as specified and stops at the
/// first deviation.
#[derive(Debug)]
pub struct ReplayServer {
    runner: Runner,
}

impl ReplayServer {
    /// Start on 127.0.0.1 with an ephemeral port.
    pub fn start(transcript: Transcript) -> Result<Self> {
        let runner = Runner::spawn("hdmimatrix-replay", move |listener, journal, shutdown| {
            replay(listener, transcript, journal, shutdown)
        })?;
        Ok(Self { runner })
    }

    /// Endpoint clients should connect to.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        self.runner.endpoint.clone()
    }

    /// Shut down and report whether the client followed the transcript.
    pub fn finish(self) -> std::result::Result<(), TranscriptMismatch> {
        self.runner.shutdown();
        match with_journal(&self.runner.journal, |j| j.mismatch.take()) {
            Some(mismatch) => Err(mismatch),
            None => Ok(()),
        }
    }
}

async fn replay(
    listener: TcpListener,
    transcript: Transcript,
    journal: SharedJournal,
    mut shutdown: oneshot::Receiver<()>,
) {
    let stream = tokio::select! {
        _ = &mut shutdown => return,
        accepted = listener.accept() => match accepted {
            Ok((stream, _peer)) => stream,
            Err(_) => return,
        },
    };

    tokio::select! {
        _ = &mut shutdown => {}
        mismatch = replay_connection(stream, transcript) => {
            if let Some(mismatch) = mismatch {
                with_journal(&journal, |j| j.mismatch = Some(mismatch));
            }
        }
    }
}

async fn replay_connection(mut stream: TcpStream, transcript: Transcript) -> Option<TranscriptMismatch> {
    let mut pending = String::new();

    for (step, entry) in transcript.steps.into_iter().enumerate() {
        match entry {
            TranscriptStep::Server { text } => {
                if stream.write_all(text.as_bytes()).await.is_err() {
                    return None;
                }
            }
            TranscriptStep::Client { text: expected } => {
                let got = recv_command(&mut stream, &mut pending)
                    .await
                    .unwrap_or_default();
                if got != expected.trim() {
                    return Some(TranscriptMismatch {
                        step,
                        expected,
                        got,
                    });
                }
            }
        }
    }

    None
}
