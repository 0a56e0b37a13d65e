//! Reply accumulation and termination.
//!
//! The device has no framing: a reply is whatever arrives until either an
//! optional terminator shows up or the line goes quiet. The adapters own the
//! socket reads; [`ReplyBuffer`] and [`ReadClock`] decide when to stop.

use std::time::{Duration, Instant};

use crate::client::ReadOptions;

/// Size of a single socket read.
pub(crate) const RECV_BUFFER: usize = 2048;

/// What the adapter should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wait {
    /// Wait at most this long for the next chunk.
    For(Duration),
    /// The reply is complete.
    Complete,
    /// Nothing arrived within the response timeout.
    TimedOut,
}

/// Tracks the idle and overall deadlines of one reply.
#[derive(Debug, Clone)]
pub(crate) struct ReadClock {
    started: Instant,
    last_data: Option<Instant>,
    idle: Duration,
    total: Duration,
}

impl ReadClock {
    pub(crate) fn start(options: &ReadOptions) -> Self {
        Self::start_at(Instant::now(), options)
    }

    fn start_at(now: Instant, options: &ReadOptions) -> Self {
        Self {
            started: now,
            last_data: None,
            idle: options.idle_timeout,
            total: options.response_timeout,
        }
    }

    pub(crate) fn next(&self) -> Wait {
        self.next_at(Instant::now())
    }

    fn next_at(&self, now: Instant) -> Wait {
        let total_left = self.total.saturating_sub(now - self.started);
        match self.last_data {
            Some(last) => {
                let idle_left = self.idle.saturating_sub(now - last);
                if idle_left.is_zero() || total_left.is_zero() {
                    Wait::Complete
                } else {
                    Wait::For(idle_left.min(total_left))
                }
            }
            None if total_left.is_zero() => Wait::TimedOut,
            None => Wait::For(total_left),
        }
    }

    pub(crate) fn record_data(&mut self) {
        self.last_data = Some(Instant::now());
    }
}

/// A finished reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Reply {
    /// Trimmed ASCII text.
    pub(crate) text: String,
    /// The peer closed the socket while (or instead of) replying.
    pub(crate) peer_closed: bool,
}

/// Accumulates raw chunks into reply text.
#[derive(Debug, Clone)]
pub(crate) struct ReplyBuffer {
    text: String,
    terminator: Option<String>,
    peer_closed: bool,
}

impl ReplyBuffer {
    pub(crate) fn new(options: &ReadOptions) -> Self {
        Self {
            text: String::new(),
            terminator: options.terminator.clone().filter(|t| !t.is_empty()),
            peer_closed: false,
        }
    }

    /// Append a chunk; non-ASCII bytes are dropped.
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.text.extend(
            chunk
                .iter()
                .filter(|b| b.is_ascii())
                .map(|b| char::from(*b)),
        );
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.terminator.as_deref().is_some_and(|t| {
            self.text.ends_with(t) || self.text.trim_end().ends_with(t)
        })
    }

    pub(crate) fn mark_closed(&mut self) {
        self.peer_closed = true;
    }

    pub(crate) fn finish(self) -> Reply {
        Reply {
            text: self.text.trim().to_string(),
            peer_closed: self.peer_closed,
        }
    }
}
