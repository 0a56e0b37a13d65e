//! Line-tolerant parsers for the free-form status replies.
//!
//! The firmware prints human readable text whose exact wording varies
//! between models and versions. Every parser works line by line and skips
//! lines it does not understand; only a reply without a single usable line
//! is an error.

use crate::{
    error::{Error, Result},
    types::{DeviceStatus, PortState, PortStates, RoutingMap},
};

const OUTPUT_LABELS: &[&str] = &["output", "out"];
const INPUT_LABELS: &[&str] = &["input", "in"];
const PORT_LABELS: &[&str] = &[
    "output", "out", "input", "in", "port", "hdbt", "hdmi", "ch", "channel", "tx", "rx",
];

const ON_WORDS: &[&str] = &[
    "on", "connect", "connected", "link", "linked", "enable", "enabled", "yes", "active",
    "plugged",
];
// Checked first: "no link" must read as off.
const OFF_WORDS: &[&str] = &[
    "off",
    "disconnect",
    "disconnected",
    "nolink",
    "unlink",
    "unlinked",
    "disable",
    "disabled",
    "no",
    "inactive",
    "unplugged",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    Word(&'a str),
    Number(u32),
}

impl Token<'_> {
    fn is_one_of(self, words: &[&str]) -> bool {
        match self {
            Token::Word(w) => words.iter().any(|c| w.eq_ignore_ascii_case(c)),
            Token::Number(_) => false,
        }
    }
}

/// Split a line into letter runs and digit runs; everything else separates.
///
/// `"IN1"` yields `Word("IN"), Number(1)`; `"01"` yields `Number(1)`.
fn tokens(line: &str) -> Vec<Token<'_>> {
    let bytes = line.as_bytes();
    let mut out = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        if bytes[i].is_ascii_alphabetic() {
            while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                i += 1;
            }
            out.push(Token::Word(&line[start..i]));
        } else if bytes[i].is_ascii_digit() {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            // Absurdly long digit runs are dropped rather than saturated.
            if let Ok(n) = line[start..i].parse::<u32>() {
                out.push(Token::Number(n));
            }
        } else {
            i += 1;
        }
    }

    out
}

fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\r', '\n'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
}

fn port(n: u32) -> Option<u8> {
    u8::try_from(n).ok().filter(|p| *p >= 1)
}

/// Position of the first `label <number>` pair at or after `from`.
fn labelled_number(toks: &[Token<'_>], from: usize, labels: &[&str]) -> Option<(usize, u32)> {
    toks.windows(2)
        .enumerate()
        .skip(from)
        .find_map(|(idx, pair)| match pair {
            [label, Token::Number(n)] if label.is_one_of(labels) => Some((idx, *n)),
            _ => None,
        })
}

/// Extract `(output, input)` from a single routing line such as
/// `Output 01 Switch To In 03!`.
pub(crate) fn routing_line(line: &str) -> Option<(u8, u8)> {
    let toks = tokens(line);
    let (at, output) = labelled_number(&toks, 0, OUTPUT_LABELS)?;
    let (_, input) = labelled_number(&toks, at + 2, INPUT_LABELS)?;
    Some((port(output)?, port(input)?))
}

fn state_of(toks: &[Token<'_>]) -> Option<PortState> {
    if toks.iter().any(|t| t.is_one_of(OFF_WORDS)) {
        Some(PortState::Off)
    } else if toks.iter().any(|t| t.is_one_of(ON_WORDS)) {
        Some(PortState::On)
    } else {
        None
    }
}

fn port_state_line(line: &str) -> Option<(u8, PortState)> {
    let toks = tokens(line);
    let number = match labelled_number(&toks, 0, PORT_LABELS) {
        Some((_, n)) => n,
        None => toks.iter().find_map(|t| match t {
            Token::Number(n) => Some(*n),
            Token::Word(_) => None,
        })?,
    };
    Some((port(number)?, state_of(&toks)?))
}

/// Parse a `STA_VIDEO.` reply into an output → input map.
///
/// Lines look like `Output 1 Switch To In 3!`; case, padding, extra labels
/// and punctuation do not matter. Lines without an `output <n> .. in <m>`
/// pair are skipped.
pub fn parse_video_status(text: &str) -> Result<RoutingMap> {
    let mut routing = RoutingMap::new();
    for line in lines(text) {
        if let Some((output, input)) = routing_line(line) {
            routing.insert(output, input);
        }
    }

    if routing.is_empty() {
        return Err(Error::parse(
            "video status",
            "no line matched 'Output <n> ... In <m>'",
        ));
    }
    Ok(routing)
}

/// Parse a per-port status reply (`STA_IN.`, `STA_OUT.`, `STA_HDCP.`, ...).
///
/// A line counts when it carries a port number and a recognised state word
/// (`ON`/`OFF`, `Connect`/`Disconnect`, `Enable`/`Disable`, ...).
/// `what` names the reply in the error message.
pub fn parse_port_states(text: &str, what: &'static str) -> Result<PortStates> {
    let mut states = PortStates::new();
    for line in lines(text) {
        if let Some((port, state)) = port_state_line(line) {
            states.insert(port, state);
        }
    }

    if states.is_empty() {
        return Err(Error::parse(what, "no line carried a port and a state"));
    }
    Ok(states)
}

enum Section {
    Outputs,
    Hdcp,
    Downscaling,
}

fn section_of(toks: &[Token<'_>]) -> Option<Section> {
    match toks.first()? {
        Token::Word(w) => {
            let w = w.to_ascii_lowercase();
            if w == "hdcp" {
                Some(Section::Hdcp)
            } else if w == "ds" || w.starts_with("downscal") {
                Some(Section::Downscaling)
            } else if w == "out" || w == "output" {
                Some(Section::Outputs)
            } else {
                None
            }
        }
        Token::Number(_) => None,
    }
}

fn key_value(line: &str) -> (&str, &str) {
    let split = line
        .split_once([':', '='])
        .or_else(|| line.split_once(char::is_whitespace));
    match split {
        Some((k, v)) => (k.trim(), v.trim()),
        None => (line, ""),
    }
}

/// Parse the `STA.` reply into a [`DeviceStatus`].
///
/// Understands `Key: value` (or `Key value`) lines for name, type/model,
/// version/firmware and power, plus per-port lines starting with `Output`,
/// `HDCP` or `DS`/`Downscaling`.
pub fn parse_device_status(text: &str) -> Result<DeviceStatus> {
    let mut status = DeviceStatus {
        raw: text.trim().to_string(),
        ..DeviceStatus::default()
    };

    for line in lines(text) {
        let toks = tokens(line);

        if let Some(section) = section_of(&toks) {
            if let Some((port, state)) = port_state_line(line) {
                match section {
                    Section::Outputs => status.outputs.insert(port, state),
                    Section::Hdcp => status.hdcp.insert(port, state),
                    Section::Downscaling => status.downscaling.insert(port, state),
                }
                continue;
            }
        }

        let (key, value) = key_value(line);
        if value.is_empty() {
            continue;
        }
        let key = key.to_ascii_lowercase();

        if key.contains("name") {
            status.name = Some(value.to_string());
        } else if key.contains("type") || key.contains("model") {
            status.device_type = Some(value.to_string());
        } else if key.contains("version") || key.contains("firmware") {
            status.firmware_version = Some(value.to_string());
        } else if key.contains("power") {
            if let Some(state) = state_of(&tokens(value)) {
                status.power = Some(state);
            }
        }
    }

    if !status.has_fields() {
        return Err(Error::parse("device status", "no recognised field"));
    }
    Ok(status)
}
