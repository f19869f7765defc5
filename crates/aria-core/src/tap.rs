//! NDJSON framing for the session tap: one JSON envelope per line carrying
//! either an inbound console event or an outbound command/snapshot.

use crate::command::{Command, DraftField, LookupForm};
use crate::state::{ConsoleEvent, ConsoleSnapshot};
use crate::transcript::Segment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 256 * 1024;
/// Frames carrying any other `version` are rejected by [`decode_frame`].
pub const TAP_VERSION: u16 = 1;

fn tap_version() -> u16 {
    TAP_VERSION
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TapEnvelope {
    #[serde(default = "tap_version")]
    pub version: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(flatten)]
    pub msg: TapMsg,
}

impl TapEnvelope {
    pub fn new(session_id: &str, msg: TapMsg) -> Self {
        Self {
            version: TAP_VERSION,
            session_id: Some(session_id.to_string()),
            timestamp: Some(Utc::now().to_rfc3339()),
            msg,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum TapMsg {
    AgentTranscript(TranscriptPayload),
    UserTranscript(TranscriptPayload),
    Insight(InsightPayload),
    Lookup(LookupForm),
    ListContracts,
    ListClaims,
    EditDraft(DraftEditPayload),
    SubmitClaim,
    Connect,
    Connected(ConnectedPayload),
    ConnectFailed(ConnectFailedPayload),
    Disconnected,
    Command(CommandPayload),
    Snapshot(Box<ConsoleSnapshot>),
}

impl TapMsg {
    /// Inbound frames map to console events; outbound frames map to nothing.
    pub fn into_event(self) -> Option<ConsoleEvent> {
        let event = match self {
            Self::AgentTranscript(payload) => ConsoleEvent::AgentTranscript(payload.segments),
            Self::UserTranscript(payload) => ConsoleEvent::UserTranscript(payload.segments),
            Self::Insight(payload) => ConsoleEvent::InsightReceived(payload.into_bytes()),
            Self::Lookup(form) => ConsoleEvent::LookupSubmitted(form),
            Self::ListContracts => ConsoleEvent::ListContractsRequested,
            Self::ListClaims => ConsoleEvent::ListClaimsRequested,
            Self::EditDraft(payload) => ConsoleEvent::DraftEdited {
                field: payload.field,
                value: payload.value,
            },
            Self::SubmitClaim => ConsoleEvent::ClaimSubmitted,
            Self::Connect => ConsoleEvent::ConnectRequested,
            Self::Connected(payload) => ConsoleEvent::Connected {
                at: payload.at.unwrap_or_else(Utc::now),
            },
            Self::ConnectFailed(payload) => ConsoleEvent::ConnectFailed(payload.reason),
            Self::Disconnected => ConsoleEvent::Disconnected,
            Self::Command(_) | Self::Snapshot(_) => return None,
        };
        Some(event)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TranscriptPayload {
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// Raw insight-channel message. `text` covers the usual UTF-8 case, `bytes`
/// carries anything else untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InsightPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<Vec<u8>>,
}

impl InsightPayload {
    pub fn into_bytes(self) -> Vec<u8> {
        match (self.bytes, self.text) {
            (Some(bytes), _) => bytes,
            (None, Some(text)) => text.into_bytes(),
            (None, None) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DraftEditPayload {
    pub field: DraftField,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectedPayload {
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConnectFailedPayload {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommandPayload {
    pub command: String,
    pub text: String,
}

impl From<&Command> for CommandPayload {
    fn from(command: &Command) -> Self {
        Self {
            command: command.name().to_string(),
            text: command.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("frame exceeds max size: {size} > {max}")]
    OversizedFrame { size: usize, max: usize },
    #[error("unterminated line exceeds max size: {size} > {max}")]
    UnterminatedLine { size: usize, max: usize },
    #[error("unsupported tap version {found}")]
    UnsupportedVersion { found: u16 },
    #[error("frame encode failed: {0}")]
    Encode(String),
    #[error("frame decode failed: {0}")]
    Decode(String),
}

/// Everything one read produced: envelopes in arrival order plus the lines
/// that were dropped.
#[derive(Debug, Clone, Default)]
pub struct DecodeReport {
    pub frames: Vec<TapEnvelope>,
    pub errors: Vec<FrameError>,
}

impl DecodeReport {
    fn record(&mut self, decoded: Result<TapEnvelope, FrameError>) {
        match decoded {
            Ok(envelope) => self.frames.push(envelope),
            Err(err) => self.errors.push(err),
        }
    }

    pub fn extend(&mut self, other: DecodeReport) {
        self.frames.extend(other.frames);
        self.errors.extend(other.errors);
    }
}

pub fn encode_frame(envelope: &TapEnvelope, max_frame_bytes: usize) -> Result<Vec<u8>, FrameError> {
    let mut encoded =
        serde_json::to_vec(envelope).map_err(|err| FrameError::Encode(err.to_string()))?;
    if encoded.len() > max_frame_bytes {
        return Err(FrameError::OversizedFrame {
            size: encoded.len(),
            max: max_frame_bytes,
        });
    }
    encoded.push(b'\n');
    Ok(encoded)
}

/// Decodes a single line (trailing `\r\n` allowed) and checks its version.
pub fn decode_frame(line: &[u8], max_frame_bytes: usize) -> Result<TapEnvelope, FrameError> {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.len() > max_frame_bytes {
        return Err(FrameError::OversizedFrame {
            size: line.len(),
            max: max_frame_bytes,
        });
    }
    let envelope: TapEnvelope =
        serde_json::from_slice(line).map_err(|err| FrameError::Decode(err.to_string()))?;
    if envelope.version != TAP_VERSION {
        return Err(FrameError::UnsupportedVersion {
            found: envelope.version,
        });
    }
    Ok(envelope)
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

/// Reassembles tap lines from arbitrary read chunks. A bad line is reported
/// and skipped; the lines after it still decode.
#[derive(Debug)]
pub struct TapReader {
    max_frame_bytes: usize,
    buffer: Vec<u8>,
}

impl Default for TapReader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl TapReader {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            buffer: Vec::new(),
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) -> DecodeReport {
        self.buffer.extend_from_slice(chunk);
        let mut report = DecodeReport::default();

        let mut consumed = 0;
        while let Some(offset) = self.buffer[consumed..].iter().position(|byte| *byte == b'\n') {
            let line = &self.buffer[consumed..consumed + offset];
            if !is_blank(line) {
                report.record(decode_frame(line, self.max_frame_bytes));
            }
            consumed += offset + 1;
        }
        self.buffer.drain(..consumed);

        if self.buffer.len() > self.max_frame_bytes {
            report.errors.push(FrameError::UnterminatedLine {
                size: self.buffer.len(),
                max: self.max_frame_bytes,
            });
            self.buffer.clear();
        }
        report
    }

    /// Decodes whatever is left once the stream has ended.
    pub fn finish(&mut self) -> DecodeReport {
        let mut report = DecodeReport::default();
        let rest = std::mem::take(&mut self.buffer);
        if !is_blank(&rest) {
            report.record(decode_frame(&rest, self.max_frame_bytes));
        }
        report
    }
}
