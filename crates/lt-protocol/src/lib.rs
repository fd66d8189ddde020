// lt-protocol: wire types for the group-listening session hub.
//
// Every WebSocket message is a three-field envelope: `type`, an optional
// `action` (used by the `command` category), and an opaque `payload`. The
// envelope itself is never serde-tagged, because an unrecognized `type` or
// `action` must still deserialize successfully so the server can report it
// back to the sender as an `UnknownAction` error instead of dropping the
// frame outright.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ParticipantId = Uuid;

/// Top-level message category. `command` is client -> server; every other
/// variant is server -> client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Welcome,
    State,
    Participants,
    Remote,
    RemoteRequested,
    Error,
    Command,
}

/// The self-describing envelope every frame is wrapped in.
///
/// `payload` is preserved verbatim (an opaque JSON value) until a specific
/// handler decodes it via [`TryFrom`] into a typed payload struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Envelope {
    pub fn new(kind: MessageType, action: Option<&str>, payload: impl Serialize) -> Self {
        Self {
            kind,
            action: action.map(ToOwned::to_owned),
            payload: Some(serde_json::to_value(payload).expect("payload must serialize")),
        }
    }

    pub fn command(action: &str, payload: impl Serialize) -> Self {
        Self::new(MessageType::Command, Some(action), payload)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("envelope must serialize")
    }
}

/// Errors decoding a frame or an envelope's payload into a typed value.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(String),
    #[error("missing or invalid payload for action {0:?}")]
    InvalidPayload(String),
    #[error("unrecognized command action {0:?}")]
    UnknownAction(String),
}

/// Parse a raw text frame into an [`Envelope`].
pub fn decode_frame(text: &str) -> Result<Envelope, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

impl ProtocolError {
    /// The wire error code sent back to the client in `ErrorPayload::code`.
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::Malformed(_) => "MALFORMED_FRAME",
            ProtocolError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ProtocolError::UnknownAction(_) => "UNKNOWN_ACTION",
        }
    }
}

// ---------------------------------------------------------------------------
// Track / queue wire shapes
// ---------------------------------------------------------------------------

/// The wire shape of a queued track, including its streaming token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPayload {
    pub id: usize,
    pub token: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: f64,
    pub media_file_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub id: ParticipantId,
    pub name: String,
    pub is_host: bool,
}

// ---------------------------------------------------------------------------
// Server -> client payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WelcomePayload {
    pub your_id: ParticipantId,
}

/// Cause of a `state` broadcast, carried so clients can distinguish an
/// authoritative seek (apply `position`) from a list update (ignore it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateAction {
    Play,
    Pause,
    Seek,
    SkipNext,
    SkipPrev,
    QueueAdd,
    QueueRemove,
    QueueReorder,
    Welcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatePayload {
    pub action: StateAction,
    pub current_track_index: usize,
    pub position: f64,
    pub is_playing: bool,
    pub queue: Vec<TrackPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantsPayload {
    pub participants: Vec<ParticipantInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePayload {
    pub holder_id: ParticipantId,
    pub holder_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRequestedPayload {
    pub from_id: ParticipantId,
    pub from_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

pub const SESSION_ENDED_ACTION: &str = "session_ended";

impl Envelope {
    pub fn welcome(your_id: ParticipantId) -> Self {
        Self::new(MessageType::Welcome, None, WelcomePayload { your_id })
    }

    pub fn state(payload: StatePayload) -> Self {
        let action = serde_json::to_value(payload.action)
            .ok()
            .and_then(|v| v.as_str().map(ToOwned::to_owned));
        Self::new(MessageType::State, action.as_deref(), payload)
    }

    pub fn participants(payload: ParticipantsPayload) -> Self {
        Self::new(MessageType::Participants, None, payload)
    }

    pub fn remote(payload: RemotePayload) -> Self {
        Self::new(MessageType::Remote, None, payload)
    }

    pub fn remote_requested(payload: RemoteRequestedPayload) -> Self {
        Self::new(MessageType::RemoteRequested, None, payload)
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(
            MessageType::Error,
            None,
            ErrorPayload {
                code: code.into(),
                message: message.into(),
                action: None,
            },
        )
    }

    pub fn session_ended() -> Self {
        Self::new(
            MessageType::Error,
            Some(SESSION_ENDED_ACTION),
            ErrorPayload {
                code: "SESSION_ENDED".to_owned(),
                message: "the session has ended".to_owned(),
                action: Some(SESSION_ENDED_ACTION.to_owned()),
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Client -> server commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeekCommand {
    pub position: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncCommand {
    pub position: f64,
    pub track_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassRemoteCommand {
    pub participant_id: ParticipantId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptRemoteRequestCommand {
    pub participant_id: ParticipantId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueAddCommand {
    pub media_file_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueRemoveCommand {
    pub queue_position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueReorderCommand {
    pub from: usize,
    pub to: usize,
}

/// A decoded `command`-category message. Unknown actions and malformed
/// payloads are reported through [`ProtocolError`], never silently dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play,
    Pause,
    Seek(SeekCommand),
    SkipNext,
    SkipPrev,
    Sync(SyncCommand),
    PassRemote(PassRemoteCommand),
    RequestRemote,
    AcceptRemoteRequest(AcceptRemoteRequestCommand),
    QueueAdd(QueueAddCommand),
    QueueRemove(QueueRemoveCommand),
    QueueReorder(QueueReorderCommand),
    EndSession,
}

impl Command {
    /// Decode a `command`-category envelope into a typed [`Command`].
    ///
    /// Returns `UnknownAction` for an unrecognized action and
    /// `InvalidPayload` when the action is known but the payload doesn't
    /// match its shape.
    pub fn decode(envelope: &Envelope) -> Result<Self, ProtocolError> {
        let action = envelope
            .action
            .as_deref()
            .ok_or_else(|| ProtocolError::InvalidPayload("<missing action>".to_owned()))?;

        fn payload<T: for<'de> Deserialize<'de>>(
            envelope: &Envelope,
            action: &str,
        ) -> Result<T, ProtocolError> {
            let value = envelope
                .payload
                .clone()
                .ok_or_else(|| ProtocolError::InvalidPayload(action.to_owned()))?;
            serde_json::from_value(value)
                .map_err(|_| ProtocolError::InvalidPayload(action.to_owned()))
        }

        match action {
            "play" => Ok(Command::Play),
            "pause" => Ok(Command::Pause),
            "seek" => Ok(Command::Seek(payload(envelope, action)?)),
            "skip_next" => Ok(Command::SkipNext),
            "skip_prev" => Ok(Command::SkipPrev),
            "sync" => Ok(Command::Sync(payload(envelope, action)?)),
            "pass_remote" => Ok(Command::PassRemote(payload(envelope, action)?)),
            "request_remote" => Ok(Command::RequestRemote),
            "accept_remote_request" => {
                Ok(Command::AcceptRemoteRequest(payload(envelope, action)?))
            }
            "queue_add" => Ok(Command::QueueAdd(payload(envelope, action)?)),
            "queue_remove" => Ok(Command::QueueRemove(payload(envelope, action)?)),
            "queue_reorder" => Ok(Command::QueueReorder(payload(envelope, action)?)),
            "end_session" => Ok(Command::EndSession),
            other => Err(ProtocolError::UnknownAction(other.to_owned())),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP API shapes (frozen schema definitions, mirrored from the teacher's
// response contract)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// One entry of `GET /{base}/lt/{sessionId}/search` results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSearchResult {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: f64,
}

/// The claims a minted streaming token decodes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamTokenClaims {
    pub track_id: String,
    pub media_file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bit_rate: Option<u32>,
    pub expires_at_unix: u64,
}
