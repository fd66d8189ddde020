// Typed session errors (spec.md 7): one variant per rejection path, each
// carrying the wire code sent back in `ErrorPayload::code` alongside its
// `Display` message.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("only the remote holder can control playback")]
    AuthorityDenied,
    #[error("participant not found")]
    ParticipantNotFound,
    #[error("queue position out of range")]
    QueuePositionOutOfRange,
    #[error("cannot remove current track")]
    CannotRemoveCurrentTrack,
    #[error("reorder position out of range")]
    ReorderPositionOutOfRange,
    #[error("media not found: {0}")]
    MediaNotFound(String),
    #[error("frame exceeds maximum size")]
    FrameTooLarge,
    #[error("binary frames are not supported")]
    BinaryUnsupported,
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::AuthorityDenied => "AUTHORITY_DENIED",
            SessionError::ParticipantNotFound => "PARTICIPANT_NOT_FOUND",
            SessionError::QueuePositionOutOfRange => "QUEUE_POSITION_OUT_OF_RANGE",
            SessionError::CannotRemoveCurrentTrack => "CANNOT_REMOVE_CURRENT_TRACK",
            SessionError::ReorderPositionOutOfRange => "REORDER_POSITION_OUT_OF_RANGE",
            SessionError::MediaNotFound(_) => "MEDIA_NOT_FOUND",
            SessionError::FrameTooLarge => "FRAME_TOO_LARGE",
            SessionError::BinaryUnsupported => "BINARY_UNSUPPORTED",
        }
    }
}

/// Build the wire envelope for a typed session error in one step.
pub fn error_envelope(err: SessionError) -> lt_protocol::Envelope {
    lt_protocol::Envelope::error(err.code(), err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_variant_has_a_distinct_code() {
        let variants = [
            SessionError::AuthorityDenied,
            SessionError::ParticipantNotFound,
            SessionError::QueuePositionOutOfRange,
            SessionError::CannotRemoveCurrentTrack,
            SessionError::ReorderPositionOutOfRange,
            SessionError::MediaNotFound("x".to_owned()),
            SessionError::FrameTooLarge,
            SessionError::BinaryUnsupported,
        ];
        let mut codes: Vec<&str> = variants.iter().map(SessionError::code).collect();
        let len_before = codes.len();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), len_before);
    }
}
