// Participant (C4): identity plus the send-queue endpoint the Session
// addresses it through. No direct reference to a transport socket leaks
// beyond the Connection that owns it.

use std::time::Instant;
use tokio::sync::mpsc;

use lt_protocol::{Envelope, ParticipantId};

/// Bounded outbound send queue capacity (spec.md 4.3): full queues drop
/// the newest message rather than block the sender.
pub const OUTBOX_CAPACITY: usize = 16;

pub struct Participant {
    pub id: ParticipantId,
    pub name: String,
    pub is_host: bool,
    pub joined_at: Instant,
    outbox: mpsc::Sender<Envelope>,
}

impl Participant {
    pub fn new(
        id: ParticipantId,
        name: String,
        is_host: bool,
    ) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        (
            Self {
                id,
                name,
                is_host,
                joined_at: Instant::now(),
                outbox: tx,
            },
            rx,
        )
    }

    pub fn outbox_sender(&self) -> mpsc::Sender<Envelope> {
        self.outbox.clone()
    }

    pub fn info(&self) -> lt_protocol::ParticipantInfo {
        lt_protocol::ParticipantInfo {
            id: self.id,
            name: self.name.clone(),
            is_host: self.is_host,
        }
    }
}
