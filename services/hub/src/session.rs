// Session (C5): authoritative per-session state. The write lock is never
// held across a send -- every mutating command takes the lock, builds the
// envelope(s) and a snapshot of the outbox senders to notify, releases the
// lock, then enqueues (spec.md 4.5.5, 5).

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use lt_protocol::{
    Command, Envelope, ParticipantId, ParticipantsPayload, RemotePayload, RemoteRequestedPayload,
    StateAction, StatePayload, TrackPayload,
};

use crate::collaborators::{MediaLibrary, SessionDescriptor};
use crate::error::SessionError;
use crate::hub::Hub;
use crate::participant::Participant;
use crate::token::TokenMinter;

/// An immutable record within a live session (spec.md 3). Tokens are minted
/// once, at session build or queue-add.
#[derive(Debug, Clone)]
pub struct Track {
    pub media_file_id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: f64,
    pub token: String,
}

struct SessionState {
    tracks: Vec<Track>,
    queue: Vec<usize>,
    current_index: usize,
    position: f64,
    is_playing: bool,
    participants: HashMap<ParticipantId, Participant>,
    remote_holder: Option<ParticipantId>,
    grace_handle: Option<tokio::task::JoinHandle<()>>,
}

impl SessionState {
    fn state_payload(&self, action: StateAction) -> StatePayload {
        let queue = self
            .queue
            .iter()
            .map(|&track_idx| {
                let t = &self.tracks[track_idx];
                TrackPayload {
                    id: track_idx,
                    token: t.token.clone(),
                    title: t.title.clone(),
                    artist: t.artist.clone(),
                    album: t.album.clone(),
                    duration: t.duration,
                    media_file_id: t.media_file_id.clone(),
                }
            })
            .collect();
        StatePayload {
            action,
            current_track_index: self.current_index,
            position: self.position,
            is_playing: self.is_playing,
            queue,
        }
    }

    fn participants_payload(&self) -> ParticipantsPayload {
        ParticipantsPayload {
            participants: self.participants.values().map(Participant::info).collect(),
        }
    }

    fn remote_payload(&self) -> Option<RemotePayload> {
        let holder_id = self.remote_holder?;
        let holder = self.participants.get(&holder_id)?;
        Some(RemotePayload {
            holder_id,
            holder_name: holder.name.clone(),
        })
    }

    fn broadcast_targets(&self) -> Vec<mpsc::Sender<Envelope>> {
        self.participants
            .values()
            .map(Participant::outbox_sender)
            .collect()
    }

    fn target(&self, id: ParticipantId) -> Option<mpsc::Sender<Envelope>> {
        self.participants.get(&id).map(Participant::outbox_sender)
    }
}

fn dispatch(envelope: Envelope, targets: Vec<mpsc::Sender<Envelope>>) {
    for tx in targets {
        let _ = tx.try_send(envelope.clone());
    }
}

fn send_to(envelope: Envelope, target: Option<mpsc::Sender<Envelope>>) {
    if let Some(tx) = target {
        let _ = tx.try_send(envelope);
    }
}

/// A read-only view of session state, for tests and diagnostics.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub queue: Vec<usize>,
    pub current_index: usize,
    pub position: f64,
    pub is_playing: bool,
    pub remote_holder: Option<ParticipantId>,
    pub participant_ids: Vec<ParticipantId>,
}

pub struct Session {
    pub id: String,
    pub host_user_id: String,
    pub format: Option<String>,
    pub max_bit_rate: Option<u32>,
    state: RwLock<SessionState>,
    library: Arc<dyn MediaLibrary>,
    minter: TokenMinter,
    hub: Weak<Hub>,
    grace_period: Duration,
}

impl Session {
    pub fn new(
        descriptor: SessionDescriptor,
        library: Arc<dyn MediaLibrary>,
        minter: TokenMinter,
        hub: Weak<Hub>,
        grace_period: Duration,
    ) -> Self {
        let tracks: Vec<Track> = descriptor
            .tracks
            .iter()
            .enumerate()
            .map(|(i, t)| Track {
                media_file_id: t.media_file_id.clone(),
                title: t.title.clone(),
                artist: t.artist.clone(),
                album: t.album.clone(),
                duration: t.duration,
                token: minter.mint(
                    i,
                    &t.media_file_id,
                    descriptor.format.clone(),
                    descriptor.max_bit_rate,
                ),
            })
            .collect();
        let queue: Vec<usize> = (0..tracks.len()).collect();
        Self {
            id: descriptor.id,
            host_user_id: descriptor.host_user_id,
            format: descriptor.format,
            max_bit_rate: descriptor.max_bit_rate,
            state: RwLock::new(SessionState {
                tracks,
                queue,
                current_index: 0,
                position: 0.0,
                is_playing: false,
                participants: HashMap::new(),
                remote_holder: None,
                grace_handle: None,
            }),
            library,
            minter,
            hub,
            grace_period,
        }
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.read().await;
        SessionSnapshot {
            queue: state.queue.clone(),
            current_index: state.current_index,
            position: state.position,
            is_playing: state.is_playing,
            remote_holder: state.remote_holder,
            participant_ids: state.participants.keys().copied().collect(),
        }
    }

    pub async fn search_library(&self, query: &str) -> Vec<lt_protocol::MediaSearchResult> {
        self.library.search(query).await
    }

    // -----------------------------------------------------------------
    // Membership (spec.md 4.5.4)
    // -----------------------------------------------------------------

    /// Admit a new participant, cancel any pending grace timer, and deliver
    /// the four-message welcome burst (in order) before broadcasting the
    /// updated membership to everyone.
    pub async fn join(
        self: &Arc<Self>,
        name: String,
        is_host: bool,
    ) -> (ParticipantId, mpsc::Receiver<Envelope>) {
        let id = Uuid::new_v4();
        let (participant, outbox_rx) = Participant::new(id, name, is_host);
        let joiner_outbox = participant.outbox_sender();

        let (welcome_burst, participants_env, remote_env, targets) = {
            let mut state = self.state.write().await;
            if let Some(handle) = state.grace_handle.take() {
                handle.abort();
            }
            let assign_remote = state.remote_holder.is_none() || is_host;
            state.participants.insert(id, participant);
            if assign_remote {
                state.remote_holder = Some(id);
            }

            let mut burst = vec![
                Envelope::welcome(id),
                Envelope::state(state.state_payload(StateAction::Welcome)),
                Envelope::participants(state.participants_payload()),
            ];
            let remote_env = state.remote_payload().map(Envelope::remote);
            if let Some(env) = remote_env.clone() {
                burst.push(env);
            }

            let participants_env = Envelope::participants(state.participants_payload());
            let targets = state.broadcast_targets();
            (burst, participants_env, remote_env, targets)
        };

        for env in welcome_burst {
            let _ = joiner_outbox.try_send(env);
        }
        dispatch(participants_env, targets.clone());
        if let Some(env) = remote_env {
            dispatch(env, targets);
        }

        info!(session_id = %self.id, participant_id = %id, "participant joined");
        (id, outbox_rx)
    }

    /// Remove a participant. Idempotent: a second call for an
    /// already-departed participant is a no-op, since the Connection's read
    /// loop and a Session-initiated close can both race to call this.
    pub async fn leave(self: &Arc<Self>, participant_id: ParticipantId) {
        let (transferred, participants_env, targets, arm_grace) = {
            let mut state = self.state.write().await;
            if state.participants.remove(&participant_id).is_none() {
                return;
            }

            let mut transferred = None;
            if state.remote_holder == Some(participant_id) {
                let new_holder = state
                    .participants
                    .values()
                    .min_by_key(|p| p.joined_at)
                    .map(|p| p.id);
                state.remote_holder = new_holder;
                if new_holder.is_some() {
                    transferred = state.remote_payload();
                }
            }

            let participants_env = Envelope::participants(state.participants_payload());
            let targets = state.broadcast_targets();
            let arm_grace = state.participants.is_empty();
            (transferred, participants_env, targets, arm_grace)
        };

        dispatch(participants_env, targets.clone());
        if let Some(remote_payload) = transferred {
            dispatch(Envelope::remote(remote_payload), targets);
        }

        info!(session_id = %self.id, participant_id = %participant_id, "participant left");

        if arm_grace {
            self.arm_grace_timer().await;
        }
    }

    async fn arm_grace_timer(self: &Arc<Self>) {
        let session = Arc::clone(self);
        let grace_period = self.grace_period;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace_period).await;
            let should_evict = session.state.read().await.participants.is_empty();
            if should_evict {
                if let Some(hub) = session.hub.upgrade() {
                    info!(session_id = %session.id, "grace period expired, evicting session");
                    hub.remove(&session.id).await;
                }
            }
        });
        self.state.write().await.grace_handle = Some(handle);
    }

    // -----------------------------------------------------------------
    // Command dispatch (spec.md 4.5.1)
    // -----------------------------------------------------------------

    pub async fn handle_command(self: &Arc<Self>, participant_id: ParticipantId, command: Command) {
        match command {
            Command::Play => self.cmd_play(participant_id).await,
            Command::Pause => self.cmd_pause(participant_id).await,
            Command::Seek(c) => self.cmd_seek(participant_id, c.position).await,
            Command::SkipNext => self.cmd_skip_next(participant_id).await,
            Command::SkipPrev => self.cmd_skip_prev(participant_id).await,
            Command::Sync(c) => self.cmd_sync(participant_id, c.position, c.track_index).await,
            Command::PassRemote(c) => self.cmd_transfer_remote(participant_id, c.participant_id).await,
            Command::RequestRemote => self.cmd_request_remote(participant_id).await,
            Command::AcceptRemoteRequest(c) => {
                self.cmd_transfer_remote(participant_id, c.participant_id).await
            }
            Command::QueueAdd(c) => self.cmd_queue_add(participant_id, c.media_file_id).await,
            Command::QueueRemove(c) => self.cmd_queue_remove(participant_id, c.queue_position).await,
            Command::QueueReorder(c) => self.cmd_queue_reorder(participant_id, c.from, c.to).await,
            Command::EndSession => self.cmd_end_session(participant_id).await,
        }
    }

    pub async fn report_protocol_error(&self, participant_id: ParticipantId, code: &str, message: String) {
        let state = self.state.read().await;
        let target = state.target(participant_id);
        drop(state);
        send_to(Envelope::error(code, message), target);
    }

    async fn deny(&self, state: tokio::sync::RwLockWriteGuard<'_, SessionState>, participant_id: ParticipantId) {
        let target = state.target(participant_id);
        drop(state);
        send_to(crate::error::error_envelope(SessionError::AuthorityDenied), target);
    }

    async fn cmd_play(self: &Arc<Self>, participant_id: ParticipantId) {
        let mut state = self.state.write().await;
        if state.remote_holder != Some(participant_id) {
            self.deny(state, participant_id).await;
            return;
        }
        if state.queue.is_empty() {
            return;
        }
        state.is_playing = true;
        let env = Envelope::state(state.state_payload(StateAction::Play));
        let targets = state.broadcast_targets();
        drop(state);
        dispatch(env, targets);
    }

    async fn cmd_pause(self: &Arc<Self>, participant_id: ParticipantId) {
        let mut state = self.state.write().await;
        if state.remote_holder != Some(participant_id) {
            self.deny(state, participant_id).await;
            return;
        }
        state.is_playing = false;
        let env = Envelope::state(state.state_payload(StateAction::Pause));
        let targets = state.broadcast_targets();
        drop(state);
        dispatch(env, targets);
    }

    async fn cmd_seek(self: &Arc<Self>, participant_id: ParticipantId, position: f64) {
        let mut state = self.state.write().await;
        if state.remote_holder != Some(participant_id) {
            self.deny(state, participant_id).await;
            return;
        }
        if state.queue.is_empty() {
            return;
        }
        let duration = state.tracks[state.queue[state.current_index]].duration;
        state.position = position.clamp(0.0, duration.max(0.0));
        let env = Envelope::state(state.state_payload(StateAction::Seek));
        let targets = state.broadcast_targets();
        drop(state);
        dispatch(env, targets);
    }

    async fn cmd_skip_next(self: &Arc<Self>, participant_id: ParticipantId) {
        let mut state = self.state.write().await;
        if state.remote_holder != Some(participant_id) {
            self.deny(state, participant_id).await;
            return;
        }
        if state.current_index + 1 >= state.queue.len() {
            return;
        }
        state.current_index += 1;
        state.position = 0.0;
        let env = Envelope::state(state.state_payload(StateAction::SkipNext));
        let targets = state.broadcast_targets();
        drop(state);
        dispatch(env, targets);
    }

    async fn cmd_skip_prev(self: &Arc<Self>, participant_id: ParticipantId) {
        let mut state = self.state.write().await;
        if state.remote_holder != Some(participant_id) {
            self.deny(state, participant_id).await;
            return;
        }
        if state.current_index == 0 {
            return;
        }
        state.current_index -= 1;
        state.position = 0.0;
        let env = Envelope::state(state.state_payload(StateAction::SkipPrev));
        let targets = state.broadcast_targets();
        drop(state);
        dispatch(env, targets);
    }

    /// Silent: the holder uses this to keep the server snapshot fresh. No
    /// broadcast, and non-holders are ignored without an error so a
    /// transfer race doesn't spam the old holder's client every 3s.
    async fn cmd_sync(self: &Arc<Self>, participant_id: ParticipantId, position: f64, track_index: usize) {
        let mut state = self.state.write().await;
        if state.remote_holder != Some(participant_id) {
            return;
        }
        state.position = position;
        if track_index < state.queue.len() {
            state.current_index = track_index;
        }
    }

    async fn cmd_request_remote(self: &Arc<Self>, participant_id: ParticipantId) {
        let state = self.state.read().await;
        let from_name = state
            .participants
            .get(&participant_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        let holder_target = state.remote_holder.and_then(|h| state.target(h));
        drop(state);
        send_to(
            Envelope::remote_requested(RemoteRequestedPayload {
                from_id: participant_id,
                from_name,
            }),
            holder_target,
        );
    }

    async fn cmd_transfer_remote(self: &Arc<Self>, participant_id: ParticipantId, target_id: ParticipantId) {
        let mut state = self.state.write().await;
        if state.remote_holder != Some(participant_id) {
            self.deny(state, participant_id).await;
            return;
        }
        if !state.participants.contains_key(&target_id) {
            let target = state.target(participant_id);
            drop(state);
            send_to(crate::error::error_envelope(SessionError::ParticipantNotFound), target);
            return;
        }
        state.remote_holder = Some(target_id);
        let env = Envelope::remote(state.remote_payload().expect("holder just assigned"));
        let targets = state.broadcast_targets();
        drop(state);
        dispatch(env, targets);
    }

    async fn cmd_queue_add(self: &Arc<Self>, participant_id: ParticipantId, media_file_id: String) {
        {
            let state = self.state.read().await;
            if state.remote_holder != Some(participant_id) {
                let target = state.target(participant_id);
                drop(state);
                send_to(crate::error::error_envelope(SessionError::AuthorityDenied), target);
                return;
            }
        }

        let resolved = match self.library.resolve(&media_file_id).await {
            Ok(track) => track,
            Err(e) => {
                warn!(session_id = %self.id, media_file_id = %media_file_id, error = %e, "queue_add lookup failed");
                let state = self.state.read().await;
                let target = state.target(participant_id);
                drop(state);
                send_to(
                    crate::error::error_envelope(SessionError::MediaNotFound(media_file_id)),
                    target,
                );
                return;
            }
        };

        let mut state = self.state.write().await;
        if state.remote_holder != Some(participant_id) {
            self.deny(state, participant_id).await;
            return;
        }
        let track_id = state.tracks.len();
        let token = self.minter.mint(
            track_id,
            &resolved.media_file_id,
            self.format.clone(),
            self.max_bit_rate,
        );
        state.tracks.push(Track {
            media_file_id: resolved.media_file_id,
            title: resolved.title,
            artist: resolved.artist,
            album: resolved.album,
            duration: resolved.duration,
            token,
        });
        let was_empty = state.queue.is_empty();
        state.queue.push(track_id);
        if was_empty {
            state.current_index = 0;
        }
        let env = Envelope::state(state.state_payload(StateAction::QueueAdd));
        let targets = state.broadcast_targets();
        drop(state);
        dispatch(env, targets);
    }

    async fn cmd_queue_remove(self: &Arc<Self>, participant_id: ParticipantId, queue_position: usize) {
        let mut state = self.state.write().await;
        if state.remote_holder != Some(participant_id) {
            self.deny(state, participant_id).await;
            return;
        }
        if queue_position >= state.queue.len() {
            let target = state.target(participant_id);
            drop(state);
            send_to(crate::error::error_envelope(SessionError::QueuePositionOutOfRange), target);
            return;
        }
        if queue_position == state.current_index {
            let target = state.target(participant_id);
            drop(state);
            send_to(crate::error::error_envelope(SessionError::CannotRemoveCurrentTrack), target);
            return;
        }
        state.queue.remove(queue_position);
        if queue_position < state.current_index {
            state.current_index -= 1;
        }
        let env = Envelope::state(state.state_payload(StateAction::QueueRemove));
        let targets = state.broadcast_targets();
        drop(state);
        dispatch(env, targets);
    }

    async fn cmd_queue_reorder(self: &Arc<Self>, participant_id: ParticipantId, from: usize, to: usize) {
        let mut state = self.state.write().await;
        if state.remote_holder != Some(participant_id) {
            self.deny(state, participant_id).await;
            return;
        }
        if from >= state.queue.len() || to >= state.queue.len() {
            let target = state.target(participant_id);
            drop(state);
            send_to(crate::error::error_envelope(SessionError::ReorderPositionOutOfRange), target);
            return;
        }
        let moved = state.queue.remove(from);
        state.queue.insert(to, moved);

        let current = state.current_index;
        if from == current {
            state.current_index = to;
        } else if from < current && to >= current {
            state.current_index -= 1;
        } else if from > current && to <= current {
            state.current_index += 1;
        }

        let env = Envelope::state(state.state_payload(StateAction::QueueReorder));
        let targets = state.broadcast_targets();
        drop(state);
        dispatch(env, targets);
    }

    async fn cmd_end_session(self: &Arc<Self>, participant_id: ParticipantId) {
        let (targets, should_evict) = {
            let mut state = self.state.write().await;
            if state.remote_holder != Some(participant_id) {
                self.deny(state, participant_id).await;
                return;
            }
            let targets = state.broadcast_targets();
            state.participants.clear();
            (targets, true)
        };
        dispatch(Envelope::session_ended(), targets);
        info!(session_id = %self.id, "session ended by remote holder");
        if should_evict {
            if let Some(hub) = self.hub.upgrade() {
                hub.remove(&self.id).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{DescriptorTrack, MediaLookupError};
    use async_trait::async_trait;
    use lt_protocol::{MediaSearchResult, MessageType, StateAction};
    use std::sync::Mutex as StdMutex;

    struct StubLibrary {
        tracks: StdMutex<HashMap<String, DescriptorTrack>>,
    }

    impl StubLibrary {
        fn new() -> Self {
            Self {
                tracks: StdMutex::new(HashMap::new()),
            }
        }

        fn with(track: DescriptorTrack) -> Self {
            let lib = Self::new();
            lib.tracks
                .lock()
                .unwrap()
                .insert(track.media_file_id.clone(), track);
            lib
        }
    }

    #[async_trait]
    impl MediaLibrary for StubLibrary {
        async fn resolve(&self, media_file_id: &str) -> Result<DescriptorTrack, MediaLookupError> {
            self.tracks
                .lock()
                .unwrap()
                .get(media_file_id)
                .cloned()
                .ok_or_else(|| MediaLookupError::NotFound(media_file_id.to_owned()))
        }

        async fn search(&self, _query: &str) -> Vec<MediaSearchResult> {
            vec![]
        }
    }

    fn descriptor(track_count: usize) -> SessionDescriptor {
        SessionDescriptor {
            id: "session-1".to_owned(),
            host_user_id: "host-user".to_owned(),
            tracks: (0..track_count)
                .map(|i| DescriptorTrack {
                    media_file_id: format!("media-{i}"),
                    title: format!("Track {i}"),
                    artist: "Artist".to_owned(),
                    album: "Album".to_owned(),
                    duration: 180.0,
                })
                .collect(),
            format: None,
            max_bit_rate: None,
        }
    }

    fn make_session(track_count: usize) -> Arc<Session> {
        Arc::new(Session::new(
            descriptor(track_count),
            Arc::new(StubLibrary::new()),
            TokenMinter::from_key([3u8; 32]),
            Weak::new(),
            Duration::from_secs(30),
        ))
    }

    #[tokio::test]
    async fn join_assigns_remote_to_first_participant() {
        let session = make_session(2);
        let (host_id, mut rx) = session.join("Host".to_owned(), true).await;

        let welcome = rx.recv().await.unwrap();
        assert_eq!(welcome.kind, MessageType::Welcome);
        let state_msg = rx.recv().await.unwrap();
        assert_eq!(state_msg.kind, MessageType::State);
        let participants_msg = rx.recv().await.unwrap();
        assert_eq!(participants_msg.kind, MessageType::Participants);
        let remote_msg = rx.recv().await.unwrap();
        assert_eq!(remote_msg.kind, MessageType::Remote);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.remote_holder, Some(host_id));
    }

    #[tokio::test]
    async fn host_joining_after_guest_takes_remote_priority() {
        let session = make_session(1);
        let (_guest_id, _guest_rx) = session.join("Guest".to_owned(), false).await;
        let (host_id, _host_rx) = session.join("Host".to_owned(), true).await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.remote_holder, Some(host_id));
    }

    #[tokio::test]
    async fn non_holder_commands_are_denied_without_state_change() {
        let session = make_session(1);
        let (_host_id, _host_rx) = session.join("Host".to_owned(), true).await;
        let (guest_id, mut guest_rx) = session.join("Guest".to_owned(), false).await;

        // drain the guest's welcome burst + the participants broadcast it receives
        for _ in 0..5 {
            let _ = tokio::time::timeout(Duration::from_millis(10), guest_rx.recv()).await;
        }

        session.handle_command(guest_id, Command::Pause).await;

        let snapshot_before = session.snapshot().await;
        assert!(!snapshot_before.is_playing);

        let msg = tokio::time::timeout(Duration::from_millis(100), guest_rx.recv())
            .await
            .expect("expected an error reply")
            .unwrap();
        assert_eq!(msg.kind, MessageType::Error);
    }

    #[tokio::test]
    async fn seek_beyond_duration_clamps() {
        let session = make_session(1);
        let (host_id, _rx) = session.join("Host".to_owned(), true).await;
        session
            .handle_command(host_id, Command::Seek(lt_protocol::SeekCommand { position: 9999.0 }))
            .await;
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.position, 180.0);
    }

    #[tokio::test]
    async fn skip_next_past_end_is_a_silent_no_op() {
        let session = make_session(2);
        let (host_id, _rx) = session.join("Host".to_owned(), true).await;
        session.handle_command(host_id, Command::SkipNext).await;
        let mid = session.snapshot().await;
        assert_eq!(mid.current_index, 1);

        session.handle_command(host_id, Command::SkipNext).await;
        let after = session.snapshot().await;
        assert_eq!(after.current_index, 1);
    }

    #[tokio::test]
    async fn queue_remove_rejects_current_track() {
        let session = make_session(3);
        let (host_id, mut rx) = session.join("Host".to_owned(), true).await;
        session.handle_command(host_id, Command::SkipNext).await; // current_index -> 1
        for _ in 0..5 {
            let _ = tokio::time::timeout(Duration::from_millis(10), rx.recv()).await;
        }

        session
            .handle_command(host_id, Command::QueueRemove(lt_protocol::QueueRemoveCommand { queue_position: 1 }))
            .await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.queue.len(), 3);
        let msg = tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.kind, MessageType::Error);
    }

    #[tokio::test]
    async fn queue_remove_before_current_shifts_current_index_down() {
        let session = make_session(3);
        let (host_id, _rx) = session.join("Host".to_owned(), true).await;
        session.handle_command(host_id, Command::SkipNext).await; // current_index -> 1

        session
            .handle_command(host_id, Command::QueueRemove(lt_protocol::QueueRemoveCommand { queue_position: 0 }))
            .await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.current_index, 0);
        assert_eq!(snapshot.queue, vec![1, 2]);
    }

    #[tokio::test]
    async fn queue_reorder_moves_current_index_with_its_track() {
        let session = make_session(4);
        let (host_id, _rx) = session.join("Host".to_owned(), true).await;
        session.handle_command(host_id, Command::SkipNext).await; // current_index -> 1 (track 1)

        session
            .handle_command(host_id, Command::QueueReorder(lt_protocol::QueueReorderCommand { from: 1, to: 3 }))
            .await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.current_index, 3);
        assert_eq!(snapshot.queue, vec![0, 2, 3, 1]);
    }

    #[tokio::test]
    async fn queue_add_resolves_media_and_appends_track() {
        let mut session_descriptor = descriptor(0);
        session_descriptor.id = "empty-session".to_owned();
        let library = Arc::new(StubLibrary::with(DescriptorTrack {
            media_file_id: "media-x".to_owned(),
            title: "New Track".to_owned(),
            artist: "New Artist".to_owned(),
            album: "New Album".to_owned(),
            duration: 200.0,
        }));
        let session = Arc::new(Session::new(
            session_descriptor,
            library,
            TokenMinter::from_key([4u8; 32]),
            Weak::new(),
            Duration::from_secs(30),
        ));
        let (host_id, _rx) = session.join("Host".to_owned(), true).await;

        session
            .handle_command(host_id, Command::QueueAdd(lt_protocol::QueueAddCommand { media_file_id: "media-x".to_owned() }))
            .await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.queue, vec![0]);
        assert_eq!(snapshot.current_index, 0);
    }

    #[tokio::test]
    async fn queue_add_reports_error_for_missing_media() {
        let session = make_session(0);
        let (host_id, mut rx) = session.join("Host".to_owned(), true).await;
        for _ in 0..4 {
            let _ = tokio::time::timeout(Duration::from_millis(10), rx.recv()).await;
        }

        session
            .handle_command(host_id, Command::QueueAdd(lt_protocol::QueueAddCommand { media_file_id: "missing".to_owned() }))
            .await;

        let msg = tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.kind, MessageType::Error);
        assert_eq!(session.snapshot().await.queue.len(), 0);
    }

    #[tokio::test]
    async fn leave_transfers_remote_to_earliest_joined_remaining_participant() {
        let session = make_session(1);
        let (host_id, _host_rx) = session.join("Host".to_owned(), true).await;
        let (guest1_id, _guest1_rx) = session.join("Guest1".to_owned(), false).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        let (_guest2_id, _guest2_rx) = session.join("Guest2".to_owned(), false).await;

        session.leave(host_id).await;

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.remote_holder, Some(guest1_id));
    }

    #[tokio::test]
    async fn leave_is_idempotent() {
        let session = make_session(1);
        let (host_id, _rx) = session.join("Host".to_owned(), true).await;
        session.leave(host_id).await;
        session.leave(host_id).await; // should not panic
        let snapshot = session.snapshot().await;
        assert!(snapshot.remote_holder.is_none());
    }

    #[tokio::test]
    async fn pass_remote_requires_target_to_exist() {
        let session = make_session(1);
        let (host_id, mut rx) = session.join("Host".to_owned(), true).await;
        for _ in 0..4 {
            let _ = tokio::time::timeout(Duration::from_millis(10), rx.recv()).await;
        }

        session
            .handle_command(
                host_id,
                Command::PassRemote(lt_protocol::PassRemoteCommand { participant_id: Uuid::new_v4() }),
            )
            .await;

        let msg = tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.kind, MessageType::Error);
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.remote_holder, Some(host_id));
    }

    #[tokio::test]
    async fn request_remote_direct_sends_to_holder_without_state_change() {
        let session = make_session(1);
        let (host_id, mut host_rx) = session.join("Host".to_owned(), true).await;
        let (guest_id, _guest_rx) = session.join("Guest".to_owned(), false).await;
        for _ in 0..4 {
            let _ = tokio::time::timeout(Duration::from_millis(10), host_rx.recv()).await;
        }

        session.handle_command(guest_id, Command::RequestRemote).await;

        let msg = tokio::time::timeout(Duration::from_millis(100), host_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(msg.kind, MessageType::RemoteRequested);
        assert_eq!(session.snapshot().await.remote_holder, Some(host_id));
    }

    #[tokio::test]
    async fn end_session_notifies_every_participant() {
        let session = make_session(1);
        let (host_id, mut host_rx) = session.join("Host".to_owned(), true).await;
        let (_guest_id, mut guest_rx) = session.join("Guest".to_owned(), false).await;
        for _ in 0..4 {
            let _ = tokio::time::timeout(Duration::from_millis(10), host_rx.recv()).await;
            let _ = tokio::time::timeout(Duration::from_millis(10), guest_rx.recv()).await;
        }

        session.handle_command(host_id, Command::EndSession).await;

        let host_msg = host_rx.recv().await.unwrap();
        let guest_msg = guest_rx.recv().await.unwrap();
        assert_eq!(host_msg.kind, MessageType::Error);
        assert_eq!(host_msg.action.as_deref(), Some(lt_protocol::SESSION_ENDED_ACTION));
        assert_eq!(guest_msg.action.as_deref(), Some(lt_protocol::SESSION_ENDED_ACTION));
    }

    #[tokio::test]
    async fn sync_from_non_holder_is_silently_ignored() {
        let session = make_session(2);
        let (host_id, _host_rx) = session.join("Host".to_owned(), true).await;
        let (guest_id, mut guest_rx) = session.join("Guest".to_owned(), false).await;
        for _ in 0..4 {
            let _ = tokio::time::timeout(Duration::from_millis(10), guest_rx.recv()).await;
        }

        session
            .handle_command(guest_id, Command::Sync(lt_protocol::SyncCommand { position: 77.0, track_index: 1 }))
            .await;

        assert!(
            tokio::time::timeout(Duration::from_millis(50), guest_rx.recv())
                .await
                .is_err(),
            "non-holder sync must produce no reply"
        );
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.position, 0.0);

        let _ = host_id;
    }
}
