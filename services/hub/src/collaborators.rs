// External collaborators (spec.md 1, 6): the session-metadata store, and
// the media library search/resolve contract. Both are out of scope for the
// hub itself -- it only ever talks to them through these traits. `main.rs`
// wires an in-memory stand-in; a real deployment supplies its own.

use async_trait::async_trait;
use lt_protocol::MediaSearchResult;
use std::collections::HashMap;
use std::sync::RwLock;

/// A single track as loaded from the persistent session-metadata store or
/// returned by a media-library lookup, before the hub mints a streaming
/// token for it.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorTrack {
    pub media_file_id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: f64,
}

/// The session-scoped parameters and initial track list handed to the hub
/// by the (external, authenticated) session-creation API, or re-loaded on
/// first WebSocket connect for an existing session ID.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDescriptor {
    pub id: String,
    pub host_user_id: String,
    pub tracks: Vec<DescriptorTrack>,
    pub format: Option<String>,
    pub max_bit_rate: Option<u32>,
}

/// The persistent session-metadata store (spec.md 1: "out of scope ...
/// the hub only consumes a *loaded* session descriptor").
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Option<SessionDescriptor>;
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MediaLookupError {
    #[error("media file not found: {0}")]
    NotFound(String),
}

/// The media library search/resolve contract (spec.md 1, 4.5.3, 6).
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    async fn resolve(&self, media_file_id: &str) -> Result<DescriptorTrack, MediaLookupError>;
    async fn search(&self, query: &str) -> Vec<MediaSearchResult>;
}

/// An in-memory stand-in for both collaborators, used by `main.rs` when no
/// external services are configured and by the test suite. Not part of the
/// hub's core contract -- production wiring supplies real implementations.
#[derive(Default)]
pub struct InMemoryCollaborators {
    sessions: RwLock<HashMap<String, SessionDescriptor>>,
    media: RwLock<HashMap<String, DescriptorTrack>>,
}

impl InMemoryCollaborators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_session(&self, descriptor: SessionDescriptor) {
        self.sessions
            .write()
            .expect("lock poisoned")
            .insert(descriptor.id.clone(), descriptor);
    }

    pub fn seed_media(&self, track: DescriptorTrack) {
        self.media
            .write()
            .expect("lock poisoned")
            .insert(track.media_file_id.clone(), track);
    }
}

#[async_trait]
impl SessionStore for InMemoryCollaborators {
    async fn load(&self, session_id: &str) -> Option<SessionDescriptor> {
        self.sessions
            .read()
            .expect("lock poisoned")
            .get(session_id)
            .cloned()
    }
}

#[async_trait]
impl MediaLibrary for InMemoryCollaborators {
    async fn resolve(&self, media_file_id: &str) -> Result<DescriptorTrack, MediaLookupError> {
        self.media
            .read()
            .expect("lock poisoned")
            .get(media_file_id)
            .cloned()
            .ok_or_else(|| MediaLookupError::NotFound(media_file_id.to_owned()))
    }

    async fn search(&self, query: &str) -> Vec<MediaSearchResult> {
        let needle = query.to_lowercase();
        let mut results: Vec<MediaSearchResult> = self
            .media
            .read()
            .expect("lock poisoned")
            .values()
            .filter(|t| {
                t.title.to_lowercase().contains(&needle)
                    || t.artist.to_lowercase().contains(&needle)
                    || t.album.to_lowercase().contains(&needle)
            })
            .map(|t| MediaSearchResult {
                id: t.media_file_id.clone(),
                title: t.title.clone(),
                artist: t.artist.clone(),
                album: t.album.clone(),
                duration: t.duration,
            })
            .collect();
        results.sort_by(|a, b| a.title.cmp(&b.title));
        results.truncate(20);
        results
    }
}
