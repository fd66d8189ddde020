// Hub (C6): the process-wide session registry. Sessions are created lazily
// on first WebSocket connect and evicted either by their own grace timer or
// by an explicit end_session (session.rs calls back into `remove`).

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::info;

use crate::collaborators::{MediaLibrary, SessionStore};
use crate::session::Session;
use crate::token::TokenMinter;

pub struct Hub {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    store: Arc<dyn SessionStore>,
    library: Arc<dyn MediaLibrary>,
    minter: TokenMinter,
    grace_period: Duration,
}

impl Hub {
    pub fn new(
        store: Arc<dyn SessionStore>,
        library: Arc<dyn MediaLibrary>,
        minter: TokenMinter,
        grace_period: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            store,
            library,
            minter,
            grace_period,
        })
    }

    /// Look up a live session without loading or creating one.
    pub async fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// Return the live session for `session_id`, loading its descriptor
    /// from the session store and constructing it if this is the first
    /// connection to see it. Returns `None` if the store has no such
    /// session (the caller should reject the WebSocket upgrade).
    pub async fn get_or_create(self: &Arc<Self>, session_id: &str) -> Option<Arc<Session>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(session_id) {
                return Some(Arc::clone(session));
            }
        }

        let descriptor = self.store.load(session_id).await?;

        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get(session_id) {
            return Some(Arc::clone(session));
        }
        let session = Arc::new(Session::new(
            descriptor,
            Arc::clone(&self.library),
            self.minter.clone(),
            Arc::downgrade(self),
            self.grace_period,
        ));
        sessions.insert(session_id.to_owned(), Arc::clone(&session));
        info!(session_id = %session_id, "session created");
        Some(session)
    }

    pub async fn remove(&self, session_id: &str) {
        if self.sessions.write().await.remove(session_id).is_some() {
            info!(session_id = %session_id, "session evicted");
        }
    }

    pub fn weak(self: &Arc<Self>) -> Weak<Self> {
        Arc::downgrade(self)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
