//! Session registry
//!
//! Maps session ids to their conversation state. Each session's state sits
//! behind its own async mutex: holding the lock for the duration of one
//! pipeline run serializes requests within a session, while distinct
//! sessions run concurrently.

use docsage_common::conversation::{ConversationState, Turn};
use docsage_common::errors::{AppError, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Handle to one session's conversation state
pub type SessionHandle = Arc<Mutex<ConversationState>>;

/// In-process registry of active sessions
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<std::sync::Mutex<HashMap<Uuid, SessionHandle>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty session and return its id
    pub fn create(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.inner
            .lock()
            .unwrap()
            .insert(id, Arc::new(Mutex::new(ConversationState::new())));
        id
    }

    /// Look up an existing session
    pub fn get(&self, id: Uuid) -> Result<SessionHandle> {
        self.inner
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::SessionNotFound { id: id.to_string() })
    }

    /// Resolve a request's session: an explicit id must exist, no id means
    /// the process-wide default session (created lazily).
    pub fn resolve(&self, id: Option<Uuid>) -> Result<(Uuid, SessionHandle)> {
        match id {
            Some(id) => Ok((id, self.get(id)?)),
            None => {
                let default_id = Uuid::nil();
                let mut sessions = self.inner.lock().unwrap();
                let handle = sessions
                    .entry(default_id)
                    .or_insert_with(|| Arc::new(Mutex::new(ConversationState::new())))
                    .clone();
                Ok((default_id, handle))
            }
        }
    }

    /// Committed turns of a session, for inspection
    pub async fn turns(&self, id: Uuid) -> Result<Vec<Turn>> {
        let handle = self.get(id)?;
        let state = handle.lock().await;
        Ok(state.snapshot().to_vec())
    }

    /// Number of active sessions
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}
