//! Session storage abstraction
//!
//! The registry talks to storage only through `SessionStore`, so the
//! backing store (in-memory, durable key-value, relational) is swappable
//! without touching budget logic.

use crate::Session;
use agentpay_types::{Result, SessionId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Repository contract for session records
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetch a session by id
    async fn get(&self, id: &SessionId) -> Result<Option<Session>>;

    /// Insert or replace a session
    async fn put(&self, session: Session) -> Result<()>;

    /// All stored sessions
    async fn scan(&self) -> Result<Vec<Session>>;
}

/// In-memory session store for single-process deployments and tests
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, Session>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, id: &SessionId) -> Result<Option<Session>> {
        Ok(self.sessions.read().await.get(id).cloned())
    }

    async fn put(&self, session: Session) -> Result<()> {
        self.sessions.write().await.insert(session.id.clone(), session);
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<Session>> {
        Ok(self.sessions.read().await.values().cloned().collect())
    }
}
