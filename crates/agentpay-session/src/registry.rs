//! Session registry: lifecycle operations and the per-session critical
//! section that serializes all counter mutation

use crate::{InMemorySessionStore, Session, SessionStore};
use agentpay_types::{
    AgentId, AgentPayError, PrincipalId, Result, SessionId, SessionLimits, SessionOverrides,
    SessionUpdate,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

/// Defaults applied when a session is created without overrides
#[derive(Debug, Clone)]
pub struct SessionDefaults {
    pub limits: SessionLimits,
    pub duration_secs: u64,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            limits: SessionLimits::default(),
            duration_secs: 3600,
        }
    }
}

/// Owns session records and serializes mutation per session
///
/// Contention is scoped to one session: a slow settlement against one
/// session never blocks another. No process-wide lock exists.
#[derive(Clone)]
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
    /// Per-session lock table; guards read-modify-write cycles on the store
    locks: Arc<RwLock<HashMap<SessionId, Arc<Mutex<()>>>>>,
    defaults: SessionDefaults,
}

impl SessionRegistry {
    /// Create a registry over an injected store
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self::with_defaults(store, SessionDefaults::default())
    }

    /// Create a registry with explicit session defaults
    pub fn with_defaults(store: Arc<dyn SessionStore>, defaults: SessionDefaults) -> Self {
        Self {
            store,
            locks: Arc::new(RwLock::new(HashMap::new())),
            defaults,
        }
    }

    /// Convenience constructor backed by the in-memory store
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemorySessionStore::new()))
    }

    /// Create a new session for a principal/agent pair
    pub async fn create(
        &self,
        principal: PrincipalId,
        agent: AgentId,
        overrides: SessionOverrides,
    ) -> Result<Session> {
        let limits = overrides.apply(self.defaults.limits.clone());
        let duration = overrides
            .duration_secs
            .unwrap_or(self.defaults.duration_secs);

        let session = Session::new(principal, agent, limits, duration);
        self.store.put(session.clone()).await?;

        info!(
            session = %session.id,
            principal = %session.principal,
            agent = %session.agent,
            allowance = %session.limits.allowance,
            expires_at = %session.expires_at,
            "session created"
        );
        Ok(session)
    }

    /// Fetch a session by id
    pub async fn get(&self, id: &SessionId) -> Result<Session> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AgentPayError::SessionNotFound {
                session_id: id.to_string(),
            })
    }

    /// Latest usable session for a principal, creating one if none exists
    ///
    /// A session is usable when it is unexpired and not paused.
    pub async fn get_or_create(&self, principal: PrincipalId, agent: AgentId) -> Result<Session> {
        let now = Utc::now();
        let existing = self
            .store
            .scan()
            .await?
            .into_iter()
            .filter(|s| s.principal == principal && !s.is_expired(now) && !s.is_paused)
            .max_by_key(|s| s.created_at);

        match existing {
            Some(session) => Ok(session),
            None => {
                self.create(principal, agent, SessionOverrides::default())
                    .await
            }
        }
    }

    /// Merge mutable fields into a live session
    ///
    /// `SessionUpdate` carries only mutable fields, so id, principal,
    /// timestamps and the keypair cannot be altered through this path.
    /// Updating a daily/monthly cap preserves the amount already spent in
    /// the current window.
    pub async fn update(&self, id: &SessionId, update: SessionUpdate) -> Result<Session> {
        self.with_session_mut(id, |session| {
            if let Some(cap) = update.per_transaction_cap {
                session.limits.per_transaction_cap = cap;
            }
            if let Some(cap) = update.daily_cap {
                let spent = session.limits.daily_cap.saturating_sub(session.daily_remaining);
                session.limits.daily_cap = cap;
                session.daily_remaining = cap.saturating_sub(spent);
            }
            if let Some(cap) = update.monthly_cap {
                let spent = session
                    .limits
                    .monthly_cap
                    .saturating_sub(session.monthly_remaining);
                session.limits.monthly_cap = cap;
                session.monthly_remaining = cap.saturating_sub(spent);
            }
            if let Some(n) = update.max_calls_per_agent_hourly {
                session.limits.max_calls_per_agent_hourly = n;
            }
            if let Some(n) = update.max_calls_per_agent_daily {
                session.limits.max_calls_per_agent_daily = n;
            }
            if let Some(n) = update.max_concurrent_tasks {
                session.limits.max_concurrent_tasks = n;
            }
            if let Some(secs) = update.task_timeout_secs {
                session.limits.task_timeout_secs = secs;
            }
            if let Some(ref list) = update.whitelist {
                session.limits.whitelist = Some(list.clone());
            }
            if let Some(threshold) = update.approval_threshold {
                session.limits.approval_threshold = Some(threshold);
            }
            Ok(session.clone())
        })
        .await
    }

    /// Pause a session; every subsequent gate check fails `SessionPaused`
    pub async fn pause(&self, id: &SessionId, reason: impl Into<String>) -> Result<()> {
        let reason = reason.into();
        self.with_session_mut(id, |session| {
            session.is_paused = true;
            session.pause_reason = Some(reason.clone());
            Ok(())
        })
        .await?;
        info!(session = %id, reason = %reason, "session paused");
        Ok(())
    }

    /// Resume a paused session; counters are left exactly as they were
    pub async fn resume(&self, id: &SessionId) -> Result<()> {
        self.with_session_mut(id, |session| {
            session.is_paused = false;
            session.pause_reason = None;
            Ok(())
        })
        .await?;
        info!(session = %id, "session resumed");
        Ok(())
    }

    /// Run `f` inside the session's exclusive critical section
    ///
    /// The session is read fresh from the store, budget windows are
    /// refreshed, `f` runs, and the result is persisted only when `f`
    /// succeeds; a failed closure leaves the stored session untouched.
    /// Check and mutation therefore happen as one atomic step, never as
    /// two separate calls against possibly-stale state.
    pub async fn with_session_mut<T, F>(&self, id: &SessionId, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> Result<T>,
    {
        let lock = self.session_lock(id).await;
        let _guard = lock.lock().await;

        let mut session = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| AgentPayError::SessionNotFound {
                session_id: id.to_string(),
            })?;

        session.refresh_windows(Utc::now());
        let value = f(&mut session)?;
        self.store.put(session).await?;
        Ok(value)
    }

    async fn session_lock(&self, id: &SessionId) -> Arc<Mutex<()>> {
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(id) {
                return lock.clone();
            }
        }
        let mut locks = self.locks.write().await;
        locks
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
