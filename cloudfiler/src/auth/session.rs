//! Opaque, revocable session tokens.
//!
//! A session is a random token mapped to a user id and an expiry. Tokens carry
//! no data themselves, so logging out (or expiring) is immediate: once the
//! store forgets a token it no longer resolves.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rand::prelude::RngExt;
use rand::rng;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::errors::Error;
use crate::types::{UserId, abbrev_uuid};

/// A freshly issued session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

/// Storage for issued sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Issue a new session for a user
    async fn create(&self, user_id: UserId) -> Result<Session, Error>;

    /// Resolve a token to its user, if the session exists and has not expired
    async fn resolve(&self, token: &str) -> Result<Option<UserId>, Error>;

    /// Forget a token. Unknown tokens are ignored.
    async fn invalidate(&self, token: &str) -> Result<(), Error>;
}

#[derive(Debug, Clone, Copy)]
struct SessionEntry {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

/// Session store kept in process memory.
#[derive(Debug)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionEntry>,
    timeout: Duration,
}

impl InMemorySessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            timeout,
        }
    }

    /// Number of sessions currently held, expired ones included
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Drop every expired session, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let before = self.sessions.len();
        let now = Utc::now();
        self.sessions.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.sessions.len())
    }
}

/// Generate a session token: 32 random bytes, base64url without padding
pub fn generate_session_token() -> String {
    let mut token_bytes = [0u8; 32];
    rng().fill(&mut token_bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    async fn create(&self, user_id: UserId) -> Result<Session, Error> {
        let timeout = chrono::Duration::from_std(self.timeout).map_err(|e| Error::Internal {
            operation: format!("convert session timeout: {e}"),
        })?;
        // Sessions abandoned without a logout are only reclaimed here
        let purged = self.purge_expired();
        if purged > 0 {
            debug!(purged, "Purged expired sessions");
        }

        let session = Session {
            token: generate_session_token(),
            user_id,
            expires_at: Utc::now() + timeout,
        };
        self.sessions.insert(
            session.token.clone(),
            SessionEntry {
                user_id,
                expires_at: session.expires_at,
            },
        );
        Ok(session)
    }

    #[instrument(skip_all, err)]
    async fn resolve(&self, token: &str) -> Result<Option<UserId>, Error> {
        let Some(entry) = self.sessions.get(token).map(|e| *e) else {
            return Ok(None);
        };
        if entry.expires_at <= Utc::now() {
            debug!(user_id = %abbrev_uuid(&entry.user_id), "Session expired");
            self.sessions.remove(token);
            return Ok(None);
        }
        Ok(Some(entry.user_id))
    }

    #[instrument(skip_all, err)]
    async fn invalidate(&self, token: &str) -> Result<(), Error> {
        self.sessions.remove(token);
        Ok(())
    }
}
