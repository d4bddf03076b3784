use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

// ============================================================================
// Session - who is signed in
// ============================================================================
//
// Identity comes from the backend's auth service; this client only keeps the
// result. Every store reads the user id from here before touching the backend.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: Uuid,
    pub email: String,
    pub access_token: String,
    pub signed_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<Option<UserSession>>>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn sign_in(&self, user_id: Uuid, email: impl Into<String>, access_token: impl Into<String>) -> UserSession {
        let session = UserSession {
            user_id,
            email: email.into(),
            access_token: access_token.into(),
            signed_in_at: Utc::now(),
        };

        tracing::info!(%user_id, "Signed in");
        self.tx.send_replace(Some(session.clone()));
        session
    }

    pub fn sign_out(&self) {
        if let Some(previous) = self.tx.send_replace(None) {
            tracing::info!(user_id = %previous.user_id, "Signed out");
        }
    }

    pub fn current(&self) -> Option<UserSession> {
        self.tx.borrow().clone()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.tx.borrow().as_ref().map(|s| s.user_id)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<UserSession>> {
        self.tx.subscribe()
    }
}
