//! Operator sessions.
//!
//! An operator signs in with a Discord access token. The token is resolved
//! to a user via `/users/@me` and kept server side; the browser only holds
//! an opaque session id in the `dashboard_session` cookie.

use axum::http::HeaderMap;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};

use crate::error::{DashboardError, Result};
use crate::models::OperatorUser;
use crate::services::SharedPlatform;

pub const SESSION_COOKIE: &str = "dashboard_session";
const SESSION_TTL_SECS: u64 = 86400;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSession {
    pub user: OperatorUser,
    #[serde(skip)]
    pub access_token: String,
    pub created_at: u64,
    pub expires_at: u64,
}

impl OperatorSession {
    /// Create a new session with 24-hour expiry
    pub fn new(user: OperatorUser, access_token: String) -> Self {
        let now = now_secs();
        Self {
            user,
            access_token,
            created_at: now,
            expires_at: now + SESSION_TTL_SECS,
        }
    }

    pub fn is_expired(&self) -> bool {
        now_secs() >= self.expires_at
    }
}

/// Session changes the host app reacts to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn { token: String, user_id: String },
    SignedOut { token: String, user_id: String },
    Expired { token: String, user_id: String },
}

/// Maps session tokens to session data
pub struct SessionStore {
    platform: SharedPlatform,
    sessions: RwLock<HashMap<String, OperatorSession>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new(platform: SharedPlatform) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            platform,
            sessions: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Resolve the access token and open a session. Returns the session token.
    pub async fn sign_in(&self, access_token: &str) -> Result<(String, OperatorSession)> {
        let user = self.platform.current_user(access_token).await?;
        let session = OperatorSession::new(user, access_token.to_string());
        let token = self.insert(session.clone()).await;
        info!("{} signed in", session.user.display_name());
        Ok((token, session))
    }

    async fn insert(&self, session: OperatorSession) -> String {
        let token = uuid::Uuid::new_v4().to_string();
        let user_id = session.user.id.clone();
        self.sessions.write().await.insert(token.clone(), session);
        self.notify(SessionEvent::SignedIn {
            token: token.clone(),
            user_id,
        });
        token
    }

    /// The live session for `token`. An expired session is removed.
    pub async fn get_session(&self, token: &str) -> Result<OperatorSession> {
        let session = self
            .sessions
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(DashboardError::NotSignedIn)?;

        if session.is_expired() {
            self.sessions.write().await.remove(token);
            self.notify(SessionEvent::Expired {
                token: token.to_string(),
                user_id: session.user.id,
            });
            return Err(DashboardError::SessionExpired);
        }
        Ok(session)
    }

    pub async fn sign_out(&self, token: &str) -> Option<OperatorSession> {
        let session = self.sessions.write().await.remove(token)?;
        info!("{} signed out", session.user.display_name());
        self.notify(SessionEvent::SignedOut {
            token: token.to_string(),
            user_id: session.user.id.clone(),
        });
        Some(session)
    }

    /// Drop expired sessions, announcing each one
    pub async fn cleanup_expired(&self) -> usize {
        let expired: Vec<(String, String)> = {
            let mut sessions = self.sessions.write().await;
            let expired = sessions
                .iter()
                .filter(|(_, s)| s.is_expired())
                .map(|(token, s)| (token.clone(), s.user.id.clone()))
                .collect::<Vec<_>>();
            for (token, _) in &expired {
                sessions.remove(token);
            }
            expired
        };

        for (token, user_id) in &expired {
            self.notify(SessionEvent::Expired {
                token: token.clone(),
                user_id: user_id.clone(),
            });
        }
        expired.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            debug!("No session listeners");
        }
    }
}

pub type SharedSessionStore = Arc<SessionStore>;

pub fn create_session_store(platform: SharedPlatform) -> SharedSessionStore {
    Arc::new(SessionStore::new(platform))
}

/// Extract session token from cookies
pub fn get_session_token(headers: &HeaderMap) -> Option<String> {
    let prefix = format!("{}=", SESSION_COOKIE);
    headers
        .get(axum::http::header::COOKIE)?
        .to_str()
        .ok()?
        .split(';')
        .find_map(|cookie| {
            cookie
                .trim()
                .strip_prefix(prefix.as_str())
                .filter(|token| !token.is_empty())
                .map(str::to_string)
        })
}

pub fn create_session_cookie(token: &str) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, SESSION_TTL_SECS
    )
}

/// Clears the session cookie
pub fn create_logout_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
