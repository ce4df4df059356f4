use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

const SESSION_EXPIRY_HOURS: i64 = 24;

#[derive(Debug, Clone)]
pub struct Session {
    pub username: String,
    pub created_at: DateTime<Utc>,
}

/// Server-side session flags for the single admin account. Tokens are
/// opaque and live only in memory; a restart logs everyone out.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, username: &str) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.write().insert(
            token.clone(),
            Session {
                username: username.to_string(),
                created_at: Utc::now(),
            },
        );
        token
    }

    pub fn get(&self, token: &str) -> Option<Session> {
        let session = self.sessions.read().get(token).cloned()?;
        if Utc::now() - session.created_at > Duration::hours(SESSION_EXPIRY_HOURS) {
            self.sessions.write().remove(token);
            return None;
        }
        Some(session)
    }

    pub fn remove(&self, token: &str) {
        self.sessions.write().remove(token);
    }
}
