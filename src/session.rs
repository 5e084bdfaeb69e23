//! In-memory session transcripts.
//!
//! All data lives in process memory and is discarded when the process exits;
//! there is no capacity bound. Transcripts are append-only.
//!
//! A chat turn holds its session's async turn lock across awaits, so turns on
//! one session run one after another without blocking other sessions. The
//! transcript itself sits behind a std `RwLock` that is only held for a push
//! or a clone, so history reads never wait for an in-flight turn. The
//! id → session map is likewise behind a std `RwLock` never held across an
//! await.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub id: String,
    #[serde(rename = "content")]
    pub text: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    pub context: Option<String>,
}

#[derive(Debug)]
pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    messages: RwLock<Vec<Message>>,
    turn: Mutex<()>,
}

/// Held for the duration of one chat turn.
pub type TurnGuard<'a> = MutexGuard<'a, ()>;

impl Session {
    fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            messages: RwLock::new(Vec::new()),
            turn: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Wait until no other turn is running on this session.
    pub async fn begin_turn(&self) -> TurnGuard<'_> {
        self.turn.lock().await
    }

    /// Append a message with a fresh id and the current time.
    pub fn add_message(&self, role: Role, text: impl Into<String>, context: Option<String>) -> Message {
        let message = Message {
            id: Uuid::new_v4().to_string(),
            text: text.into(),
            role,
            timestamp: Utc::now(),
            context,
        };
        self.messages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        message
    }

    /// Snapshot of the transcript so far.
    pub fn history(&self) -> SessionHistory {
        SessionHistory {
            session_id: self.id.clone(),
            messages: self.messages.read().unwrap_or_else(PoisonError::into_inner).clone(),
            created_at: self.created_at,
        }
    }
}

/// Snapshot of one transcript, as served by `GET /sessions/{id}/history`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionHistory {
    pub session_id: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

pub type SessionHandle = Arc<Session>;

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `id`, creating the session when it is unknown. A missing or
    /// empty id gets a fresh UUID.
    pub fn get_or_create(&self, id: Option<&str>) -> Result<(String, SessionHandle), AppError> {
        let id = id
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut sessions = self
            .sessions
            .write()
            .map_err(|_| AppError::Memory("session map lock poisoned".into()))?;
        let handle = sessions
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Session::new(id.clone())))
            .clone();
        Ok((id, handle))
    }

    pub fn get(&self, id: &str) -> Result<SessionHandle, AppError> {
        let sessions = self
            .sessions
            .read()
            .map_err(|_| AppError::Memory("session map lock poisoned".into()))?;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::SessionNotFound(id.to_string()))
    }

    /// Does not wait for a turn in progress on the same session.
    pub fn history(&self, id: &str) -> Result<SessionHistory, AppError> {
        Ok(self.get(id)?.history())
    }

    /// Number of sessions created since startup.
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_preserves_call_order() {
        let store = SessionStore::new();
        let (id, session) = store.get_or_create(None).unwrap();

        for i in 0..10 {
            let role = if i % 2 == 0 { Role::User } else { Role::Assistant };
            session.add_message(role, format!("msg {i}"), None);
        }

        let history = store.history(&id).unwrap();
        assert_eq!(history.messages.len(), 10);
        for (i, m) in history.messages.iter().enumerate() {
            assert_eq!(m.text, format!("msg {i}"));
        }
    }

    #[test]
    fn unknown_session_is_not_found() {
        let store = SessionStore::new();
        let err = store.history("nope").unwrap_err();
        assert!(matches!(err, AppError::SessionNotFound(id) if id == "nope"));
        assert!(store.get("nope").is_err());
    }

    #[test]
    fn generated_ids_are_unique() {
        let store = SessionStore::new();
        let (a, _) = store.get_or_create(None).unwrap();
        let (b, _) = store.get_or_create(Some("")).unwrap();
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn provided_id_is_reused() {
        let store = SessionStore::new();
        let (a, first) = store.get_or_create(Some("client-chosen")).unwrap();
        let (b, second) = store.get_or_create(Some("client-chosen")).unwrap();
        assert_eq!(a, "client-chosen");
        assert_eq!(a, b);
        assert_eq!(first.id(), "client-chosen");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn messages_get_distinct_ids_and_keep_context() {
        let store = SessionStore::new();
        let (_, session) = store.get_or_create(None).unwrap();
        let a = session.add_message(Role::User, "q", Some("ctx".into()));
        let b = session.add_message(Role::Assistant, "a", None);
        assert_ne!(a.id, b.id);
        assert_eq!(a.context.as_deref(), Some("ctx"));
        assert!(b.timestamp >= a.timestamp);
        assert!(session.created_at() <= a.timestamp);
    }

    #[tokio::test]
    async fn history_is_readable_during_a_turn() {
        let store = SessionStore::new();
        let (id, session) = store.get_or_create(Some("busy")).unwrap();

        let _turn = session.begin_turn().await;
        session.add_message(Role::User, "still thinking", None);

        let history = store.history(&id).unwrap();
        assert_eq!(history.messages.len(), 1);
        assert_eq!(history.messages[0].text, "still thinking");
    }

    #[tokio::test]
    async fn second_turn_waits_for_the_first() {
        let store = SessionStore::new();
        let (_, session) = store.get_or_create(None).unwrap();

        let first = session.begin_turn().await;
        assert!(session.turn.try_lock().is_err());
        drop(first);
        assert!(session.turn.try_lock().is_ok());
    }

    #[test]
    fn message_serialises_text_as_content() {
        let session = Session::new("s".into());
        let m = session.add_message(Role::Assistant, "hello", None);
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["content"], "hello");
        assert_eq!(v["role"], "assistant");
        assert!(v.get("text").is_none());
    }
}
