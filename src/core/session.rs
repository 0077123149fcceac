//! In-process session state
//!
//! Sessions live only as long as the server process; nothing here is persisted.
//! The store is bounded: sessions idle past the timeout are dropped, and past
//! the session cap the least recently used one is evicted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::config::client::SessionSettings;
use crate::conversation::ConversationHistory;

use super::redirect::RedirectState;

/// Everything the orchestrator needs to remember between messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub history: ConversationHistory,
    pub redirect: RedirectState,
}

struct Entry {
    session: ChatSession,
    last_used: Instant,
}

/// Session id to state map shared by request handlers
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Entry>>,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_settings(&SessionSettings::default())
    }
}

impl SessionStore {
    pub fn with_settings(settings: &SessionSettings) -> Self {
        Self::with_limits(settings.max_sessions, Duration::from_secs(settings.idle_timeout_secs))
    }

    pub fn with_limits(max_sessions: usize, idle_timeout: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_sessions: max_sessions.max(1),
            idle_timeout,
        }
    }

    /// Snapshot of a session, or a fresh one if the id is unknown or expired
    pub async fn load(&self, id: &str) -> ChatSession {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        let expired = match sessions.get_mut(id) {
            Some(entry) if now.duration_since(entry.last_used) < self.idle_timeout => {
                entry.last_used = now;
                return entry.session.clone();
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            tracing::debug!(session = %id, "Session expired");
            sessions.remove(id);
        }
        ChatSession::default()
    }

    pub async fn save(&self, id: &str, session: ChatSession) {
        let mut sessions = self.sessions.write().await;
        let now = Instant::now();

        sessions.retain(|_, entry| now.duration_since(entry.last_used) < self.idle_timeout);

        if !sessions.contains_key(id) && sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                tracing::debug!(session = %oldest, "Evicting least recently used session");
                sessions.remove(&oldest);
            }
        }

        sessions.insert(
            id.to_string(),
            Entry {
                session,
                last_used: now,
            },
        );
    }

    /// Drop a session; returns whether it existed
    pub async fn remove(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{Exchange, Message};

    fn session_with(text: &str) -> ChatSession {
        let mut session = ChatSession::default();
        session
            .history
            .push(Exchange::new(Message::user(text), Message::assistant("ok")));
        session
    }

    #[tokio::test]
    async fn test_load_unknown_is_fresh() {
        let store = SessionStore::default();
        assert_eq!(store.load("missing").await, ChatSession::default());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let store = SessionStore::default();
        let session = session_with("hi");

        store.save("s1", session.clone()).await;
        assert_eq!(store.load("s1").await, session);

        assert!(store.remove("s1").await);
        assert!(!store.remove("s1").await);
        assert!(store.load("s1").await.history.is_empty());
    }

    #[tokio::test]
    async fn test_session_count_is_bounded() {
        let store = SessionStore::with_limits(100, Duration::from_secs(3600));
        for i in 0..10_000 {
            store.save(&format!("s{i}"), ChatSession::default()).await;
        }
        assert_eq!(store.len().await, 100);
    }

    #[tokio::test]
    async fn test_least_recently_used_is_evicted() {
        let store = SessionStore::with_limits(2, Duration::from_secs(3600));
        store.save("a", session_with("a")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.save("b", session_with("b")).await;
        tokio::time::sleep(Duration::from_millis(5)).await;

        // touching "a" makes "b" the oldest
        store.load("a").await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        store.save("c", session_with("c")).await;

        assert_eq!(store.len().await, 2);
        assert_eq!(store.load("a").await.history.len(), 1);
        assert!(store.load("b").await.history.is_empty());
        assert_eq!(store.load("c").await.history.len(), 1);
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let store = SessionStore::with_limits(10, Duration::from_millis(30));
        store.save("old", session_with("old")).await;
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store.load("old").await.history.is_empty());

        store.save("other", ChatSession::default()).await;
        assert_eq!(store.len().await, 1);
    }
}
