//! In-memory tutoring sessions.
//!
//! Sessions live only as long as the process; nothing about a learner's
//! progress is written to the database.

use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tutor_core::{
    quiz::QuizAttempt,
    session::{LearningStyle, LessonOrchestrator},
};
use uuid::Uuid;

pub struct SessionEntry {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub orchestrator: Mutex<LessonOrchestrator>,
    pub quiz: Mutex<Option<QuizAttempt>>,
    /// Cancelled when the session is removed; chat replies run on child tokens.
    pub cancel: CancellationToken,
}

#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<Uuid, Arc<SessionEntry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, learning_style: LearningStyle) -> Arc<SessionEntry> {
        let entry = Arc::new(SessionEntry {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            orchestrator: Mutex::new(LessonOrchestrator::new(learning_style)),
            quiz: Mutex::new(None),
            cancel: CancellationToken::new(),
        });
        self.sessions
            .write()
            .await
            .insert(entry.id, Arc::clone(&entry));
        info!(session_id = %entry.id, ?learning_style, "Session created");
        entry
    }

    pub async fn get(&self, id: Uuid) -> Option<Arc<SessionEntry>> {
        self.sessions.read().await.get(&id).cloned()
    }

    /// Drops the session and cancels any reply still streaming for it.
    pub async fn remove(&self, id: Uuid) -> bool {
        match self.sessions.write().await.remove(&id) {
            Some(entry) => {
                entry.cancel.cancel();
                info!(session_id = %id, "Session removed");
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_get_and_remove() {
        let store = SessionStore::new();
        let entry = store.create(LearningStyle::Visual).await;

        let fetched = store.get(entry.id).await.expect("session should exist");
        assert_eq!(
            fetched.orchestrator.lock().await.learning_style,
            LearningStyle::Visual
        );
        assert_eq!(store.len().await, 1);

        assert!(store.remove(entry.id).await);
        assert!(entry.cancel.is_cancelled());
        assert!(store.get(entry.id).await.is_none());
        assert!(!store.remove(entry.id).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn removal_cancels_child_tokens() {
        let store = SessionStore::new();
        let entry = store.create(LearningStyle::default()).await;
        let reply = entry.cancel.child_token();

        store.remove(entry.id).await;
        assert!(reply.is_cancelled());
    }
}
