//! In-memory store for tests.
//!
//! Mirrors `SqliteStore` behavior on plain collections, with an optional
//! write-failure toggle so callers can exercise persistence-error paths.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use macrosage_core::error::MemoryError;
use macrosage_core::profile::{ConversationRecord, DecisionRecord, UserProfile};
use macrosage_core::store::MemoryStore;

#[derive(Default)]
struct State {
    profiles: std::collections::HashMap<String, UserProfile>,
    conversations: Vec<ConversationRecord>,
    decisions: Vec<DecisionRecord>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
    next_conversation_id: AtomicI64,
    next_decision_id: AtomicI64,
    fail_writes: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make all write operations fail with `MemoryError::Storage`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writes(&self) -> Result<(), MemoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MemoryError::Storage("simulated write failure".into()));
        }
        Ok(())
    }

    fn push_conversation(
        &self,
        state: &mut State,
        user_id: &str,
        role: &str,
        message: &str,
        tools_used: &[String],
    ) {
        let id = self.next_conversation_id.fetch_add(1, Ordering::SeqCst) + 1;
        state.conversations.push(ConversationRecord {
            id,
            user_id: user_id.to_string(),
            role: role.to_string(),
            message: message.to_string(),
            tools_used: tools_used.to_vec(),
            timestamp: Utc::now(),
        });
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), MemoryError> {
        self.check_writes()?;
        let mut state = self.state.lock().unwrap();
        let mut stored = profile.clone();
        stored.updated_at = Utc::now();
        if let Some(existing) = state.profiles.get(&profile.user_id) {
            stored.created_at = existing.created_at;
        }
        state.profiles.insert(profile.user_id.clone(), stored);
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, MemoryError> {
        let state = self.state.lock().unwrap();
        Ok(state.profiles.get(user_id).cloned())
    }

    async fn append_conversation(
        &self,
        user_id: &str,
        role: &str,
        message: &str,
        tools_used: &[String],
    ) -> Result<(), MemoryError> {
        self.check_writes()?;
        let mut state = self.state.lock().unwrap();
        self.push_conversation(&mut state, user_id, role, message, tools_used);
        Ok(())
    }

    async fn record_turn(
        &self,
        user_id: &str,
        user_message: &str,
        assistant_message: &str,
        tools_used: &[String],
    ) -> Result<(), MemoryError> {
        self.check_writes()?;
        // Single lock acquisition keeps the pair atomic.
        let mut state = self.state.lock().unwrap();
        self.push_conversation(&mut state, user_id, "user", user_message, &[]);
        self.push_conversation(&mut state, user_id, "assistant", assistant_message, tools_used);
        Ok(())
    }

    async fn recent_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationRecord>, MemoryError> {
        let state = self.state.lock().unwrap();
        let mut records: Vec<_> = state
            .conversations
            .iter()
            .filter(|r| r.user_id == user_id)
            .rev()
            .take(limit as usize)
            .cloned()
            .collect();
        records.reverse();
        Ok(records)
    }

    async fn clear_history(&self, user_id: &str) -> Result<(), MemoryError> {
        self.check_writes()?;
        let mut state = self.state.lock().unwrap();
        state.conversations.retain(|r| r.user_id != user_id);
        Ok(())
    }

    async fn append_decision(
        &self,
        user_id: &str,
        query: &str,
        recommendation: &str,
        tools_used: &[String],
    ) -> Result<i64, MemoryError> {
        self.check_writes()?;
        let id = self.next_decision_id.fetch_add(1, Ordering::SeqCst) + 1;
        let mut state = self.state.lock().unwrap();
        state.decisions.push(DecisionRecord {
            id,
            user_id: user_id.to_string(),
            query: query.to_string(),
            recommendation: recommendation.to_string(),
            tools_used: tools_used.to_vec(),
            timestamp: Utc::now(),
            acted_upon: None,
        });
        Ok(id)
    }

    async fn recent_decisions(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<DecisionRecord>, MemoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .decisions
            .iter()
            .filter(|d| d.user_id == user_id)
            .rev()
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn set_decision_outcome(&self, id: i64, acted_upon: bool) -> Result<(), MemoryError> {
        self.check_writes()?;
        let mut state = self.state.lock().unwrap();
        match state.decisions.iter_mut().find(|d| d.id == id) {
            Some(d) => {
                d.acted_upon = Some(acted_upon);
                Ok(())
            }
            None => Err(MemoryError::QueryFailed(format!("decision {id} not found"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mirrors_sqlite_turn_semantics() {
        let store = InMemoryStore::new();
        store
            .record_turn("u1", "q", "a", &["get_exchange_rates".into()])
            .await
            .unwrap();

        let history = store.recent_history("u1", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert!(history[0].tools_used.is_empty());
        assert_eq!(history[1].tools_used, vec!["get_exchange_rates"]);
    }

    #[tokio::test]
    async fn fail_writes_toggle() {
        let store = InMemoryStore::new();
        store.set_fail_writes(true);
        assert!(store.record_turn("u1", "q", "a", &[]).await.is_err());
        assert!(store.recent_history("u1", 10).await.unwrap().is_empty());

        store.set_fail_writes(false);
        assert!(store.record_turn("u1", "q", "a", &[]).await.is_ok());
    }

    #[tokio::test]
    async fn upsert_preserves_created_at() {
        let store = InMemoryStore::new();
        let profile = UserProfile::new("u1");
        store.upsert_profile(&profile).await.unwrap();
        let first = store.get_profile("u1").await.unwrap().unwrap();

        store.upsert_profile(&profile).await.unwrap();
        let second = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(first.created_at, second.created_at);
    }
}
