//! Durable memory store abstraction.
//!
//! Implementations live in the memory crate: SQLite for production, an
//! in-memory map for tests. All methods are keyed by user_id; conversation
//! and decision rows are append-only.

use async_trait::async_trait;

use crate::error::MemoryError;
use crate::profile::{ConversationRecord, DecisionRecord, UserProfile};

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Insert or fully replace the user's profile.
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), MemoryError>;

    /// Fetch a profile. `Ok(None)` means "no profile yet", not an error.
    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, MemoryError>;

    /// Append one conversation row.
    async fn append_conversation(
        &self,
        user_id: &str,
        role: &str,
        message: &str,
        tools_used: &[String],
    ) -> Result<(), MemoryError>;

    /// Atomically persist a completed turn: the user message and the
    /// assistant reply land together or not at all. Turns for the same
    /// user are serialized.
    async fn record_turn(
        &self,
        user_id: &str,
        user_message: &str,
        assistant_message: &str,
        tools_used: &[String],
    ) -> Result<(), MemoryError>;

    /// The most recent `limit` conversation rows, oldest first.
    async fn recent_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationRecord>, MemoryError>;

    /// Delete every conversation row for this user. Other users untouched.
    async fn clear_history(&self, user_id: &str) -> Result<(), MemoryError>;

    /// Append a decision-log row. Returns the new row id.
    async fn append_decision(
        &self,
        user_id: &str,
        query: &str,
        recommendation: &str,
        tools_used: &[String],
    ) -> Result<i64, MemoryError>;

    /// The most recent `limit` decision rows, newest first.
    async fn recent_decisions(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<DecisionRecord>, MemoryError>;

    /// Record whether the user acted on a logged recommendation.
    async fn set_decision_outcome(&self, id: i64, acted_upon: bool) -> Result<(), MemoryError>;
}
