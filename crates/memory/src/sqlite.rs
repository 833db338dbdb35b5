//! SQLite memory store.
//!
//! One database file with three tables keyed by user_id:
//! - `user_profiles` — one row per user, upserted whole
//! - `conversations` — append-only message history
//! - `decisions` — append-only recommendation log
//!
//! `record_turn` writes the user/assistant pair in a single transaction, and
//! a per-user async lock serializes concurrent turns for the same user.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use macrosage_core::error::MemoryError;
use macrosage_core::profile::{ConversationRecord, DecisionRecord, UserProfile};
use macrosage_core::store::MemoryStore;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// The production SQLite store.
pub struct SqliteStore {
    pool: SqlitePool,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    pub async fn new(path: &str) -> Result<Self, MemoryError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| MemoryError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| MemoryError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self {
            pool,
            user_locks: Mutex::new(HashMap::new()),
        };
        store.run_migrations().await?;
        info!("SQLite store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), MemoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS user_profiles (
                user_id        TEXT PRIMARY KEY,
                income_range   TEXT,
                debt_level     TEXT,
                dependents     INTEGER NOT NULL DEFAULT 0,
                risk_tolerance TEXT NOT NULL DEFAULT 'moderate',
                goals          TEXT NOT NULL DEFAULT '{}',
                preferences    TEXT NOT NULL DEFAULT '{}',
                created_at     TEXT NOT NULL,
                updated_at     TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("user_profiles table: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id    TEXT NOT NULL,
                role       TEXT NOT NULL,
                message    TEXT NOT NULL,
                tools_used TEXT NOT NULL DEFAULT '[]',
                timestamp  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("conversations table: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id, id)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("conversations index: {e}")))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS decisions (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id        TEXT NOT NULL,
                query          TEXT NOT NULL,
                recommendation TEXT NOT NULL,
                tools_used     TEXT NOT NULL DEFAULT '[]',
                timestamp      TEXT NOT NULL,
                acted_upon     INTEGER
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::MigrationFailed(format!("decisions table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_decisions_user ON decisions(user_id, id)")
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::MigrationFailed(format!("decisions index: {e}")))?;

        Ok(())
    }

    /// The lock guarding writes for one user.
    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.user_locks.lock().await;
        locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn row_to_profile(row: &sqlx::sqlite::SqliteRow) -> Result<UserProfile, MemoryError> {
        let goals_json: String = row
            .try_get("goals")
            .map_err(|e| MemoryError::QueryFailed(e.to_string()))?;
        let prefs_json: String = row
            .try_get("preferences")
            .map_err(|e| MemoryError::QueryFailed(e.to_string()))?;
        let risk: String = row
            .try_get("risk_tolerance")
            .map_err(|e| MemoryError::QueryFailed(e.to_string()))?;

        Ok(UserProfile {
            user_id: row
                .try_get("user_id")
                .map_err(|e| MemoryError::QueryFailed(e.to_string()))?,
            income_range: row
                .try_get("income_range")
                .map_err(|e| MemoryError::QueryFailed(e.to_string()))?,
            debt_level: row
                .try_get("debt_level")
                .map_err(|e| MemoryError::QueryFailed(e.to_string()))?,
            dependents: row
                .try_get::<i64, _>("dependents")
                .map_err(|e| MemoryError::QueryFailed(e.to_string()))? as u32,
            risk_tolerance: serde_json::from_value(serde_json::Value::String(risk))
                .map_err(|e| MemoryError::QueryFailed(format!("risk_tolerance: {e}")))?,
            goals: serde_json::from_str(&goals_json)
                .map_err(|e| MemoryError::QueryFailed(format!("goals: {e}")))?,
            preferences: serde_json::from_str(&prefs_json)
                .map_err(|e| MemoryError::QueryFailed(format!("preferences: {e}")))?,
            created_at: parse_timestamp(row, "created_at")?,
            updated_at: parse_timestamp(row, "updated_at")?,
        })
    }

    fn row_to_conversation(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationRecord, MemoryError> {
        let tools_json: String = row
            .try_get("tools_used")
            .map_err(|e| MemoryError::QueryFailed(e.to_string()))?;
        Ok(ConversationRecord {
            id: row
                .try_get("id")
                .map_err(|e| MemoryError::QueryFailed(e.to_string()))?,
            user_id: row
                .try_get("user_id")
                .map_err(|e| MemoryError::QueryFailed(e.to_string()))?,
            role: row
                .try_get("role")
                .map_err(|e| MemoryError::QueryFailed(e.to_string()))?,
            message: row
                .try_get("message")
                .map_err(|e| MemoryError::QueryFailed(e.to_string()))?,
            tools_used: serde_json::from_str(&tools_json)
                .map_err(|e| MemoryError::QueryFailed(format!("tools_used: {e}")))?,
            timestamp: parse_timestamp(row, "timestamp")?,
        })
    }

    fn row_to_decision(row: &sqlx::sqlite::SqliteRow) -> Result<DecisionRecord, MemoryError> {
        let tools_json: String = row
            .try_get("tools_used")
            .map_err(|e| MemoryError::QueryFailed(e.to_string()))?;
        let acted: Option<i64> = row
            .try_get("acted_upon")
            .map_err(|e| MemoryError::QueryFailed(e.to_string()))?;
        Ok(DecisionRecord {
            id: row
                .try_get("id")
                .map_err(|e| MemoryError::QueryFailed(e.to_string()))?,
            user_id: row
                .try_get("user_id")
                .map_err(|e| MemoryError::QueryFailed(e.to_string()))?,
            query: row
                .try_get("query")
                .map_err(|e| MemoryError::QueryFailed(e.to_string()))?,
            recommendation: row
                .try_get("recommendation")
                .map_err(|e| MemoryError::QueryFailed(e.to_string()))?,
            tools_used: serde_json::from_str(&tools_json)
                .map_err(|e| MemoryError::QueryFailed(format!("tools_used: {e}")))?,
            timestamp: parse_timestamp(row, "timestamp")?,
            acted_upon: acted.map(|v| v != 0),
        })
    }
}

fn parse_timestamp(
    row: &sqlx::sqlite::SqliteRow,
    column: &str,
) -> Result<DateTime<Utc>, MemoryError> {
    let raw: String = row
        .try_get(column)
        .map_err(|e| MemoryError::QueryFailed(e.to_string()))?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| MemoryError::QueryFailed(format!("{column}: {e}")))
}

#[async_trait]
impl MemoryStore for SqliteStore {
    async fn upsert_profile(&self, profile: &UserProfile) -> Result<(), MemoryError> {
        let goals = serde_json::to_string(&profile.goals)
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        let preferences = serde_json::to_string(&profile.preferences)
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO user_profiles
                (user_id, income_range, debt_level, dependents, risk_tolerance,
                 goals, preferences, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                income_range = excluded.income_range,
                debt_level = excluded.debt_level,
                dependents = excluded.dependents,
                risk_tolerance = excluded.risk_tolerance,
                goals = excluded.goals,
                preferences = excluded.preferences,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&profile.user_id)
        .bind(&profile.income_range)
        .bind(&profile.debt_level)
        .bind(profile.dependents as i64)
        .bind(profile.risk_tolerance.as_str())
        .bind(&goals)
        .bind(&preferences)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("upsert profile: {e}")))?;

        debug!(user_id = %profile.user_id, "Profile upserted");
        Ok(())
    }

    async fn get_profile(&self, user_id: &str) -> Result<Option<UserProfile>, MemoryError> {
        let row = sqlx::query("SELECT * FROM user_profiles WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("get profile: {e}")))?;

        row.as_ref().map(Self::row_to_profile).transpose()
    }

    async fn append_conversation(
        &self,
        user_id: &str,
        role: &str,
        message: &str,
        tools_used: &[String],
    ) -> Result<(), MemoryError> {
        let tools = serde_json::to_string(tools_used)
            .map_err(|e| MemoryError::Storage(e.to_string()))?;

        sqlx::query(
            "INSERT INTO conversations (user_id, role, message, tools_used, timestamp)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(role)
        .bind(message)
        .bind(&tools)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("append conversation: {e}")))?;

        Ok(())
    }

    async fn record_turn(
        &self,
        user_id: &str,
        user_message: &str,
        assistant_message: &str,
        tools_used: &[String],
    ) -> Result<(), MemoryError> {
        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let tools = serde_json::to_string(tools_used)
            .map_err(|e| MemoryError::Storage(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| MemoryError::Storage(format!("begin transaction: {e}")))?;

        sqlx::query(
            "INSERT INTO conversations (user_id, role, message, tools_used, timestamp)
             VALUES (?, 'user', ?, '[]', ?)",
        )
        .bind(user_id)
        .bind(user_message)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| MemoryError::Storage(format!("record user message: {e}")))?;

        sqlx::query(
            "INSERT INTO conversations (user_id, role, message, tools_used, timestamp)
             VALUES (?, 'assistant', ?, ?, ?)",
        )
        .bind(user_id)
        .bind(assistant_message)
        .bind(&tools)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(|e| MemoryError::Storage(format!("record assistant message: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| MemoryError::Storage(format!("commit turn: {e}")))?;

        debug!(user_id, tools = ?tools_used, "Turn recorded");
        Ok(())
    }

    async fn recent_history(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<ConversationRecord>, MemoryError> {
        let rows = sqlx::query(
            "SELECT * FROM conversations WHERE user_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| MemoryError::QueryFailed(format!("recent history: {e}")))?;

        let mut records: Vec<ConversationRecord> = rows
            .iter()
            .map(Self::row_to_conversation)
            .collect::<Result<_, _>>()?;
        records.reverse(); // oldest first
        Ok(records)
    }

    async fn clear_history(&self, user_id: &str) -> Result<(), MemoryError> {
        sqlx::query("DELETE FROM conversations WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("clear history: {e}")))?;
        Ok(())
    }

    async fn append_decision(
        &self,
        user_id: &str,
        query: &str,
        recommendation: &str,
        tools_used: &[String],
    ) -> Result<i64, MemoryError> {
        let tools = serde_json::to_string(tools_used)
            .map_err(|e| MemoryError::Storage(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO decisions (user_id, query, recommendation, tools_used, timestamp)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(query)
        .bind(recommendation)
        .bind(&tools)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| MemoryError::Storage(format!("append decision: {e}")))?;

        Ok(result.last_insert_rowid())
    }

    async fn recent_decisions(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<DecisionRecord>, MemoryError> {
        let rows = sqlx::query("SELECT * FROM decisions WHERE user_id = ? ORDER BY id DESC LIMIT ?")
            .bind(user_id)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| MemoryError::QueryFailed(format!("recent decisions: {e}")))?;

        rows.iter().map(Self::row_to_decision).collect()
    }

    async fn set_decision_outcome(&self, id: i64, acted_upon: bool) -> Result<(), MemoryError> {
        let result = sqlx::query("UPDATE decisions SET acted_upon = ? WHERE id = ?")
            .bind(acted_upon as i64)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| MemoryError::Storage(format!("set decision outcome: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(MemoryError::QueryFailed(format!("decision {id} not found")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrosage_core::profile::RiskTolerance;

    async fn test_store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = SqliteStore::new(path.to_str().unwrap()).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn profile_upsert_and_fetch() {
        let (store, _dir) = test_store().await;

        assert!(store.get_profile("u1").await.unwrap().is_none());

        let mut profile = UserProfile::new("u1");
        profile.risk_tolerance = RiskTolerance::Conservative;
        profile.goals.short_term = vec!["emergency fund".into()];
        store.upsert_profile(&profile).await.unwrap();

        let fetched = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(fetched.risk_tolerance, RiskTolerance::Conservative);
        assert_eq!(fetched.goals.short_term, vec!["emergency fund"]);
    }

    #[tokio::test]
    async fn profile_upsert_replaces() {
        let (store, _dir) = test_store().await;

        let mut profile = UserProfile::new("u1");
        store.upsert_profile(&profile).await.unwrap();

        profile.dependents = 2;
        profile.debt_level = Some("high".into());
        store.upsert_profile(&profile).await.unwrap();

        let fetched = store.get_profile("u1").await.unwrap().unwrap();
        assert_eq!(fetched.dependents, 2);
        assert_eq!(fetched.debt_level.as_deref(), Some("high"));
    }

    #[tokio::test]
    async fn record_turn_writes_pair_atomically() {
        let (store, _dir) = test_store().await;

        store
            .record_turn(
                "u1",
                "Should I buy a car?",
                "Rates are high; consider waiting.",
                &["get_interest_rates".into()],
            )
            .await
            .unwrap();

        let history = store.recent_history("u1", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[1].role, "assistant");
        assert_eq!(history[1].tools_used, vec!["get_interest_rates"]);
    }

    #[tokio::test]
    async fn history_is_chronological_and_limited() {
        let (store, _dir) = test_store().await;

        for i in 0..5 {
            store
                .record_turn("u1", &format!("q{i}"), &format!("a{i}"), &[])
                .await
                .unwrap();
        }

        let history = store.recent_history("u1", 4).await.unwrap();
        assert_eq!(history.len(), 4);
        // the 4 most recent rows, oldest first
        assert_eq!(history[0].message, "q3");
        assert_eq!(history[3].message, "a4");
    }

    #[tokio::test]
    async fn clear_history_is_scoped_to_user() {
        let (store, _dir) = test_store().await;

        store.record_turn("u1", "q", "a", &[]).await.unwrap();
        store.record_turn("u2", "q", "a", &[]).await.unwrap();

        store.clear_history("u1").await.unwrap();

        assert!(store.recent_history("u1", 10).await.unwrap().is_empty());
        assert_eq!(store.recent_history("u2", 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn decision_log_roundtrip() {
        let (store, _dir) = test_store().await;

        let id = store
            .append_decision(
                "u1",
                "refinance?",
                "Yes, rates dropped.",
                &["get_interest_rates".into()],
            )
            .await
            .unwrap();

        let decisions = store.recent_decisions("u1", 5).await.unwrap();
        assert_eq!(decisions.len(), 1);
        assert_eq!(decisions[0].id, id);
        assert!(decisions[0].acted_upon.is_none());

        store.set_decision_outcome(id, true).await.unwrap();
        let decisions = store.recent_decisions("u1", 5).await.unwrap();
        assert_eq!(decisions[0].acted_upon, Some(true));
    }

    #[tokio::test]
    async fn set_outcome_on_missing_decision_fails() {
        let (store, _dir) = test_store().await;
        assert!(store.set_decision_outcome(999, true).await.is_err());
    }

    #[tokio::test]
    async fn concurrent_same_user_turns_all_land() {
        let (store, _dir) = test_store().await;
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .record_turn("u1", &format!("q{i}"), &format!("a{i}"), &[])
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        let history = store.recent_history("u1", 100).await.unwrap();
        assert_eq!(history.len(), 16);
    }
}
