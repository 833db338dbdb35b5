//! The chat service: memory on the way in, memory on the way out.
//!
//! Loads the user's durable context, runs the loop, then persists the
//! completed turn. The conversation write is load-bearing (its failure
//! fails the request); the decision-log write is best-effort.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use macrosage_core::error::Error;
use macrosage_core::store::MemoryStore;
use tracing::{info, warn};

use crate::loop_runner::AgentLoop;

const DECISION_CONTEXT_LIMIT: u32 = 3;

/// The API-facing result of one chat turn.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub response: String,
    pub tools_used: Vec<String>,
    pub iterations: u32,
    pub timestamp: DateTime<Utc>,
}

pub struct ChatService {
    agent: AgentLoop,
    store: Arc<dyn MemoryStore>,
    history_limit: u32,
}

impl ChatService {
    pub fn new(agent: AgentLoop, store: Arc<dyn MemoryStore>, history_limit: u32) -> Self {
        Self {
            agent,
            store,
            history_limit,
        }
    }

    pub fn store(&self) -> &Arc<dyn MemoryStore> {
        &self.store
    }

    /// Handle one user message end to end.
    pub async fn chat(&self, user_id: &str, message: &str) -> Result<ChatTurn, Error> {
        let profile = self.store.get_profile(user_id).await?;
        let history = self
            .store
            .recent_history(user_id, self.history_limit)
            .await?;
        let decisions = self
            .store
            .recent_decisions(user_id, DECISION_CONTEXT_LIMIT)
            .await?;

        let outcome = self
            .agent
            .run(message, profile.as_ref(), &history, &decisions)
            .await;

        // The user+assistant pair lands atomically; failure here fails the
        // whole request, so callers never see an unpersisted answer.
        self.store
            .record_turn(user_id, message, &outcome.response, &outcome.tools_used)
            .await?;

        // Decision log is advisory context for future turns only.
        if !outcome.tools_used.is_empty()
            && let Err(e) = self
                .store
                .append_decision(user_id, message, &outcome.response, &outcome.tools_used)
                .await
        {
            warn!(user_id, error = %e, "Failed to append decision log entry");
        }

        info!(
            user_id,
            iterations = outcome.iterations,
            tools = ?outcome.tools_used,
            "Chat turn persisted"
        );

        Ok(ChatTurn {
            response: outcome.response,
            tools_used: outcome.tools_used,
            iterations: outcome.iterations,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextAssembler;
    use crate::dispatcher::ToolDispatcher;
    use crate::reasoner::Reasoner;
    use async_trait::async_trait;
    use macrosage_core::Message;
    use macrosage_core::error::ReasonerError;
    use macrosage_core::reasoner::{ReasonerBackend, ReasonerReply, ReasonerRequest};
    use macrosage_core::tool::ToolRegistry;
    use macrosage_memory::InMemoryStore;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<ReasonerReply, ReasonerError>>>,
    }

    #[async_trait]
    impl ReasonerBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }
        async fn complete(
            &self,
            _request: ReasonerRequest,
        ) -> Result<ReasonerReply, ReasonerError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ReasonerError::Malformed("script exhausted".into())))
        }
    }

    fn service_with(
        replies: Vec<Result<ReasonerReply, ReasonerError>>,
        store: Arc<InMemoryStore>,
    ) -> ChatService {
        let backend = Arc::new(ScriptedBackend {
            script: Mutex::new(replies.into()),
        });
        let agent = AgentLoop::new(
            Reasoner::new(backend, "test-model", 0.7, 512),
            ToolDispatcher::new(Arc::new(ToolRegistry::new()), Duration::from_secs(5)),
            ContextAssembler::new(12_000, 10),
            5,
        );
        ChatService::new(agent, store, 10)
    }

    fn answer(text: &str) -> Result<ReasonerReply, ReasonerError> {
        Ok(ReasonerReply {
            message: Message::assistant(text),
        })
    }

    #[tokio::test]
    async fn turn_is_persisted_as_pair() {
        let store = Arc::new(InMemoryStore::new());
        let service = service_with(vec![answer("All good.")], store.clone());

        let turn = service.chat("u1", "How is the economy?").await.unwrap();
        assert_eq!(turn.response, "All good.");
        assert_eq!(turn.iterations, 1);

        let history = store.recent_history("u1", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[0].message, "How is the economy?");
        assert_eq!(history[1].role, "assistant");
        assert_eq!(history[1].message, "All good.");
    }

    #[tokio::test]
    async fn sequential_turns_append_ordered_rows() {
        let store = Arc::new(InMemoryStore::new());
        let service = service_with(vec![answer("First."), answer("Second.")], store.clone());

        service.chat("u1", "one").await.unwrap();
        service.chat("u1", "two").await.unwrap();

        let history = store.recent_history("u1", 10).await.unwrap();
        let roles: Vec<_> = history.iter().map(|r| r.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user", "assistant"]);
        assert_eq!(history[2].message, "two");
        assert_eq!(history[3].message, "Second.");
    }

    #[tokio::test]
    async fn persistence_failure_fails_the_request() {
        let store = Arc::new(InMemoryStore::new());
        store.set_fail_writes(true);
        let service = service_with(vec![answer("Unsaved answer.")], store.clone());

        let err = service.chat("u1", "q").await.unwrap_err();
        assert!(matches!(err, Error::Memory(_)));
    }

    #[tokio::test]
    async fn no_decision_logged_without_tool_use() {
        let store = Arc::new(InMemoryStore::new());
        let service = service_with(vec![answer("No data needed.")], store.clone());

        service.chat("u1", "q").await.unwrap();
        assert!(store.recent_decisions("u1", 10).await.unwrap().is_empty());
    }
}
