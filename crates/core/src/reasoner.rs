//! Reasoner backend abstraction.
//!
//! A `ReasonerBackend` is one LLM chat-completions call: messages plus tool
//! declarations in, an assistant message (text or tool calls) out. Backends
//! are stateless between calls; all context arrives in the request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ReasonerError;
use crate::message::Message;
use crate::tool::{ToolRequest, ToolSpec};

/// A single completion request.
#[derive(Debug, Clone)]
pub struct ReasonerRequest {
    /// Model identifier (backend-specific)
    pub model: String,

    /// The fully assembled conversation, system prompt first
    pub messages: Vec<Message>,

    /// Tools the model may request
    pub tools: Vec<ToolSpec>,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum completion tokens
    pub max_tokens: u32,
}

/// The backend's reply: exactly one assistant message.
#[derive(Debug, Clone)]
pub struct ReasonerReply {
    pub message: Message,
}

/// Trait implemented by concrete reasoning backends (OpenAI-compatible
/// HTTP APIs, scripted mocks in tests).
#[async_trait]
pub trait ReasonerBackend: Send + Sync {
    /// Backend name, for logging and the doctor report.
    fn name(&self) -> &str;

    /// Run one completion.
    async fn complete(
        &self,
        request: ReasonerRequest,
    ) -> std::result::Result<ReasonerReply, ReasonerError>;
}

/// What the reasoner decided in one round, parsed from the backend reply.
#[derive(Debug, Clone)]
pub enum Decision {
    /// The model answered directly; the loop moves to REFLECT.
    FinalAnswer(String),

    /// The model wants data; the batch goes to the dispatcher.
    ToolRequests(Vec<ToolRequest>),
}

/// Parameterizes the reasoner contract for the two call sites of the loop.
///
/// `Continue` lets the model keep gathering data; `Synthesize` instructs it
/// to produce a best-effort final answer from whatever is in the transcript,
/// with no further tool use. One contract, no second answer-generation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Directive {
    Continue,
    Synthesize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Directive::Synthesize).unwrap(),
            "\"synthesize\""
        );
    }

    #[test]
    fn decision_variants_carry_their_data() {
        let d = Decision::FinalAnswer("done".into());
        assert!(matches!(d, Decision::FinalAnswer(ref s) if s == "done"));

        let d = Decision::ToolRequests(vec![ToolRequest {
            id: "c1".into(),
            name: "get_inflation_rate".into(),
            arguments: serde_json::json!({}),
        }]);
        assert!(matches!(d, Decision::ToolRequests(ref v) if v.len() == 1));
    }
}
