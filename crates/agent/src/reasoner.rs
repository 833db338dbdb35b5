//! The agent-side reasoner: one backend call, parsed into a decision.

use std::sync::Arc;

use macrosage_core::error::ReasonerError;
use macrosage_core::reasoner::{
    Decision, Directive, ReasonerBackend, ReasonerReply, ReasonerRequest,
};
use macrosage_core::tool::{ToolRequest, ToolSpec};
use macrosage_core::Message;
use tracing::debug;

const SYNTHESIZE_NOTE: &str = "Provide your best final answer now, based only on the data \
already gathered in this conversation. Do not request any more tools. If some data is \
missing, say so and give your best-effort guidance with what you have.";

/// Wraps a `ReasonerBackend` and parses its replies into `Decision`s.
///
/// Stateless between calls; everything the backend sees arrives in the
/// message sequence.
pub struct Reasoner {
    backend: Arc<dyn ReasonerBackend>,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl Reasoner {
    pub fn new(
        backend: Arc<dyn ReasonerBackend>,
        model: impl Into<String>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            temperature,
            max_tokens,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Run one reasoning round. Returns the raw assistant message (for the
    /// run transcript) alongside the parsed decision.
    ///
    /// Under `Directive::Synthesize` the backend gets a closing instruction
    /// and no tool declarations, so the same contract covers REFLECT.
    pub async fn decide(
        &self,
        mut messages: Vec<Message>,
        tools: &[ToolSpec],
        directive: Directive,
    ) -> Result<(Message, Decision), ReasonerError> {
        let tools = match directive {
            Directive::Continue => tools.to_vec(),
            Directive::Synthesize => {
                messages.push(Message::system(SYNTHESIZE_NOTE));
                Vec::new()
            }
        };

        debug!(
            backend = %self.backend.name(),
            messages = messages.len(),
            ?directive,
            "Running reasoning round"
        );

        let reply = self
            .backend
            .complete(ReasonerRequest {
                model: self.model.clone(),
                messages,
                tools,
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            })
            .await?;

        let decision = Self::parse(&reply)?;
        Ok((reply.message, decision))
    }

    fn parse(reply: &ReasonerReply) -> Result<Decision, ReasonerError> {
        let message = &reply.message;

        if !message.tool_calls.is_empty() {
            let mut requests = Vec::with_capacity(message.tool_calls.len());
            for tc in &message.tool_calls {
                let arguments: serde_json::Value = if tc.arguments.trim().is_empty() {
                    serde_json::Value::Object(serde_json::Map::new())
                } else {
                    serde_json::from_str(&tc.arguments).map_err(|e| {
                        ReasonerError::Malformed(format!(
                            "tool call '{}' has invalid argument JSON: {e}",
                            tc.name
                        ))
                    })?
                };
                requests.push(ToolRequest {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    arguments,
                });
            }
            return Ok(Decision::ToolRequests(requests));
        }

        if message.content.trim().is_empty() {
            return Err(ReasonerError::Malformed(
                "backend returned neither text nor tool calls".into(),
            ));
        }

        Ok(Decision::FinalAnswer(message.content.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrosage_core::message::MessageToolCall;

    fn reply_with(content: &str, tool_calls: Vec<MessageToolCall>) -> ReasonerReply {
        let mut message = Message::assistant(content);
        message.tool_calls = tool_calls;
        ReasonerReply { message }
    }

    #[test]
    fn text_reply_parses_to_final_answer() {
        let decision = Reasoner::parse(&reply_with("Buy the car.", vec![])).unwrap();
        assert!(matches!(decision, Decision::FinalAnswer(s) if s == "Buy the car."));
    }

    #[test]
    fn tool_calls_parse_to_requests() {
        let decision = Reasoner::parse(&reply_with(
            "",
            vec![MessageToolCall {
                id: "c1".into(),
                name: "get_exchange_rates".into(),
                arguments: r#"{"base_currency":"GBP"}"#.into(),
            }],
        ))
        .unwrap();
        match decision {
            Decision::ToolRequests(reqs) => {
                assert_eq!(reqs.len(), 1);
                assert_eq!(reqs[0].arguments["base_currency"], "GBP");
            }
            _ => panic!("expected tool requests"),
        }
    }

    #[test]
    fn empty_arguments_become_empty_object() {
        let decision = Reasoner::parse(&reply_with(
            "",
            vec![MessageToolCall {
                id: "c1".into(),
                name: "get_inflation_rate".into(),
                arguments: "".into(),
            }],
        ))
        .unwrap();
        match decision {
            Decision::ToolRequests(reqs) => assert!(reqs[0].arguments.is_object()),
            _ => panic!("expected tool requests"),
        }
    }

    #[test]
    fn invalid_argument_json_is_malformed() {
        let err = Reasoner::parse(&reply_with(
            "",
            vec![MessageToolCall {
                id: "c1".into(),
                name: "get_economic_news".into(),
                arguments: "{not json".into(),
            }],
        ))
        .unwrap_err();
        assert!(matches!(err, ReasonerError::Malformed(_)));
    }

    #[test]
    fn empty_reply_is_malformed() {
        let err = Reasoner::parse(&reply_with("   ", vec![])).unwrap_err();
        assert!(matches!(err, ReasonerError::Malformed(_)));
    }
}
