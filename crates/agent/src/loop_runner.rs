//! The bounded reasoning loop.
//!
//! REASON → ACT → OBSERVE, at most `max_iterations` rounds, then REFLECT.
//! Two ways a turn can degrade, both deterministic:
//! - the backend fails twice in a row (one corrective retry) → apology with
//!   whatever was gathered;
//! - the iteration cap is hit → one forced synthesize round; if that also
//!   fails or asks for more tools, the same partial-data fallback.
//!
//! Cap exhaustion is a defined termination policy, not an error, so `run`
//! is infallible: every turn ends in a text answer.

use macrosage_core::Message;
use macrosage_core::error::ReasonerError;
use macrosage_core::profile::{ConversationRecord, DecisionRecord, UserProfile};
use macrosage_core::reasoner::{Decision, Directive};
use tracing::{debug, info, warn};

use crate::context::ContextAssembler;
use crate::dispatcher::ToolDispatcher;
use crate::reasoner::Reasoner;
use crate::run_state::RunState;

/// What one completed turn produced.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The final answer text
    pub response: String,

    /// Tools dispatched this turn, deduped, first-use order
    pub tools_used: Vec<String>,

    /// Reasoning rounds consumed, 1-based
    pub iterations: u32,
}

pub struct AgentLoop {
    reasoner: Reasoner,
    dispatcher: ToolDispatcher,
    assembler: ContextAssembler,
    max_iterations: u32,
}

impl AgentLoop {
    pub fn new(
        reasoner: Reasoner,
        dispatcher: ToolDispatcher,
        assembler: ContextAssembler,
        max_iterations: u32,
    ) -> Self {
        Self {
            reasoner,
            dispatcher,
            assembler,
            max_iterations,
        }
    }

    /// Run one turn to completion.
    pub async fn run(
        &self,
        query: &str,
        profile: Option<&UserProfile>,
        history: &[ConversationRecord],
        recent_decisions: &[DecisionRecord],
    ) -> TurnOutcome {
        let mut state = RunState::new(query);
        let specs = self.dispatcher.registry().specs();

        info!(
            conversation_id = %state.conversation_id,
            history = history.len(),
            "Starting advisory turn"
        );

        loop {
            state.iteration += 1;
            debug!(
                conversation_id = %state.conversation_id,
                iteration = state.iteration,
                "Reasoning round"
            );

            let messages =
                self.assembler
                    .assemble(profile, recent_decisions, history, &state.transcript);

            let (message, decision) = match self
                .reason_with_retry(messages, &specs, Directive::Continue)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        conversation_id = %state.conversation_id,
                        error = %e,
                        "Reasoner failed twice, degrading"
                    );
                    return self.finish(degraded_answer(&state), state);
                }
            };

            match decision {
                Decision::FinalAnswer(text) => {
                    state.push(message);
                    return self.finish(text, state);
                }
                Decision::ToolRequests(batch) => {
                    debug!(
                        conversation_id = %state.conversation_id,
                        tools = batch.len(),
                        "Dispatching tool batch"
                    );
                    state.push(message);

                    // The in-flight batch always finishes, cap or no cap.
                    let report = self.dispatcher.dispatch(&batch).await;
                    for name in &report.dispatched {
                        state.record_tool_use(name);
                    }
                    for result in report.results {
                        let content =
                            serde_json::to_string(&result.payload).unwrap_or_default();
                        state.push(Message::tool_result(&result.request_id, content));
                    }

                    if state.iteration >= self.max_iterations {
                        warn!(
                            conversation_id = %state.conversation_id,
                            "Iteration cap reached, forcing synthesis"
                        );
                        return self
                            .synthesize(profile, recent_decisions, history, state)
                            .await;
                    }
                }
            }
        }
    }

    /// One reasoning attempt, with a single corrective retry on failure.
    async fn reason_with_retry(
        &self,
        messages: Vec<Message>,
        specs: &[macrosage_core::tool::ToolSpec],
        directive: Directive,
    ) -> Result<(Message, Decision), ReasonerError> {
        match self
            .reasoner
            .decide(messages.clone(), specs, directive)
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(error = %e, "Reasoning round failed, retrying once");
                let mut retry = messages;
                retry.push(Message::system(format!(
                    "Your previous reply could not be processed ({e}). Reply again with \
                     either a plain text answer or valid tool calls."
                )));
                self.reasoner.decide(retry, specs, directive).await
            }
        }
    }

    /// Forced REFLECT once the cap is hit: same contract, synthesize
    /// directive. Doesn't consume an iteration.
    async fn synthesize(
        &self,
        profile: Option<&UserProfile>,
        recent_decisions: &[DecisionRecord],
        history: &[ConversationRecord],
        state: RunState,
    ) -> TurnOutcome {
        let messages =
            self.assembler
                .assemble(profile, recent_decisions, history, &state.transcript);

        match self
            .reasoner
            .decide(messages, &[], Directive::Synthesize)
            .await
        {
            Ok((_, Decision::FinalAnswer(text))) => self.finish(text, state),
            Ok((_, Decision::ToolRequests(_))) => {
                warn!("Synthesis round requested more tools, using fallback answer");
                self.finish(partial_answer(&state), state)
            }
            Err(e) => {
                warn!(error = %e, "Synthesis round failed, using fallback answer");
                self.finish(partial_answer(&state), state)
            }
        }
    }

    fn finish(&self, response: String, state: RunState) -> TurnOutcome {
        info!(
            conversation_id = %state.conversation_id,
            iterations = state.iteration,
            tools_used = ?state.tools_used,
            "Turn complete"
        );
        TurnOutcome {
            response,
            tools_used: state.tools_used,
            iterations: state.iteration,
        }
    }
}

/// Fallback when the backend failed twice mid-loop.
fn degraded_answer(state: &RunState) -> String {
    if state.tools_used.is_empty() {
        "I apologize, but I ran into a problem while analyzing your question and could not \
         complete the analysis. Please try again in a moment."
            .to_string()
    } else {
        format!(
            "I apologize, but I ran into a problem while analyzing your question. I gathered \
             data from {} before the problem occurred, but could not finish the analysis. \
             Please try again in a moment.",
            state.tools_used.join(", ")
        )
    }
}

/// Fallback when the forced synthesis itself failed or misbehaved.
fn partial_answer(state: &RunState) -> String {
    if state.tools_used.is_empty() {
        "I could not complete a full analysis of your question within my reasoning budget. \
         Could you rephrase or narrow your question?"
            .to_string()
    } else {
        format!(
            "I could not complete a full analysis within my reasoning budget. I consulted \
             {} but was unable to finish synthesizing the results. Could you rephrase or \
             narrow your question?",
            state.tools_used.join(", ")
        )
    }
}
