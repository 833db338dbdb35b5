//! Per-run working state.

use macrosage_core::Message;
use uuid::Uuid;

/// Everything one loop execution owns. Created when a turn starts, dropped
/// when it ends; never persisted.
#[derive(Debug)]
pub struct RunState {
    /// Correlates log lines for one turn
    pub conversation_id: String,

    /// Current reasoning round, 1-based once the loop starts
    pub iteration: u32,

    /// Messages produced during this turn: the user query, assistant
    /// messages (with tool calls), and tool results. Never truncated.
    pub transcript: Vec<Message>,

    /// Tools actually dispatched this turn, deduped, in first-use order
    pub tools_used: Vec<String>,
}

impl RunState {
    pub fn new(user_query: &str) -> Self {
        Self {
            conversation_id: Uuid::new_v4().to_string(),
            iteration: 0,
            transcript: vec![Message::user(user_query)],
            tools_used: Vec::new(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.transcript.push(message);
    }

    /// Record a dispatched tool. Repeat uses keep the original position.
    pub fn record_tool_use(&mut self, name: &str) {
        if !self.tools_used.iter().any(|t| t == name) {
            self.tools_used.push(name.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tools_used_dedupes_in_first_use_order() {
        let mut state = RunState::new("q");
        state.record_tool_use("get_inflation_rate");
        state.record_tool_use("get_economic_news");
        state.record_tool_use("get_inflation_rate");
        assert_eq!(
            state.tools_used,
            vec!["get_inflation_rate", "get_economic_news"]
        );
    }

    #[test]
    fn transcript_starts_with_user_query() {
        let state = RunState::new("Should I refinance?");
        assert_eq!(state.transcript.len(), 1);
        assert_eq!(state.transcript[0].content, "Should I refinance?");
    }
}
