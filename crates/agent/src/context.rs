//! Context assembly for one reasoning round.
//!
//! Builds the bounded message sequence the backend sees: system
//! instructions (advisor role, loop guidance, profile directives, recent
//! decisions), the most recent conversation turns under a character budget,
//! and the current run's transcript. Same inputs, same output — assembly is
//! deterministic.

use macrosage_core::Message;
use macrosage_core::profile::{ConversationRecord, DecisionRecord, ExplanationDepth, UserProfile};

const BASE_PROMPT: &str = "You are MacroSage, an economic decision advisor that helps users make \
informed everyday economic and financial decisions using real-time macroeconomic data.\n\
\n\
Your approach for every question:\n\
1. REASON about the question and determine which data sources would help\n\
2. ACT by calling tools to gather economic data, news, or exchange rates\n\
3. OBSERVE the returned data and identify patterns or insights\n\
4. REFLECT by synthesizing everything into clear, actionable guidance\n\
\n\
Guidelines:\n\
- Use tools strategically before making recommendations\n\
- Cite your data sources and their dates\n\
- Consider both current conditions and historical context\n\
- Be transparent about uncertainties and limitations\n\
- Avoid specific investment advice or stock picking\n\
- Focus on everyday economic decisions: saving, spending, debt management\n\
- Explain economic concepts in accessible language";

/// Assembles the prompt for one reasoning round.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    /// Character budget for the history section
    budget_chars: usize,

    /// How many recent conversation rows to consider
    history_limit: usize,
}

impl ContextAssembler {
    pub fn new(budget_chars: usize, history_limit: usize) -> Self {
        Self {
            budget_chars,
            history_limit,
        }
    }

    /// Build the full message sequence: system prompt, bounded history,
    /// then the run transcript (never truncated).
    pub fn assemble(
        &self,
        profile: Option<&UserProfile>,
        recent_decisions: &[DecisionRecord],
        history: &[ConversationRecord],
        transcript: &[Message],
    ) -> Vec<Message> {
        let mut messages = vec![Message::system(self.system_prompt(profile, recent_decisions))];
        messages.extend(self.bounded_history(history));
        messages.extend(transcript.iter().cloned());
        messages
    }

    fn system_prompt(
        &self,
        profile: Option<&UserProfile>,
        recent_decisions: &[DecisionRecord],
    ) -> String {
        let mut prompt = String::from(BASE_PROMPT);

        if let Some(p) = profile {
            prompt.push_str("\n\nUser context:");
            prompt.push_str(&format!(
                "\n- Risk tolerance: {}",
                p.risk_tolerance.as_str()
            ));
            if let Some(income) = &p.income_range {
                prompt.push_str(&format!("\n- Income range: {income}"));
            }
            if let Some(debt) = &p.debt_level {
                prompt.push_str(&format!("\n- Debt level: {debt}"));
            }
            if p.dependents > 0 {
                prompt.push_str(&format!("\n- Dependents: {}", p.dependents));
            }
            if !p.goals.short_term.is_empty() {
                prompt.push_str(&format!(
                    "\n- Short-term goals: {}",
                    p.goals.short_term.join(", ")
                ));
            }
            if !p.goals.long_term.is_empty() {
                prompt.push_str(&format!(
                    "\n- Long-term goals: {}",
                    p.goals.long_term.join(", ")
                ));
            }
            if !p.preferences.focus_areas.is_empty() {
                prompt.push_str(&format!(
                    "\n- Focus areas: {}",
                    p.preferences.focus_areas.join(", ")
                ));
            }
            prompt.push_str(match p.preferences.explanation_depth {
                ExplanationDepth::Brief => "\n- Keep explanations brief and to the point.",
                ExplanationDepth::Moderate => "\n- Give moderately detailed explanations.",
                ExplanationDepth::Detailed => {
                    "\n- Give detailed explanations with full reasoning."
                }
            });
        }

        if !recent_decisions.is_empty() {
            prompt.push_str("\n\nRecent interactions (for context):");
            for decision in recent_decisions.iter().take(2) {
                let mut query = decision.query.clone();
                if query.len() > 100 {
                    query.truncate(100);
                    query.push_str("...");
                }
                prompt.push_str(&format!("\n- Previous query: {query}"));
            }
        }

        prompt
    }

    /// The most recent rows that fit the budget, oldest dropped first,
    /// returned in chronological order.
    fn bounded_history(&self, history: &[ConversationRecord]) -> Vec<Message> {
        let mut kept: Vec<&ConversationRecord> = Vec::new();
        let mut used = 0usize;

        for record in history.iter().rev().take(self.history_limit) {
            let cost = record.message.len();
            if used + cost > self.budget_chars {
                break;
            }
            used += cost;
            kept.push(record);
        }

        kept.iter()
            .rev()
            .map(|r| match r.role.as_str() {
                "assistant" => Message::assistant(r.message.clone()),
                _ => Message::user(r.message.clone()),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use macrosage_core::profile::RiskTolerance;

    fn record(id: i64, role: &str, message: &str) -> ConversationRecord {
        ConversationRecord {
            id,
            user_id: "u1".into(),
            role: role.into(),
            message: message.into(),
            tools_used: vec![],
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn system_prompt_includes_profile_directives() {
        let assembler = ContextAssembler::new(12_000, 10);
        let mut profile = UserProfile::new("u1");
        profile.risk_tolerance = RiskTolerance::Conservative;
        profile.debt_level = Some("high".into());
        profile.goals.short_term = vec!["emergency fund".into()];
        profile.preferences.explanation_depth = ExplanationDepth::Brief;

        let messages = assembler.assemble(Some(&profile), &[], &[], &[Message::user("q")]);
        let system = &messages[0].content;
        assert!(system.contains("Risk tolerance: conservative"));
        assert!(system.contains("Debt level: high"));
        assert!(system.contains("emergency fund"));
        assert!(system.contains("brief"));
    }

    #[test]
    fn no_profile_means_base_prompt_only() {
        let assembler = ContextAssembler::new(12_000, 10);
        let messages = assembler.assemble(None, &[], &[], &[Message::user("q")]);
        assert!(!messages[0].content.contains("User context"));
    }

    #[test]
    fn history_drops_oldest_under_budget() {
        // budget fits only the two most recent messages
        let assembler = ContextAssembler::new(20, 10);
        let history = vec![
            record(1, "user", "aaaaaaaaaa"),      // 10 chars, dropped
            record(2, "assistant", "bbbbbbbbbb"), // 10 chars
            record(3, "user", "cccccccccc"),      // 10 chars
        ];
        let messages = assembler.assemble(None, &[], &history, &[]);
        // system + 2 history messages
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].content, "bbbbbbbbbb");
        assert_eq!(messages[2].content, "cccccccccc");
    }

    #[test]
    fn history_limit_caps_row_count() {
        let assembler = ContextAssembler::new(12_000, 2);
        let history: Vec<_> = (0..6).map(|i| record(i, "user", "hi")).collect();
        let messages = assembler.assemble(None, &[], &history, &[]);
        assert_eq!(messages.len(), 3); // system + 2
    }

    #[test]
    fn transcript_is_never_truncated() {
        let assembler = ContextAssembler::new(10, 10);
        let transcript: Vec<_> = (0..4)
            .map(|i| Message::user(format!("transcript message {i} with plenty of text")))
            .collect();
        let messages = assembler.assemble(None, &[], &[], &transcript);
        assert_eq!(messages.len(), 5); // system + all 4
    }

    #[test]
    fn assembly_is_deterministic() {
        let assembler = ContextAssembler::new(12_000, 10);
        let history = vec![record(1, "user", "hello")];
        let decisions = vec![DecisionRecord {
            id: 1,
            user_id: "u1".into(),
            query: "car loan?".into(),
            recommendation: "wait".into(),
            tools_used: vec![],
            timestamp: Utc::now(),
            acted_upon: None,
        }];
        let a = assembler.assemble(None, &decisions, &history, &[]);
        let b = assembler.assemble(None, &decisions, &history, &[]);
        let texts = |ms: &[Message]| ms.iter().map(|m| m.content.clone()).collect::<Vec<_>>();
        assert_eq!(texts(&a), texts(&b));
        assert!(a[0].content.contains("car loan?"));
    }
}
