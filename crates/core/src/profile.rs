//! User profile and persisted history record types.
//!
//! Profiles personalize the advisor's answers; conversation and decision
//! records are append-only history rows keyed by user_id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How much risk the user is comfortable with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl RiskTolerance {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTolerance::Conservative => "conservative",
            RiskTolerance::Moderate => "moderate",
            RiskTolerance::Aggressive => "aggressive",
        }
    }
}

/// How verbose the advisor's explanations should be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationDepth {
    Brief,
    #[default]
    Moderate,
    Detailed,
}

/// The user's stated financial goals.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Goals {
    #[serde(default)]
    pub short_term: Vec<String>,
    #[serde(default)]
    pub long_term: Vec<String>,
}

/// Presentation preferences.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub explanation_depth: ExplanationDepth,
    #[serde(default)]
    pub focus_areas: Vec<String>,
}

/// Durable per-user context. At most one row per user_id; upserted whole.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub income_range: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debt_level: Option<String>,

    #[serde(default)]
    pub dependents: u32,

    #[serde(default)]
    pub risk_tolerance: RiskTolerance,

    #[serde(default)]
    pub goals: Goals,

    #[serde(default)]
    pub preferences: Preferences,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    /// A new profile with defaults for everything but the id.
    pub fn new(user_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            income_range: None,
            debt_level: None,
            dependents: 0,
            risk_tolerance: RiskTolerance::default(),
            goals: Goals::default(),
            preferences: Preferences::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One persisted conversation message. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Database row id (autoincrement)
    pub id: i64,
    pub user_id: String,
    /// "user" or "assistant"
    pub role: String,
    pub message: String,
    /// Tool names consulted while producing this message (assistant rows)
    #[serde(default)]
    pub tools_used: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// One logged recommendation, written best-effort after a completed turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: i64,
    pub user_id: String,
    pub query: String,
    pub recommendation: String,
    #[serde(default)]
    pub tools_used: Vec<String>,
    pub timestamp: DateTime<Utc>,
    /// Set later, when the user reports whether they followed the advice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acted_upon: Option<bool>,
}
