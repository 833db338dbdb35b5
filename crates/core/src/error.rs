//! Error types for the MacroSage domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all MacroSage operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Reasoner errors ---
    #[error("Reasoner error: {0}")]
    Reasoner(#[from] ReasonerError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failure modes of a single reasoning-backend call, including the case
/// where the backend answered but its output could not be parsed into a
/// final answer or a tool-request batch.
#[derive(Debug, Clone, Error)]
pub enum ReasonerError {
    #[error("API request failed: {message} (status: {status_code})")]
    Api { status_code: u16, message: String },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed model output: {0}")]
    Malformed(String),
}

/// Normalized upstream data-provider failures. These never escape the tool
/// dispatcher — they are folded into failed `ToolResult`s so the reasoner
/// can see and work around degraded data availability.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    #[error("upstream request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("upstream rate limit hit")]
    RateLimited,

    #[error("upstream authentication failed: {0}")]
    Auth(String),

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("network error: {0}")]
    Network(String),
}

impl UpstreamError {
    /// Stable machine-readable kind for normalized error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::RateLimited => "rate_limited",
            Self::Auth(_) => "auth",
            Self::Malformed(_) => "malformed",
            Self::Network(_) => "network",
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("Upstream API error: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("Tool execution failed: {tool_name} — {reason}")]
    ExecutionFailed { tool_name: String, reason: String },
}

impl ToolError {
    /// Stable machine-readable kind for normalized error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "tool_not_found",
            Self::InvalidArguments(_) => "invalid_arguments",
            Self::Upstream(u) => u.kind(),
            Self::ExecutionFailed { .. } => "execution_failed",
        }
    }
}

/// Persistence failures. A failure writing the conversation turn is
/// load-bearing and surfaces to the caller; a failure writing the decision
/// log is logged and swallowed.
#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoner_error_displays_correctly() {
        let err = Error::Reasoner(ReasonerError::Api {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn top_level_error_wraps_each_context() {
        let e: Error = ReasonerError::Auth("bad key".into()).into();
        assert!(matches!(e, Error::Reasoner(_)));
        let e: Error = MemoryError::Storage("disk full".into()).into();
        assert!(matches!(e, Error::Memory(_)));
        let e: Error = ToolError::NotFound("get_weather".into()).into();
        assert!(matches!(e, Error::Tool(_)));
    }

    #[test]
    fn tool_error_displays_correctly() {
        let err = Error::Tool(ToolError::InvalidArguments(
            "missing required field 'amount'".into(),
        ));
        assert!(err.to_string().contains("amount"));
    }

    #[test]
    fn upstream_error_kinds_are_stable() {
        assert_eq!(UpstreamError::Timeout { timeout_secs: 10 }.kind(), "timeout");
        assert_eq!(UpstreamError::RateLimited.kind(), "rate_limited");
        assert_eq!(UpstreamError::Auth("bad key".into()).kind(), "auth");
        assert_eq!(UpstreamError::Malformed("not json".into()).kind(), "malformed");
    }

    #[test]
    fn tool_error_kind_delegates_to_upstream() {
        let err = ToolError::Upstream(UpstreamError::RateLimited);
        assert_eq!(err.kind(), "rate_limited");
        assert_eq!(ToolError::NotFound("x".into()).kind(), "tool_not_found");
    }
}
