//! # MacroSage Core
//!
//! Domain types, traits, and error definitions for the MacroSage economic
//! decision advisor. This crate has **zero framework dependencies** — it
//! defines the domain model that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod profile;
pub mod reasoner;
pub mod store;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, MemoryError, ReasonerError, Result, ToolError, UpstreamError};
pub use message::{Message, MessageToolCall, Role};
pub use profile::{
    ConversationRecord, DecisionRecord, ExplanationDepth, Goals, Preferences, RiskTolerance,
    UserProfile,
};
pub use reasoner::{Decision, Directive, ReasonerBackend, ReasonerReply, ReasonerRequest};
pub use store::MemoryStore;
pub use tool::{ParamKind, ParamSpec, Tool, ToolRegistry, ToolRequest, ToolResult, ToolSpec};
