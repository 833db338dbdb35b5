//! # MacroSage Agent
//!
//! The bounded reasoning loop: REASON (one backend call) → ACT (dispatch the
//! requested tool batch) → OBSERVE (fold results into the run transcript) →
//! repeat, then REFLECT into a single grounded answer. At most five
//! reasoning rounds per turn; cap exhaustion is a defined termination, not
//! an error.

pub mod context;
pub mod dispatcher;
pub mod loop_runner;
pub mod reasoner;
pub mod run_state;
pub mod service;

pub use context::ContextAssembler;
pub use dispatcher::{DispatchReport, ToolDispatcher};
pub use loop_runner::{AgentLoop, TurnOutcome};
pub use reasoner::Reasoner;
pub use run_state::RunState;
pub use service::{ChatService, ChatTurn};
