//! Agent module - the think/act state machine and its policies
//!
//! One agent type covers every flavour of run; behaviour differs only by the
//! injected tools and policies.

pub mod conversation;
pub mod machine;
pub mod policy;
pub mod state;

pub use conversation::Conversation;
pub use machine::{Agent, AgentBuilder};
pub use policy::{recent_tool_hint, AnswerPolicy, ContextPolicy, StuckDetector};
pub use state::AgentState;
