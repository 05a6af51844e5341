//! Agent lifecycle state

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one agent run
///
/// `Idle` → `Running` → `Finished` | `Error`. Terminal states never change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    #[default]
    Idle,
    Running,
    Finished,
    Error,
}

impl AgentState {
    pub fn is_terminal(self) -> bool {
        matches!(self, AgentState::Finished | AgentState::Error)
    }

    /// Whether the lifecycle allows moving from `self` to `next`
    pub fn can_transition_to(self, next: AgentState) -> bool {
        match (self, next) {
            (AgentState::Idle, AgentState::Running) => true,
            (AgentState::Idle, AgentState::Error) => true,
            (AgentState::Running, AgentState::Finished | AgentState::Error) => true,
            _ => false,
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Idle => "idle",
            AgentState::Running => "running",
            AgentState::Finished => "finished",
            AgentState::Error => "error",
        };
        f.write_str(s)
    }
}
