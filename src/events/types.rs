//! Event types emitted by a running agent
//!
//! Every observable occurrence is an [`Event`]: a common envelope (id,
//! timestamp, step) around a payload tagged by kind. Payloads serialize with
//! a `type` discriminator so streaming consumers can dispatch on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::agent::AgentState;
use crate::core::ToolResult;
use crate::plan::PlanSnapshot;

/// One immutable record of agent activity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// Step the event belongs to (1-based; 0 before the first step)
    pub step: usize,
    #[serde(flatten)]
    pub payload: EventPayload,
}

/// Kind-specific event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Raw model output for this step
    Think { content: String },
    /// Model selected a tool
    ToolSelect { name: String },
    /// Tool is about to run with validated arguments
    ToolExecute { name: String, arguments: Value },
    /// Tool finished (or failed validation)
    ToolResult {
        name: String,
        output: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base64_image: Option<String>,
    },
    /// Agent lifecycle transition
    StatusChange {
        state: AgentState,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// Active plan changed
    PlanUpdate { plan: PlanSnapshot },
    /// Terminal failure
    Error { message: String },
    /// Terminal completion
    Complete {
        result: String,
        #[serde(default)]
        terminated: bool,
        #[serde(default)]
        truncated: bool,
    },
}

/// Payload discriminant, for filtering and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Think,
    ToolSelect,
    ToolExecute,
    ToolResult,
    StatusChange,
    PlanUpdate,
    Error,
    Complete,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Think => "think",
            EventKind::ToolSelect => "tool_select",
            EventKind::ToolExecute => "tool_execute",
            EventKind::ToolResult => "tool_result",
            EventKind::StatusChange => "status_change",
            EventKind::PlanUpdate => "plan_update",
            EventKind::Error => "error",
            EventKind::Complete => "complete",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::Think { .. } => EventKind::Think,
            EventPayload::ToolSelect { .. } => EventKind::ToolSelect,
            EventPayload::ToolExecute { .. } => EventKind::ToolExecute,
            EventPayload::ToolResult { .. } => EventKind::ToolResult,
            EventPayload::StatusChange { .. } => EventKind::StatusChange,
            EventPayload::PlanUpdate { .. } => EventKind::PlanUpdate,
            EventPayload::Error { .. } => EventKind::Error,
            EventPayload::Complete { .. } => EventKind::Complete,
        }
    }
}

impl Event {
    pub fn new(step: usize, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            step,
            payload,
        }
    }

    pub fn think(step: usize, content: impl Into<String>) -> Self {
        Self::new(
            step,
            EventPayload::Think {
                content: content.into(),
            },
        )
    }

    pub fn tool_select(step: usize, name: impl Into<String>) -> Self {
        Self::new(step, EventPayload::ToolSelect { name: name.into() })
    }

    pub fn tool_execute(step: usize, name: impl Into<String>, arguments: Value) -> Self {
        Self::new(
            step,
            EventPayload::ToolExecute {
                name: name.into(),
                arguments,
            },
        )
    }

    pub fn tool_result(step: usize, name: impl Into<String>, result: &ToolResult) -> Self {
        Self::new(
            step,
            EventPayload::ToolResult {
                name: name.into(),
                output: result.output.clone(),
                error: result.error.clone(),
                base64_image: result.base64_image.clone(),
            },
        )
    }

    pub fn status_change(step: usize, state: AgentState, detail: Option<String>) -> Self {
        Self::new(step, EventPayload::StatusChange { state, detail })
    }

    pub fn plan_update(step: usize, plan: PlanSnapshot) -> Self {
        Self::new(step, EventPayload::PlanUpdate { plan })
    }

    pub fn error(step: usize, message: impl Into<String>) -> Self {
        Self::new(
            step,
            EventPayload::Error {
                message: message.into(),
            },
        )
    }

    pub fn complete(step: usize, result: impl Into<String>) -> Self {
        Self::new(
            step,
            EventPayload::Complete {
                result: result.into(),
                terminated: false,
                truncated: false,
            },
        )
    }

    /// Completion forced by hitting the step limit
    pub fn truncated(step: usize, result: impl Into<String>) -> Self {
        Self::new(
            step,
            EventPayload::Complete {
                result: result.into(),
                terminated: false,
                truncated: true,
            },
        )
    }

    /// Completion emitted after cooperative cancellation
    pub fn terminated(step: usize, result: impl Into<String>) -> Self {
        Self::new(
            step,
            EventPayload::Complete {
                result: result.into(),
                terminated: true,
                truncated: false,
            },
        )
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    /// `complete` and `error` end a task's stream
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.payload,
            EventPayload::Complete { .. } | EventPayload::Error { .. }
        )
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
