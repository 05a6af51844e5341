//! Custom error types for Ergon
//!
//! Provides a unified error handling system across all modules. Tool-level
//! failures (validation, execution) are recovered inside the agent loop;
//! provider failures end the step; cancellation always ends cleanly.

use thiserror::Error;

/// Main error type for Ergon operations
#[derive(Error, Debug)]
pub enum ErgonError {
    /// Completion call failed (connection, status, malformed body)
    #[error("Provider error: {0}")]
    Provider(String),

    /// No tool registered under this name
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Tool arguments failed schema validation
    #[error("Invalid arguments for '{tool}' at '{field}': {message}")]
    Validation {
        tool: String,
        field: String,
        message: String,
    },

    /// Tool failed while running
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// Two tools registered under the same name
    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    /// Plan tracker consistency errors
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// Cooperative cancellation reached a suspension point
    #[error("Task was cancelled")]
    Cancelled,

    /// Unknown task id
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// Operation not allowed in the agent's current state
    #[error("Invalid agent state: {0}")]
    InvalidState(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the plan tracker
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("plan '{0}' not found")]
    NotFound(String),

    #[error("plan '{0}' already exists")]
    AlreadyExists(String),

    #[error("step index {index} out of range (plan has {len} steps)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("a plan needs at least one step")]
    EmptySteps,

    #[error("no active plan")]
    NoActivePlan,

    #[error("unknown step status '{0}'")]
    UnknownStatus(String),
}

/// Convenience Result type for Ergon operations
pub type Result<T> = std::result::Result<T, ErgonError>;

impl ErgonError {
    /// Create a provider error
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error for a tool argument
    pub fn validation(
        tool: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Validation {
            tool: tool.into(),
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the agent loop recovers from this error locally
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ToolNotFound(_)
                | Self::Validation { .. }
                | Self::ToolExecution(_)
                | Self::Plan(_)
        )
    }
}
