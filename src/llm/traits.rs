//! Completion provider trait
//!
//! The agent loop only needs one call: send the transcript (plus system
//! messages and tool definitions), get back text and tool calls.

use async_trait::async_trait;

use crate::core::{Message, Result, ToolCall, ToolDefinition};

/// Response from a completion provider
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LLMResponse {
    /// Text content of the response
    pub content: String,
    /// Any tool calls the model wants to make
    pub tool_calls: Vec<ToolCall>,
    /// Token usage information
    pub usage: Option<TokenUsage>,
    /// Model that generated the response
    pub model: String,
}

impl LLMResponse {
    /// Plain text answer
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Answer that selects tools
    pub fn with_tools(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: content.into(),
            tool_calls,
            ..Default::default()
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Trait for completion providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Ask the model for the next turn
    ///
    /// `system` messages are sent ahead of `messages`; `tools` may be empty.
    async fn ask(
        &self,
        messages: &[Message],
        system: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse>;

    /// Get the provider name
    fn name(&self) -> &str;
}
