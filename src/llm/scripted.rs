//! Scripted provider - replays canned responses
//!
//! Deterministic stand-in for a real model. Each `ask` pops the next
//! scripted reply (or failure) and records the request it was given, so
//! tests can assert on what the agent sent.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::core::{ErgonError, Message, Result, ToolCall, ToolDefinition};
use crate::llm::traits::{LLMProvider, LLMResponse};

/// One request as seen by the provider
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub messages: Vec<Message>,
    pub system: Vec<Message>,
    pub tools: Vec<String>,
}

enum Reply {
    Response(LLMResponse),
    Failure(String),
}

/// Provider that answers from a fixed script
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<RecordedRequest>>,
    delay: Option<Duration>,
    repeat_last: bool,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a plain text answer
    pub fn text(self, content: impl Into<String>) -> Self {
        self.respond(LLMResponse::text(content))
    }

    /// Queue an answer that calls one tool
    pub fn tool_call(
        self,
        content: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        self.respond(LLMResponse::with_tools(
            content,
            vec![ToolCall::new(name, arguments)],
        ))
    }

    /// Queue an arbitrary response
    pub fn respond(self, response: LLMResponse) -> Self {
        self.replies.lock().push_back(Reply::Response(response));
        self
    }

    /// Queue a provider failure
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.replies.lock().push_back(Reply::Failure(message.into()));
        self
    }

    /// Sleep before every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Keep answering with the last scripted reply once the script runs out
    pub fn repeat_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().len()
    }

    fn next_reply(&self) -> Result<LLMResponse> {
        let mut replies = self.replies.lock();
        let reply = if self.repeat_last && replies.len() == 1 {
            replies.front().map(|r| match r {
                Reply::Response(resp) => Reply::Response(resp.clone()),
                Reply::Failure(msg) => Reply::Failure(msg.clone()),
            })
        } else {
            replies.pop_front()
        };

        match reply {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::Failure(message)) => Err(ErgonError::provider(message)),
            None => Err(ErgonError::provider("scripted provider has no replies left")),
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn ask(
        &self,
        messages: &[Message],
        system: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        self.requests.lock().push(RecordedRequest {
            messages: messages.to_vec(),
            system: system.to_vec(),
            tools: tools.iter().map(|t| t.function.name.clone()).collect(),
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.next_reply()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
