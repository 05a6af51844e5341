//! Agent policies
//!
//! The agent type is the same for every flavour of run; what differs is
//! injected here: when a plain answer ends the run, how the transcript is
//! augmented before each completion call, and when a loop counts as stuck.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::conversation::Conversation;
use crate::core::{Message, Role};

/// When a model answer without tool calls ends the run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerPolicy {
    /// Finish after the first step, whatever the model did
    Always,
    /// A plain answer is the final answer
    WhenNoToolCalls,
    /// Only a terminal tool ends the run; plain answers continue the loop
    #[default]
    TerminalToolOnly,
}

impl AnswerPolicy {
    /// Whether this step's outcome ends the run
    pub fn finishes(self, had_tool_calls: bool) -> bool {
        match self {
            AnswerPolicy::Always => true,
            AnswerPolicy::WhenNoToolCalls => !had_tool_calls,
            AnswerPolicy::TerminalToolOnly => false,
        }
    }
}

/// Transcript transformation applied before each completion call
///
/// Receives the request transcript and returns the one actually sent.
pub type ContextPolicy = Arc<dyn Fn(&[Message]) -> Vec<Message> + Send + Sync>;

/// Append `hint` as a user turn whenever one of the last `window` messages
/// is a tool turn from `tool_name` or mentions it
pub fn recent_tool_hint(
    tool_name: impl Into<String>,
    window: usize,
    hint: impl Into<String>,
) -> ContextPolicy {
    let tool_name = tool_name.into();
    let hint = hint.into();
    Arc::new(move |messages: &[Message]| {
        let start = messages.len().saturating_sub(window);
        let recent = &messages[start..];
        let needle = tool_name.to_lowercase();
        let in_use = recent.iter().any(|m| {
            m.tool_name.as_deref() == Some(tool_name.as_str())
                || m
                    .tool_calls
                    .as_ref()
                    .is_some_and(|calls| calls.iter().any(|c| c.name == tool_name))
                || m.content.to_lowercase().contains(&needle)
        });

        let mut out = messages.to_vec();
        if in_use {
            out.push(Message::user(hint.clone()));
        }
        out
    })
}

const STUCK_NOTE: &str = "Observed duplicate responses. Consider new strategies and avoid \
repeating ineffective paths already attempted.";

/// Detects an agent repeating itself
#[derive(Debug, Clone)]
pub struct StuckDetector {
    /// Identical trailing assistant turns that count as stuck; 0 disables
    threshold: usize,
    interventions: usize,
}

impl StuckDetector {
    pub fn new(threshold: usize) -> Self {
        Self {
            threshold,
            interventions: 0,
        }
    }

    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Times a corrective note was injected
    pub fn interventions(&self) -> usize {
        self.interventions
    }

    /// Whether the last `threshold` assistant turns are identical
    ///
    /// Turns with neither content nor tool calls never count.
    pub fn is_stuck(&self, conversation: &Conversation) -> bool {
        if self.threshold < 2 {
            return false;
        }

        let recent: Vec<&Message> = conversation.assistant_turns().take(self.threshold).collect();
        if recent.len() < self.threshold {
            return false;
        }

        let first = recent[0];
        let meaningful = !first.content.trim().is_empty()
            || first.tool_calls.as_ref().is_some_and(|c| !c.is_empty());
        meaningful
            && recent
                .iter()
                .all(|m| m.content == first.content && m.tool_calls == first.tool_calls)
    }

    /// Inject a corrective note when stuck; returns whether it did
    pub fn check(&mut self, conversation: &mut Conversation) -> bool {
        if !self.is_stuck(conversation) {
            return false;
        }
        // Never stack two notes back to back.
        if conversation
            .messages()
            .last()
            .is_some_and(|m| m.role == Role::System && m.content == STUCK_NOTE)
        {
            return false;
        }
        conversation.add_note(STUCK_NOTE);
        self.interventions += 1;
        true
    }
}

impl Default for StuckDetector {
    fn default() -> Self {
        Self::new(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ToolCall;
    use serde_json::json;

    #[test]
    fn answer_policy_matrix() {
        assert!(AnswerPolicy::Always.finishes(true));
        assert!(AnswerPolicy::Always.finishes(false));
        assert!(AnswerPolicy::WhenNoToolCalls.finishes(false));
        assert!(!AnswerPolicy::WhenNoToolCalls.finishes(true));
        assert!(!AnswerPolicy::TerminalToolOnly.finishes(false));
    }

    #[test]
    fn detects_identical_turns_at_threshold() {
        let mut conv = Conversation::new();
        conv.add_user("go");
        conv.add_assistant("same");
        conv.add_tool("planning", "ok");
        conv.add_assistant("same");

        assert!(StuckDetector::new(2).is_stuck(&conv));
        assert!(!StuckDetector::new(3).is_stuck(&conv));
        assert!(!StuckDetector::disabled().is_stuck(&conv));
    }

    #[test]
    fn different_tool_calls_are_not_stuck() {
        let mut conv = Conversation::new();
        conv.push(Message::assistant_with_tools(
            "",
            vec![ToolCall::new("planning", json!({ "command": "list" }))],
        ));
        conv.push(Message::assistant_with_tools(
            "",
            vec![ToolCall::new("planning", json!({ "command": "get" }))],
        ));
        assert!(!StuckDetector::new(2).is_stuck(&conv));
    }

    #[test]
    fn empty_turns_never_count() {
        let mut conv = Conversation::new();
        conv.add_assistant("");
        conv.add_assistant("");
        assert!(!StuckDetector::new(2).is_stuck(&conv));
    }

    #[test]
    fn check_does_not_stack_notes() {
        let mut conv = Conversation::new();
        conv.add_assistant("loop");
        conv.add_assistant("loop");

        let mut detector = StuckDetector::new(2);
        assert!(detector.check(&mut conv));
        assert!(!detector.check(&mut conv));
        assert_eq!(detector.interventions(), 1);
        assert_eq!(conv.messages().last().map(|m| m.role), Some(Role::System));
    }

    #[test]
    fn recent_tool_hint_only_when_tool_seen() {
        let policy = recent_tool_hint("browser_use", 3, "Look at the page.");
        let quiet = vec![Message::user("hello")];
        assert_eq!(policy(&quiet).len(), 1);

        let busy = vec![Message::user("hello"), Message::tool("browser_use", "opened")];
        let out = policy(&busy);
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].content, "Look at the page.");
    }
}
