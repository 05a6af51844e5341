//! Conversation transcript
//!
//! Append-only record of user, assistant, tool and system-note turns for one
//! agent run.

use crate::core::{Message, Role};

/// Ordered transcript of one run
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user message
    pub fn add_user(&mut self, content: impl Into<String>) {
        self.push(Message::user(content));
    }

    /// Add an assistant message
    pub fn add_assistant(&mut self, content: impl Into<String>) {
        self.push(Message::assistant(content));
    }

    /// Add a tool turn
    pub fn add_tool(&mut self, name: impl Into<String>, content: impl Into<String>) {
        self.push(Message::tool(name, content));
    }

    /// Add a system note mid-conversation
    pub fn add_note(&mut self, content: impl Into<String>) {
        self.push(Message::system(content));
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// All messages, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Assistant turns, newest first
    pub fn assistant_turns(&self) -> impl Iterator<Item = &Message> {
        self.messages
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
    }

    /// Get message count
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_basic() {
        let mut conv = Conversation::new();
        conv.add_user("Hello");
        conv.add_assistant("Hi there!");
        conv.add_tool("finish", "done");

        assert_eq!(conv.len(), 3);
        let roles: Vec<Role> = conv.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::Tool]);
        assert_eq!(conv.messages()[2].tool_name.as_deref(), Some("finish"));
    }

    #[test]
    fn test_assistant_turns_newest_first() {
        let mut conv = Conversation::new();
        conv.add_assistant("a");
        conv.add_user("u");
        conv.add_assistant("b");

        let turns: Vec<&str> = conv.assistant_turns().map(|m| m.content.as_str()).collect();
        assert_eq!(turns, vec!["b", "a"]);
    }
}
