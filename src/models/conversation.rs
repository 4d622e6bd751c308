//! Conversation state.
//!
//! A conversation is a caller-owned, append-only sequence of role-tagged
//! turns. The retrieval core only ever reads a bounded suffix of it: the last
//! 6 turns for entity carry-over and the last 10 for generative prompting.
//! Window-size enforcement on what gets passed in is the caller's job.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction.
    System,
    /// The person asking questions.
    User,
    /// The assistant's answer.
    Assistant,
}

impl Role {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parses a role string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "system" => Some(Self::System),
            "user" | "human" => Some(Self::User),
            "assistant" | "ai" => Some(Self::Assistant),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single `{role, content}` turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    /// Who produced the turn.
    pub role: Role,
    /// The text of the turn.
    pub content: String,
}

impl ChatTurn {
    /// Creates a turn.
    #[must_use]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Creates a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Creates an assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Returns the last `n` turns of a history slice (all of it when shorter).
#[must_use]
pub fn recent(history: &[ChatTurn], n: usize) -> &[ChatTurn] {
    &history[history.len().saturating_sub(n)..]
}

/// Append-only session history owned by the caller.
///
/// # Example
///
/// ```rust
/// use crimegraph::models::Conversation;
///
/// let mut conversation = Conversation::new();
/// conversation.push_user("Which gangs operate in Pilsen?");
/// conversation.push_assistant("West Side Crew is the most active.");
/// assert_eq!(conversation.window(10).len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<ChatTurn>,
}

impl Conversation {
    /// Creates an empty conversation.
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Appends a turn.
    pub fn push(&mut self, turn: ChatTurn) {
        self.turns.push(turn);
    }

    /// Appends a user turn.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(ChatTurn::user(content));
    }

    /// Appends an assistant turn.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(ChatTurn::assistant(content));
    }

    /// Returns the full history.
    #[must_use]
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Returns the last `n` turns.
    #[must_use]
    pub fn window(&self, n: usize) -> &[ChatTurn] {
        recent(&self.turns, n)
    }

    /// Returns the number of turns.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.turns.len()
    }

    /// Returns whether no turns were recorded.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

impl From<Vec<ChatTurn>> for Conversation {
    fn from(turns: Vec<ChatTurn>) -> Self {
        Self { turns }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_bounds() {
        let history: Vec<ChatTurn> = (0..8).map(|i| ChatTurn::user(format!("q{i}"))).collect();
        let last = recent(&history, 6);
        assert_eq!(last.len(), 6);
        assert_eq!(last[0].content, "q2");

        let short = recent(&history[..3], 6);
        assert_eq!(short.len(), 3);
        assert!(recent(&[], 10).is_empty());
    }

    #[test]
    fn test_window_does_not_truncate_history() {
        let mut conversation = Conversation::new();
        for i in 0..12 {
            conversation.push_user(format!("question {i}"));
            conversation.push_assistant(format!("answer {i}"));
        }
        assert_eq!(conversation.window(10).len(), 10);
        assert_eq!(conversation.len(), 24);
        assert_eq!(conversation.turns()[0].content, "question 0");
    }

    #[test]
    fn test_role_serde() {
        let turn = ChatTurn::assistant("hi");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
        assert_eq!(Role::parse("Human"), Some(Role::User));
        assert_eq!(Role::parse("tool"), None);
    }
}
