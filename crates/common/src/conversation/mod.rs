//! Conversation state
//!
//! The ordered turn log for one chat session. This is the only mutable
//! shared resource in the query pipeline: the rewriter appends and removes
//! a transient turn around its generation call, and the answer generator
//! commits a durable (user, model) turn pair on success.
//!
//! Invariant: at any externally observable point the log contains only
//! durably committed turns. `remove_last` exists solely so a component can
//! undo its own immediately prior append.

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Role of a conversation turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

impl Role {
    /// Wire-format name used by the generation API
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

/// A single conversation turn. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Ordered log of turns for one session
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationState {
    turns: Vec<Turn>,
}

impl ConversationState {
    /// Create an empty state (session start)
    pub fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Append a turn to the end. Always succeeds in-process.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Immutable view of the current turn sequence
    pub fn snapshot(&self) -> &[Turn] {
        &self.turns
    }

    /// Remove the most recently appended turn.
    ///
    /// Only valid as an undo of the caller's own immediately prior append.
    pub fn remove_last(&mut self) -> Result<Turn> {
        self.turns.pop().ok_or_else(|| AppError::EmptyState {
            message: "remove_last called on empty conversation state".to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_preserves_order() {
        let mut state = ConversationState::new();
        state.append(Turn::user("what is a queue?"));
        state.append(Turn::model("a FIFO structure"));

        let turns = state.snapshot();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Model);
    }

    #[test]
    fn test_remove_last_undoes_append() {
        let mut state = ConversationState::new();
        state.append(Turn::user("hello"));
        state.append(Turn::user("transient"));

        let removed = state.remove_last().unwrap();
        assert_eq!(removed.text, "transient");
        assert_eq!(state.len(), 1);
        assert_eq!(state.snapshot()[0].text, "hello");
    }

    #[test]
    fn test_remove_last_on_empty_fails() {
        let mut state = ConversationState::new();
        let err = state.remove_last().unwrap_err();
        assert!(matches!(err, AppError::EmptyState { .. }));
    }

    #[test]
    fn test_role_wire_names() {
        assert_eq!(Role::User.as_str(), "user");
        assert_eq!(Role::Model.as_str(), "model");
    }
}
