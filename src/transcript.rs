//! Conversation transcript
//!
//! The transcript is the ordered history of role-tagged turns in a session.
//! Turns are only ever appended; nothing is removed or rewritten.

use serde::{Deserialize, Serialize};

/// Author of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instruction to the model
    System,
    /// Model-authored (or canned) reply
    Assistant,
    /// Recognised human speech
    User,
}

impl Role {
    /// Wire name of the role
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Assistant => "assistant",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One role-tagged message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who authored the turn
    pub role: Role,
    /// Text content
    pub content: String,
}

impl Turn {
    /// Create a system turn
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create an assistant turn
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a user turn
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Append-only, chronologically ordered conversation history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Create an empty transcript
    #[must_use]
    pub const fn new() -> Self {
        Self { turns: Vec::new() }
    }

    /// Append a turn at the tail
    pub fn push(&mut self, turn: Turn) {
        tracing::debug!(role = %turn.role, index = self.turns.len(), "transcript append");
        self.turns.push(turn);
    }

    /// Most recent turn, if any
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// All turns, oldest first
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turn has been appended yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Copy of the history with extra turns appended, for building a request
    ///
    /// The transcript itself is left untouched.
    #[must_use]
    pub fn snapshot_with(&self, trailing: impl IntoIterator<Item = Turn>) -> Vec<Turn> {
        let mut messages = self.turns.clone();
        messages.extend(trailing);
        messages
    }
}
