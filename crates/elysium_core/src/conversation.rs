use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat roles for conversation turns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

/// One message in a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

/// Per-user conversation history.
///
/// Created on a user's first question, cleared by an explicit reset or the
/// daily sweep. The service keeps at most one per user identifier. Turns hold
/// the bare question and raw model answer; knowledge context is rebuilt per
/// request rather than persisted into history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub turns: Vec<ChatTurn>,
    pub started_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            turns: Vec::new(),
            started_at: Utc::now(),
        }
    }

    pub fn push_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(ChatTurn::user(question));
        self.turns.push(ChatTurn::assistant(answer));
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
