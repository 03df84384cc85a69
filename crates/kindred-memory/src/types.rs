// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Types owned by the memory engine.

use chrono::{DateTime, Utc};
use kindred_config::model::AgentConfig;
use kindred_core::{DistilledMemory, Role};
use serde::{Deserialize, Serialize};

/// One turn in a thread's short-term memory. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StmEntry {
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl StmEntry {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }
}

/// An incoming message to process.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub user_id: String,
    pub thread_id: String,
    pub text: String,
    /// Display name of the sender, used for logging only.
    pub author_name: Option<String>,
}

impl TurnRequest {
    pub fn new(
        user_id: impl Into<String>,
        thread_id: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            thread_id: thread_id.into(),
            text: text.into(),
            author_name: None,
        }
    }
}

/// Result of a processed turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurnReply {
    /// Text to send back. Empty when the model produced nothing usable.
    pub reply: String,
    /// Memories learned by a distillation triggered by this turn.
    pub distilled: Vec<DistilledMemory>,
}

/// A titled past conversation used by conversation recall.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub messages: Vec<ConversationMessage>,
}

/// One message of a past conversation.
///
/// `role` is free-form; only `user` and `assistant` messages are indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: String,
    #[serde(default)]
    pub text: String,
}

/// An item paired with its relevance score.
#[derive(Debug, Clone, PartialEq)]
pub struct Scored<T> {
    pub item: T,
    pub score: f64,
}

/// Names used for each speaker when rendering transcripts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeakerLabels {
    pub user: String,
    pub assistant: String,
}

impl SpeakerLabels {
    pub fn new(user: impl Into<String>, assistant: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            assistant: assistant.into(),
        }
    }

    pub fn from_config(agent: &AgentConfig) -> Self {
        Self::new(agent.user_label.clone(), agent.assistant_label.clone())
    }

    pub fn label(&self, role: Role) -> &str {
        match role {
            Role::User => &self.user,
            Role::Assistant => &self.assistant,
        }
    }

    /// Render entries as `Label: text` lines.
    pub fn transcript(&self, entries: &[StmEntry]) -> String {
        entries
            .iter()
            .map(|e| format!("{}: {}", self.label(e.role), e.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
