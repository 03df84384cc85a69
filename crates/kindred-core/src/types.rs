// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the memory engine and its collaborators.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Open key/value metadata carried by blocks and archival records.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// `type` value of the non-evictable identity memories.
pub const CORE_VOW_KIND: &str = "core-vow";

/// `type` value of engine-generated markers such as memory gaps.
pub const SYSTEM_KIND: &str = "system";

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of collaborator behind an adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Completion,
    Storage,
}

/// Speaker of a dialogue turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A single message handed to the generative model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Convenience constructor for a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request for the opaque `complete(system, messages)` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// System prompt text.
    pub system: String,
    /// Ordered dialogue messages.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature; `None` leaves it to the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Output token cap; `None` leaves it to the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Where a distilled memory came from.
///
/// Stored as a plain string: `distilled`, `manual`, `system`,
/// `data-file:<name>`, or any other producer label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MemorySource {
    /// Extracted from conversation by the distillation pipeline.
    Distilled,
    /// Added by an explicit user command.
    Manual,
    /// Core vows and engine markers.
    System,
    /// Imported from a text file in the data directory.
    DataFile(String),
    /// Any other producer label, kept verbatim.
    Other(String),
}

impl MemorySource {
    /// Parse from a stored string.
    pub fn from_str_value(s: &str) -> Self {
        match s {
            "distilled" => MemorySource::Distilled,
            "manual" => MemorySource::Manual,
            "system" => MemorySource::System,
            other => match other.strip_prefix("data-file:") {
                Some(name) => MemorySource::DataFile(name.to_string()),
                None => MemorySource::Other(other.to_string()),
            },
        }
    }
}

impl fmt::Display for MemorySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemorySource::Distilled => f.write_str("distilled"),
            MemorySource::Manual => f.write_str("manual"),
            MemorySource::System => f.write_str("system"),
            MemorySource::DataFile(name) => write!(f, "data-file:{name}"),
            MemorySource::Other(label) => f.write_str(label),
        }
    }
}

impl From<String> for MemorySource {
    fn from(s: String) -> Self {
        MemorySource::from_str_value(&s)
    }
}

impl From<MemorySource> for String {
    fn from(source: MemorySource) -> Self {
        source.to_string()
    }
}

/// Emotional quality tag attached by the emotional distillation variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EmotionalTexture {
    Tender,
    Playful,
    Vulnerable,
    Heated,
    Aching,
    Fierce,
    Grounded,
    Electric,
    Still,
    Raw,
    Safe,
    Edged,
}

fn default_enabled() -> bool {
    true
}

// Hand-edited seed files often omit the source.
fn default_source() -> MemorySource {
    MemorySource::Distilled
}

/// A durable long-term memory record.
///
/// The identity key used for merge and dedup is the lowercased `summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistilledMemory {
    /// Optional external identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// What was learned. Never empty.
    pub summary: String,

    /// Free-form category (`core-vow`, `system`, `manual`, `preference`, ...).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default = "default_source")]
    pub source: MemorySource,

    #[serde(with = "chrono::serde::ts_milliseconds", default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// -1 (painful) to 1 (joyful).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_valence: Option<f64>,

    /// 0 (calm) to 1 (highly charged).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<f64>,

    /// 0 (tangential) to 1 (core to the relationship).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relational_weight: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub texture: Option<EmotionalTexture>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_context: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub their_tone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_response: Option<String>,
}

impl DistilledMemory {
    /// Create an enabled memory stamped with the current time.
    pub fn new(summary: impl Into<String>, kind: Option<String>, source: MemorySource) -> Self {
        Self {
            id: None,
            summary: summary.into(),
            kind,
            enabled: true,
            source,
            created_at: Utc::now(),
            tags: Vec::new(),
            emotional_valence: None,
            intensity: None,
            relational_weight: None,
            texture: None,
            conversation_context: None,
            their_tone: None,
            my_response: None,
        }
    }

    /// Builder-style tag assignment.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Merge key: the lowercased summary.
    pub fn key(&self) -> String {
        self.summary.to_lowercase()
    }

    pub fn is_core_vow(&self) -> bool {
        self.kind.as_deref() == Some(CORE_VOW_KIND)
    }
}

/// The durable row for one (bot, user) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRow {
    pub bot_id: String,
    pub user_id: String,
    #[serde(default)]
    pub ltm: Vec<DistilledMemory>,
    #[serde(default)]
    pub traits: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// The two kinds of context blocks.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BlockKind {
    /// Facts about the person the agent talks to.
    Human,
    /// Facts about the agent itself.
    Persona,
}

impl BlockKind {
    /// Convert to string for SQLite storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Human => "human",
            BlockKind::Persona => "persona",
        }
    }
}

/// A labelled context block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub label: String,
    #[serde(rename = "block_type")]
    pub kind: BlockKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,
}

/// A freeform archival text record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivalMemory {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub importance: Option<f64>,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_string_forms() {
        assert_eq!(MemorySource::Distilled.to_string(), "distilled");
        assert_eq!(
            MemorySource::DataFile("notes.txt".into()).to_string(),
            "data-file:notes.txt"
        );
        assert_eq!(
            MemorySource::from_str_value("data-file:notes.txt"),
            MemorySource::DataFile("notes.txt".into())
        );
        assert_eq!(
            MemorySource::from_str_value("companion"),
            MemorySource::Other("companion".into())
        );
    }

    #[test]
    fn distilled_memory_uses_wire_field_names() {
        let json = r#"{
            "summary": "Loves rainy days",
            "type": "preference",
            "source": "manual",
            "createdAt": 1700000000000,
            "tags": ["weather"],
            "emotionalValence": 0.5,
            "texture": "tender",
            "ghostYourTouch": true
        }"#;
        let mem: DistilledMemory = serde_json::from_str(json).unwrap();
        assert_eq!(mem.kind.as_deref(), Some("preference"));
        assert!(mem.enabled, "enabled defaults to true");
        assert_eq!(mem.source, MemorySource::Manual);
        assert_eq!(mem.created_at.timestamp_millis(), 1_700_000_000_000);
        assert_eq!(mem.texture, Some(EmotionalTexture::Tender));

        let out = serde_json::to_value(&mem).unwrap();
        assert_eq!(out["type"], "preference");
        assert_eq!(out["createdAt"], 1_700_000_000_000i64);
        assert!(out.get("intensity").is_none());
    }

    #[test]
    fn key_is_lowercased_summary() {
        let mem = DistilledMemory::new("Likes TEA", None, MemorySource::Manual);
        assert_eq!(mem.key(), "likes tea");
        assert!(!mem.is_core_vow());
    }

    #[test]
    fn texture_parses_case_insensitively() {
        use std::str::FromStr;
        assert_eq!(
            EmotionalTexture::from_str("Electric").unwrap(),
            EmotionalTexture::Electric
        );
        assert!(EmotionalTexture::from_str("gloomy").is_err());
    }

    #[test]
    fn block_uses_block_type_field() {
        let json =
            r#"{"label":"pets","block_type":"human","content":"has a cat","metadata":{"k":1}}"#;
        let block: MemoryBlock = serde_json::from_str(json).unwrap();
        assert_eq!(block.kind, BlockKind::Human);
        assert_eq!(block.metadata.unwrap()["k"], 1);
    }
}
