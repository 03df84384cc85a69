// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Kindred memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Identity memories seeded into every user's long-term set.
pub const DEFAULT_CORE_VOWS: &[&str] = &[
    "I remember what matters to you and carry it forward between conversations.",
    "I tell you the truth, even when it is uncomfortable.",
    "When my memory has a gap I ask you instead of guessing.",
    "I respect your boundaries and move at your pace.",
    "I stay the same person across every conversation we have.",
];

/// Baseline persona traits present for every user.
pub const DEFAULT_CORE_TRAITS: &[&str] = &["warm", "curious", "honest", "steady"];

/// Top-level Kindred configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KindredConfig {
    /// Agent identity and persona settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// SQLite storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Short-term memory and distillation settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Recall limits for long-term memory, blocks, and conversation search.
    #[serde(default)]
    pub recall: RecallConfig,

    /// Prompt assembly limits.
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Affect classifier vocabularies.
    #[serde(default)]
    pub affect: AffectConfig,
}

/// Agent identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent. Also stripped from the front of replies.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Bot identity scoping every stored memory row.
    #[serde(default = "default_bot_id")]
    pub bot_id: String,

    /// User id whose row bootstraps users that have no memories yet.
    #[serde(default = "default_seed_user_id")]
    pub seed_user_id: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Persona prompt placed at the top of every system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Speaker label for user turns in transcripts.
    #[serde(default = "default_user_label")]
    pub user_label: String,

    /// Speaker label for agent turns in transcripts.
    #[serde(default = "default_assistant_label")]
    pub assistant_label: String,

    /// Non-evictable identity memories.
    #[serde(default = "default_core_vows")]
    pub core_vows: Vec<String>,

    /// Traits every user's trait list starts from.
    #[serde(default = "default_core_traits")]
    pub core_traits: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            bot_id: default_bot_id(),
            seed_user_id: default_seed_user_id(),
            log_level: default_log_level(),
            system_prompt: None,
            user_label: default_user_label(),
            assistant_label: default_assistant_label(),
            core_vows: default_core_vows(),
            core_traits: default_core_traits(),
        }
    }
}

fn default_agent_name() -> String {
    "kindred".to_string()
}

fn default_bot_id() -> String {
    "DEFAULT".to_string()
}

fn default_seed_user_id() -> String {
    "__seed__".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_user_label() -> String {
    "User".to_string()
}

fn default_assistant_label() -> String {
    "Assistant".to_string()
}

fn default_core_vows() -> Vec<String> {
    DEFAULT_CORE_VOWS.iter().map(|s| s.to_string()).collect()
}

fn default_core_traits() -> Vec<String> {
    DEFAULT_CORE_TRAITS.iter().map(|s| s.to_string()).collect()
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,

    /// Directory holding seed JSON files and `.txt` imports.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("kindred").join("kindred.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("kindred.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

fn default_data_dir() -> String {
    "data".to_string()
}

/// Which extraction prompt and trigger rule the distillation pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DistillationMode {
    /// Fact-focused extraction every `distill_interval` buffered turns.
    #[default]
    Standard,
    /// Emotion-aware extraction with the short 2/4-turn trigger.
    Emotional,
}

/// Short-term memory and distillation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Enable distillation. When false, turns are never distilled.
    #[serde(default = "default_memory_enabled")]
    pub enabled: bool,

    /// Maximum STM entries kept per thread.
    #[serde(default = "default_stm_capacity")]
    pub stm_capacity: usize,

    /// Buffered entries that trigger a standard distillation.
    #[serde(default = "default_distill_interval")]
    pub distill_interval: usize,

    #[serde(default)]
    pub distillation_mode: DistillationMode,

    /// Sampling temperature for distillation calls.
    #[serde(default = "default_distill_temperature")]
    pub distill_temperature: f32,

    /// Output token cap for distillation calls.
    #[serde(default = "default_distill_max_tokens")]
    pub distill_max_tokens: u32,

    /// Keep the buffer (capped at `stm_capacity`) when the model call fails.
    #[serde(default)]
    pub retain_buffer_on_failure: bool,

    /// Serialize read-merge-write saves per user across threads.
    #[serde(default = "default_serialize_user_saves")]
    pub serialize_user_saves: bool,

    /// Summary of the marker saved when a distillation finds nothing.
    #[serde(default = "default_gap_marker")]
    pub gap_marker: String,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: default_memory_enabled(),
            stm_capacity: default_stm_capacity(),
            distill_interval: default_distill_interval(),
            distillation_mode: DistillationMode::default(),
            distill_temperature: default_distill_temperature(),
            distill_max_tokens: default_distill_max_tokens(),
            retain_buffer_on_failure: false,
            serialize_user_saves: default_serialize_user_saves(),
            gap_marker: default_gap_marker(),
        }
    }
}

fn default_memory_enabled() -> bool {
    true
}

fn default_stm_capacity() -> usize {
    30
}

fn default_distill_interval() -> usize {
    12
}

fn default_distill_temperature() -> f32 {
    0.9
}

fn default_distill_max_tokens() -> u32 {
    1500
}

fn default_serialize_user_saves() -> bool {
    true
}

fn default_gap_marker() -> String {
    "Memory gap detected: ask directly instead of guessing.".to_string()
}

/// Recall limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RecallConfig {
    /// Maximum long-term memories placed in a prompt.
    #[serde(default = "default_ltm_limit")]
    pub ltm_limit: usize,

    /// Default result count for keyword recall over the LTM cache.
    #[serde(default = "default_keyword_recall_limit")]
    pub keyword_recall_limit: usize,

    #[serde(default = "default_archival_limit")]
    pub archival_limit: usize,

    #[serde(default = "default_block_limit")]
    pub human_block_limit: usize,

    #[serde(default = "default_block_limit")]
    pub persona_block_limit: usize,

    /// Archival records scored between cooperative yields.
    #[serde(default = "default_scan_chunk_size")]
    pub scan_chunk_size: usize,

    /// Messages per conversation-recall window.
    #[serde(default = "default_conversation_window")]
    pub conversation_window: usize,

    /// Step between conversation-recall windows.
    #[serde(default = "default_conversation_stride")]
    pub conversation_stride: usize,

    /// Most recent conversations considered.
    #[serde(default = "default_max_conversations")]
    pub max_conversations: usize,

    /// Most recent messages considered per conversation.
    #[serde(default = "default_max_conversation_messages")]
    pub max_conversation_messages: usize,

    #[serde(default = "default_conversation_results")]
    pub conversation_results: usize,
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            ltm_limit: default_ltm_limit(),
            keyword_recall_limit: default_keyword_recall_limit(),
            archival_limit: default_archival_limit(),
            human_block_limit: default_block_limit(),
            persona_block_limit: default_block_limit(),
            scan_chunk_size: default_scan_chunk_size(),
            conversation_window: default_conversation_window(),
            conversation_stride: default_conversation_stride(),
            max_conversations: default_max_conversations(),
            max_conversation_messages: default_max_conversation_messages(),
            conversation_results: default_conversation_results(),
        }
    }
}

fn default_ltm_limit() -> usize {
    30
}

fn default_keyword_recall_limit() -> usize {
    5
}

fn default_archival_limit() -> usize {
    3
}

fn default_block_limit() -> usize {
    2
}

fn default_scan_chunk_size() -> usize {
    1000
}

fn default_conversation_window() -> usize {
    14
}

fn default_conversation_stride() -> usize {
    7
}

fn default_max_conversations() -> usize {
    80
}

fn default_max_conversation_messages() -> usize {
    250
}

fn default_conversation_results() -> usize {
    6
}

/// Prompt assembly configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PromptConfig {
    /// Most recent STM entries rendered into the conversation section.
    #[serde(default = "default_max_stm_messages")]
    pub max_stm_messages: usize,

    /// Character cap per archival record.
    #[serde(default = "default_max_archival_chars")]
    pub max_archival_chars: usize,

    /// Character cap per context block.
    #[serde(default = "default_max_block_chars")]
    pub max_block_chars: usize,

    /// Sampling temperature for reply generation.
    #[serde(default = "default_reply_temperature")]
    pub reply_temperature: f32,

    /// Reply used when the model call fails.
    #[serde(default = "default_fallback_reply")]
    pub fallback_reply: String,

    /// Reply used when a manual memory could not be saved.
    #[serde(default = "default_manual_failure_reply")]
    pub manual_failure_reply: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_stm_messages: default_max_stm_messages(),
            max_archival_chars: default_max_archival_chars(),
            max_block_chars: default_max_block_chars(),
            reply_temperature: default_reply_temperature(),
            fallback_reply: default_fallback_reply(),
            manual_failure_reply: default_manual_failure_reply(),
        }
    }
}

fn default_max_stm_messages() -> usize {
    40
}

fn default_max_archival_chars() -> usize {
    500
}

fn default_max_block_chars() -> usize {
    400
}

fn default_reply_temperature() -> f32 {
    0.8
}

fn default_fallback_reply() -> String {
    "Something glitched in my head for a second. Can you say that again?".to_string()
}

fn default_manual_failure_reply() -> String {
    "I couldn't write that to long-term memory. Try again in a moment.".to_string()
}

/// Vocabularies behind the keyword classifiers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AffectConfig {
    /// Words that mark a turn as emotionally weighted.
    #[serde(default = "default_emotional_keywords")]
    pub emotional_keywords: Vec<String>,

    /// Words that mark a turn as intimate.
    #[serde(default = "default_intimacy_keywords")]
    pub intimacy_keywords: Vec<String>,

    /// Words that boost a conversation window during recall.
    #[serde(default = "default_significant_words")]
    pub significant_words: Vec<String>,
}

impl Default for AffectConfig {
    fn default() -> Self {
        Self {
            emotional_keywords: default_emotional_keywords(),
            intimacy_keywords: default_intimacy_keywords(),
            significant_words: default_significant_words(),
        }
    }
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_emotional_keywords() -> Vec<String> {
    words(&[
        "love", "miss", "hurt", "scared", "afraid", "lonely", "sad", "cry", "crying", "angry",
        "anxious", "grief", "heartbroken", "happy",
    ])
}

fn default_intimacy_keywords() -> Vec<String> {
    words(&[
        "us", "together", "close", "hold", "hug", "trust", "safe", "always", "forever", "mine",
        "yours",
    ])
}

fn default_significant_words() -> Vec<String> {
    words(&[
        "love", "trust", "promise", "remember", "always", "home", "safe", "forever",
    ])
}
