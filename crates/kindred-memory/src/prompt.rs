// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt assembly and reply cleanup.
//!
//! The system prompt is built from up to six sections, each omitted when it
//! has nothing to show:
//!
//! ```text
//! <persona prompt>
//! # TRAITS
//! # MEMORY        core vows, then memories relevant to the message
//! # ARCHIVAL      archival search hits, truncated
//! # CONTEXT       human then persona blocks, truncated
//! # CONVERSATION  the newest short-term entries before this message
//! ```
//!
//! The current message itself is sent as the only user message.

use std::sync::LazyLock;

use regex::Regex;

use kindred_config::KindredConfig;
use kindred_config::model::PromptConfig;
use kindred_core::{
    ArchivalMemory, ChatMessage, CompletionRequest, DistilledMemory, MemoryBlock,
};

use crate::types::{SpeakerLabels, StmEntry};

const CORE_VOW_BOOST: usize = 100;

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Everything recalled for one turn.
#[derive(Debug, Clone, Copy)]
pub struct PromptContext<'a> {
    pub user_text: &'a str,
    /// Short-term entries from before the current message.
    pub history: &'a [StmEntry],
    pub memories: &'a [DistilledMemory],
    pub traits: &'a [String],
    pub archival: &'a [ArchivalMemory],
    pub human_blocks: &'a [MemoryBlock],
    pub persona_blocks: &'a [MemoryBlock],
}

/// Memories worth showing for `user_text`, best first.
///
/// Words longer than three characters are matched as substrings of each
/// memory's summary and tags. Core vows always qualify and sort first. With
/// no such words, only the core vows are returned.
pub fn filter_relevant_ltm(
    user_text: &str,
    memories: &[DistilledMemory],
    limit: usize,
) -> Vec<DistilledMemory> {
    let lowered = user_text.to_lowercase();
    let words: Vec<&str> = lowered
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .collect();

    let enabled = memories.iter().filter(|m| m.enabled);
    if words.is_empty() {
        return enabled.filter(|m| m.is_core_vow()).cloned().collect();
    }

    let mut scored: Vec<(usize, &DistilledMemory)> = enabled
        .map(|memory| {
            let haystack = format!(
                "{} {}",
                memory.summary.to_lowercase(),
                memory.tags.join(" ").to_lowercase()
            );
            let mut score = words.iter().filter(|w| haystack.contains(*w)).count();
            if memory.is_core_vow() {
                score += CORE_VOW_BOOST;
            }
            (score, memory)
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored
        .into_iter()
        .filter(|(score, _)| *score > 0)
        .take(limit)
        .map(|(_, memory)| memory.clone())
        .collect()
}

/// `[Core Vows]` and `[Relevant Memories]` bullet lists.
pub fn format_ltm(memories: &[DistilledMemory]) -> String {
    let (vows, other): (Vec<&DistilledMemory>, Vec<&DistilledMemory>) =
        memories.iter().partition(|m| m.is_core_vow());

    let bullets = |list: &[&DistilledMemory]| {
        list.iter()
            .map(|m| format!("- {}", m.summary))
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut groups = Vec::new();
    if !vows.is_empty() {
        groups.push(format!("[Core Vows]\n{}", bullets(&vows)));
    }
    if !other.is_empty() {
        groups.push(format!("[Relevant Memories]\n{}", bullets(&other)));
    }
    groups.join("\n\n")
}

/// The first `max_chars` characters, with `...` when something was cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

pub fn format_archival(records: &[ArchivalMemory], max_chars: usize) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| format!("[Archival {}] {}", i + 1, truncate_chars(&r.content, max_chars)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// `[label] content` paragraphs; unlabelled blocks are numbered.
pub fn format_blocks<'a>(
    blocks: impl IntoIterator<Item = &'a MemoryBlock>,
    max_chars: usize,
) -> String {
    blocks
        .into_iter()
        .enumerate()
        .map(|(i, block)| {
            let label = if block.label.is_empty() {
                format!("Block {}", i + 1)
            } else {
                block.label.clone()
            };
            format!("[{label}] {}", truncate_chars(&block.content, max_chars))
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds reply requests from recalled context.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    config: PromptConfig,
    ltm_limit: usize,
    system_prompt: Option<String>,
    labels: SpeakerLabels,
}

impl PromptBuilder {
    pub fn new(config: &KindredConfig) -> Self {
        Self {
            config: config.prompt.clone(),
            ltm_limit: config.recall.ltm_limit,
            system_prompt: config.agent.system_prompt.clone(),
            labels: SpeakerLabels::from_config(&config.agent),
        }
    }

    pub fn build(&self, ctx: &PromptContext<'_>) -> CompletionRequest {
        CompletionRequest {
            system: self.system_text(ctx),
            messages: vec![ChatMessage::user(ctx.user_text)],
            temperature: Some(self.config.reply_temperature),
            max_tokens: None,
        }
    }

    fn system_text(&self, ctx: &PromptContext<'_>) -> String {
        let mut sections: Vec<String> = Vec::new();

        if let Some(persona) = self.system_prompt.as_deref().map(str::trim)
            && !persona.is_empty()
        {
            sections.push(persona.to_string());
        }

        if !ctx.traits.is_empty() {
            sections.push(format!("# TRAITS\n{}", ctx.traits.join(", ")));
        }

        let relevant = filter_relevant_ltm(ctx.user_text, ctx.memories, self.ltm_limit);
        if !relevant.is_empty() {
            sections.push(format!("# MEMORY\n{}", format_ltm(&relevant)));
        }

        if !ctx.archival.is_empty() {
            sections.push(format!(
                "# ARCHIVAL\n{}",
                format_archival(ctx.archival, self.config.max_archival_chars)
            ));
        }

        if !ctx.human_blocks.is_empty() || !ctx.persona_blocks.is_empty() {
            let blocks = ctx.human_blocks.iter().chain(ctx.persona_blocks);
            sections.push(format!(
                "# CONTEXT\n{}",
                format_blocks(blocks, self.config.max_block_chars)
            ));
        }

        let start = ctx
            .history
            .len()
            .saturating_sub(self.config.max_stm_messages);
        sections.push(format!(
            "# CONVERSATION\n{}",
            self.labels.transcript(&ctx.history[start..])
        ));

        sections.join("\n\n").trim().to_string()
    }
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

/// Clean a raw model reply.
///
/// Trims, drops a leading `assistant:`, `<agent name>:`, `<assistant>` or
/// `assistant` line, and collapses runs of three or more newlines to two.
pub fn sanitize(raw: &str, agent_name: &str) -> String {
    let mut out = raw.trim();

    if let Some(rest) = strip_prefix_ignore_case(out, "assistant:") {
        out = rest.trim();
    }
    if !agent_name.is_empty()
        && let Some(rest) = strip_prefix_ignore_case(out, &format!("{agent_name}:"))
    {
        out = rest.trim();
    }
    if let Some(rest) = strip_prefix_ignore_case(out, "<assistant>")
        .or_else(|| strip_prefix_ignore_case(out, "assistant\n"))
    {
        out = rest.trim();
    }

    EXCESS_NEWLINES.replace_all(out, "\n\n").into_owned()
}
