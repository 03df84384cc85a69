// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Explicit "remember this" commands.
//!
//! A message such as `remember to ltm: loves rainy days | tags: weather, mood`
//! bypasses the model and is written straight into long-term memory.

use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use kindred_core::{DistilledMemory, KindredError, MemorySource};

use crate::ltm::LongTermMemory;

/// `type` assigned to manual memories that do not name one.
pub const MANUAL_KIND: &str = "manual";

static COMMAND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:save\s+to\s+ltm|ltm(?:\s*save)?|remember\s+to\s+ltm)\s*(?:[:\-]\s*|\s+)(.+)$",
    )
    .expect("valid regex")
});

static TYPE_SEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)type\s*[:=]").expect("valid regex"));

static TAGS_SEP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)tags\s*[:=]").expect("valid regex"));

/// A parsed manual memory request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualMemory {
    pub summary: String,
    pub kind: Option<String>,
    pub tags: Vec<String>,
}

impl ManualMemory {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }
}

/// Parse `<command> <summary> [| type: X] [| tags: a, b; c]`.
///
/// Returns `None` when `text` is not a command or the summary is empty.
pub fn parse_manual_memory_command(text: &str) -> Option<ManualMemory> {
    let payload = COMMAND_RE.captures(text)?.get(1)?.as_str().trim();

    let mut segments = payload.split('|').map(str::trim);
    let summary = segments.next().filter(|s| !s.is_empty())?;

    let mut memory = ManualMemory::new(summary);
    for segment in segments {
        let lower = segment.to_lowercase();

        if lower.starts_with("type") {
            if let Some(rest) = after_separator(&TYPE_SEP_RE, segment) {
                memory.kind = Some(rest.to_string());
            }
        }

        if lower.starts_with("tags") {
            if let Some(rest) = after_separator(&TAGS_SEP_RE, segment) {
                memory.tags = rest
                    .split([',', ';'])
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
            }
        }
    }

    Some(memory)
}

// Text between the first and second separator match, if non-blank.
fn after_separator<'a>(separator: &Regex, segment: &'a str) -> Option<&'a str> {
    separator
        .splitn(segment, 3)
        .nth(1)
        .map(str::trim)
        .filter(|rest| !rest.is_empty())
}

/// Acknowledgement sent back after a manual memory was stored.
pub fn format_ack(entry: &DistilledMemory) -> String {
    let mut ack = format!("Locked to LTM: {}", entry.summary);
    if let Some(kind) = &entry.kind {
        ack.push_str(&format!(" (type: {kind})"));
    }
    if !entry.tags.is_empty() {
        ack.push_str(&format!(" [tags: {}]", entry.tags.join(", ")));
    }
    ack
}

impl LongTermMemory {
    /// Store a manual memory for `user_id` and return the stored entry.
    ///
    /// The summary must not be blank. The type defaults to `manual`.
    pub async fn add_manual_memory(
        &self,
        user_id: &str,
        input: ManualMemory,
    ) -> Result<DistilledMemory, KindredError> {
        let summary = input.summary.trim();
        if summary.is_empty() {
            return Err(KindredError::InvalidInput(
                "manual memory requires a summary".into(),
            ));
        }

        let kind = input
            .kind
            .map(|k| k.trim().to_string())
            .unwrap_or_else(|| MANUAL_KIND.to_string());
        let tags = input
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let entry = DistilledMemory::new(summary, Some(kind), MemorySource::Manual).with_tags(tags);

        let merged = self.save(user_id, std::slice::from_ref(&entry)).await;
        info!(user_id, count = merged.len(), "manual memory saved");
        Ok(entry)
    }
}
