// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Keyword relevance scoring.
//!
//! [`score`] is a recall fraction: the share of distinct query tokens found
//! in the content. [`recall_conversations`] is the corpus-weighted variant
//! used for searching past conversations, combining inverse document
//! frequency, a boost for significant words, and a small recency term.

use std::collections::{HashMap, HashSet};

use kindred_config::model::RecallConfig;

use crate::types::{Conversation, ConversationMessage, Scored};

/// Tokens that carry no meaning for matching.
pub const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "that", "with", "this", "have", "you", "but", "was", "are", "not", "from",
    "your", "about", "they", "them", "been", "what", "when", "there", "then", "were", "to", "of",
    "in", "on", "a", "an", "it", "is", "as", "at", "by", "or", "be", "if", "we",
];

/// Returned in place of results when a search found nothing.
pub const NO_MATCH_SENTINEL: &str =
    "[No strong memory match. If this matters, teach me or anchor it so I can carry it forward.]";

const RECENCY_WEIGHT: f64 = 0.20;
const SIGNIFICANCE_WEIGHT: f64 = 0.5;

/// Lowercase, keep `[a-z0-9']`, split on whitespace, drop short and stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '\'' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Share of distinct query tokens present in `content`, in `[0, 1]`.
///
/// Zero when the query has no tokens.
pub fn score(query: &str, content: &str) -> f64 {
    let query_tokens: HashSet<String> = tokenize(query).into_iter().collect();
    if query_tokens.is_empty() {
        return 0.0;
    }
    let content_tokens: HashSet<String> = tokenize(content).into_iter().collect();
    let hits = query_tokens
        .iter()
        .filter(|t| content_tokens.contains(*t))
        .count();
    hits as f64 / query_tokens.len() as f64
}

/// Score `items`, drop zero scores, and keep the best `limit`.
///
/// Equal scores keep their input order.
pub fn rank<T, F>(
    query: &str,
    items: impl IntoIterator<Item = T>,
    limit: usize,
    text: F,
) -> Vec<Scored<T>>
where
    F: Fn(&T) -> &str,
{
    let mut scored: Vec<Scored<T>> = items
        .into_iter()
        .filter_map(|item| {
            let s = score(query, text(&item));
            (s > 0.0).then_some(Scored { item, score: s })
        })
        .collect();
    sort_descending(&mut scored);
    scored.truncate(limit);
    scored
}

/// Stable sort by score, highest first.
pub(crate) fn sort_descending<T>(scored: &mut [Scored<T>]) {
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
}

/// Result of a conversation search.
#[derive(Debug, Clone, PartialEq)]
pub enum RecallOutcome {
    /// No search ran: the query had no usable tokens or there was nothing to search.
    NotSearched,
    /// The search ran and nothing qualified.
    NoMatch,
    /// Matching windows, best first, rendered as `From "<title>":\n<text>`.
    Matches(Vec<String>),
}

impl RecallOutcome {
    /// Lines to show a model: the matches, the sentinel, or nothing.
    pub fn into_lines(self) -> Vec<String> {
        match self {
            RecallOutcome::NotSearched => Vec::new(),
            RecallOutcome::NoMatch => vec![NO_MATCH_SENTINEL.to_string()],
            RecallOutcome::Matches(lines) => lines,
        }
    }
}

#[derive(Debug)]
struct WindowDoc {
    title: String,
    text: String,
    tokens: Vec<String>,
    recency: usize,
    significant: usize,
}

/// Cut messages into windows of `size`, stepping back from the end by `stride`.
///
/// A window whose texts equal the previous window's is skipped. Windows are
/// returned oldest first.
fn windows<'a>(
    messages: &[&'a ConversationMessage],
    size: usize,
    stride: usize,
) -> Vec<Vec<&'a ConversationMessage>> {
    let mut out: Vec<Vec<&ConversationMessage>> = Vec::new();
    if size == 0 || stride == 0 {
        return out;
    }

    let mut i = messages.len().saturating_sub(size) as isize;
    while i >= 0 {
        let start = i as usize;
        let end = messages.len().min(start + size);
        let slice: Vec<&ConversationMessage> = messages[start..end].to_vec();

        let duplicate = out.last().is_some_and(|last| {
            last.len() == slice.len() && last.iter().zip(&slice).all(|(a, b)| a.text == b.text)
        });
        if !duplicate {
            out.push(slice);
            if start == 0 {
                break;
            }
        }
        i -= stride as isize;
    }

    out.reverse();
    out
}

fn build_docs(
    conversations: &[Conversation],
    significant: &HashSet<String>,
    config: &RecallConfig,
) -> Vec<WindowDoc> {
    let recent = &conversations[conversations.len().saturating_sub(config.max_conversations)..];
    let mut docs = Vec::new();

    for convo in recent {
        let messages: Vec<&ConversationMessage> = convo
            .messages
            .iter()
            .filter(|m| !m.text.is_empty() && (m.role == "user" || m.role == "assistant"))
            .collect();
        let messages = &messages[messages.len().saturating_sub(config.max_conversation_messages)..];

        let title = if convo.title.is_empty() {
            "Untitled".to_string()
        } else {
            convo.title.clone()
        };

        for window in windows(messages, config.conversation_window, config.conversation_stride) {
            let text = window
                .iter()
                .map(|m| format!("{}: {}", m.role, m.text))
                .collect::<Vec<_>>()
                .join("\n");

            let mut seen = HashSet::new();
            let tokens: Vec<String> = tokenize(&text)
                .into_iter()
                .filter(|t| seen.insert(t.clone()))
                .collect();
            let significant_count = tokens.iter().filter(|t| significant.contains(*t)).count();

            docs.push(WindowDoc {
                title: title.clone(),
                text,
                tokens,
                recency: docs.len(),
                significant: significant_count,
            });
        }
    }

    docs
}

/// Normalize a significant-word list for [`recall_conversations`].
pub fn significant_set(words: &[String]) -> HashSet<String> {
    words.iter().map(|w| w.trim().to_lowercase()).collect()
}

/// Search past conversations for windows relevant to `query`.
///
/// `significant` words add `0.5 * ln(1 + count)` to any window containing
/// them. Windows qualify with at least one query token or one significant
/// word; the best `config.conversation_results` are returned.
pub fn recall_conversations(
    query: &str,
    conversations: &[Conversation],
    significant: &HashSet<String>,
    config: &RecallConfig,
) -> RecallOutcome {
    let docs = build_docs(conversations, significant, config);

    let mut seen = HashSet::new();
    let query_tokens: Vec<String> = tokenize(query)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect();

    if docs.is_empty() || query_tokens.is_empty() {
        return RecallOutcome::NotSearched;
    }

    let mut df: HashMap<&str, usize> = HashMap::new();
    for doc in &docs {
        for token in &doc.tokens {
            *df.entry(token.as_str()).or_default() += 1;
        }
    }
    let n = docs.len() as f64;
    let idf = |t: &str| (1.0 + n / df.get(t).copied().unwrap_or(1) as f64).ln();
    let max_recency = docs.iter().map(|d| d.recency).max().unwrap_or(0).max(1) as f64;

    let mut scored: Vec<Scored<&WindowDoc>> = Vec::new();
    for doc in &docs {
        let overlap: Vec<&String> = doc
            .tokens
            .iter()
            .filter(|t| query_tokens.contains(t))
            .collect();
        if overlap.is_empty() && doc.significant == 0 {
            continue;
        }

        let relevance: f64 = overlap.iter().map(|t| idf(t)).sum();
        let boost = if doc.significant > 0 {
            (1.0 + doc.significant as f64).ln() * SIGNIFICANCE_WEIGHT
        } else {
            0.0
        };
        let recency = doc.recency as f64 / max_recency;

        scored.push(Scored {
            item: doc,
            score: relevance + boost + recency * RECENCY_WEIGHT,
        });
    }

    sort_descending(&mut scored);
    scored.truncate(config.conversation_results);

    if scored.is_empty() {
        return RecallOutcome::NoMatch;
    }

    RecallOutcome::Matches(
        scored
            .into_iter()
            .map(|s| format!("From \"{}\":\n{}", s.item.title, s.item.text))
            .collect(),
    )
}
