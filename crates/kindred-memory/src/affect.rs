// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-thread affect state.
//!
//! The tracker keeps a small emotional and engagement model for every thread.
//! It is updated once per completed turn and read by pacing helpers such as
//! [`AffectState::typing_delay`]. Keyword detection is delegated to
//! [`TextClassifier`] implementations so vocabularies can be swapped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use regex::Regex;

/// Characters of the user text kept as the thread topic.
const TOPIC_CHARS: usize = 200;

const BASE_DELAY_MS_PER_CHAR: f64 = 18.0;
const MIN_TYPING_DELAY_MS: f64 = 1_000.0;
const MAX_TYPING_DELAY_MS: f64 = 8_000.0;

/// Decides whether a piece of text belongs to a category.
pub trait TextClassifier: Send + Sync {
    fn matches(&self, text: &str) -> bool;
}

impl<F> TextClassifier for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn matches(&self, text: &str) -> bool {
        self(text)
    }
}

/// Case-insensitive whole-word match against a fixed vocabulary.
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    pattern: Option<Regex>,
}

impl KeywordClassifier {
    /// Build a classifier from a word list. Words are matched literally.
    ///
    /// An empty list yields a classifier that never matches.
    pub fn new<I, S>(words: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives: Vec<String> = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_string())
            .filter(|w| !w.is_empty())
            .map(|w| regex::escape(&w))
            .collect();

        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }

        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }
}

impl TextClassifier for KeywordClassifier {
    fn matches(&self, text: &str) -> bool {
        self.pattern.as_ref().is_some_and(|p| p.is_match(text))
    }
}

/// Emotional and engagement scalars for one thread.
///
/// Every scalar stays within `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AffectState {
    pub emotional_weight: f64,
    pub energy: f64,
    /// The last reply trailed off with an ellipsis.
    pub mid_thought: bool,
    pub topic: String,
    pub investment: f64,
    pub attunement: f64,
    /// `None` until the first update.
    pub last_update: Option<DateTime<Utc>>,
}

impl Default for AffectState {
    fn default() -> Self {
        Self {
            emotional_weight: 0.0,
            energy: 0.3,
            mid_thought: false,
            topic: String::new(),
            investment: 0.6,
            attunement: 0.9,
            last_update: None,
        }
    }
}

impl AffectState {
    /// How long a reply of `chars` characters should appear to take to type.
    ///
    /// High energy speeds typing up; emotional weight and strong attunement
    /// slow it down. Always between one and eight seconds.
    pub fn typing_delay(&self, chars: usize) -> Duration {
        let mut ms = chars as f64 * BASE_DELAY_MS_PER_CHAR;
        if self.energy > 0.6 {
            ms *= 0.75;
        }
        if self.emotional_weight > 0.6 {
            ms *= 1.4;
        }
        if self.attunement > 0.8 {
            ms *= 1.2;
        }
        Duration::from_millis(ms.clamp(MIN_TYPING_DELAY_MS, MAX_TYPING_DELAY_MS).round() as u64)
    }
}

/// Registry of affect states keyed by thread id.
pub struct AffectTracker {
    states: DashMap<String, AffectState>,
    emotional: Arc<dyn TextClassifier>,
    intimacy: Arc<dyn TextClassifier>,
}

impl AffectTracker {
    pub fn new(emotional: Arc<dyn TextClassifier>, intimacy: Arc<dyn TextClassifier>) -> Self {
        Self {
            states: DashMap::new(),
            emotional,
            intimacy,
        }
    }

    /// Current state for a thread, created with defaults on first access.
    pub fn get(&self, thread_id: &str) -> AffectState {
        self.states
            .entry(thread_id.to_string())
            .or_default()
            .clone()
    }

    /// Apply one completed turn to the thread's state and return the result.
    pub fn update(&self, thread_id: &str, user_text: &str, reply_text: &str) -> AffectState {
        let text = user_text.to_lowercase();
        let reply = reply_text.trim();

        let mut state = self.states.entry(thread_id.to_string()).or_default();
        state.mid_thought = reply.ends_with('…') || reply.ends_with("...");
        state.emotional_weight = if self.emotional.matches(&text) { 1.0 } else { 0.2 };
        state.attunement = if self.intimacy.matches(&text) { 1.0 } else { 0.7 };
        state.investment = (state.attunement * 0.5
            + state.emotional_weight * 0.3
            + state.energy * 0.2)
            .clamp(0.0, 1.0);
        state.topic = text.chars().take(TOPIC_CHARS).collect();
        state.last_update = Some(Utc::now());
        state.clone()
    }

    /// Drop a thread's state.
    pub fn forget(&self, thread_id: &str) {
        self.states.remove(thread_id);
    }

    pub fn thread_count(&self) -> usize {
        self.states.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> AffectTracker {
        AffectTracker::new(
            Arc::new(KeywordClassifier::new(["sad", "love"]).unwrap()),
            Arc::new(KeywordClassifier::new(["together"]).unwrap()),
        )
    }

    #[test]
    fn first_read_creates_defaults() {
        let t = tracker();
        let state = t.get("thread");
        assert_eq!(state, AffectState::default());
        assert_eq!(state.energy, 0.3);
        assert_eq!(t.thread_count(), 1);
    }

    #[test]
    fn emotional_text_sets_exact_weights() {
        let t = tracker();
        let state = t.update("thread", "I feel SAD today", "I'm here.");
        assert_eq!(state.emotional_weight, 1.0);
        assert_eq!(state.attunement, 0.7);
        assert!((state.investment - (0.35 + 0.3 + 0.06)).abs() < 1e-9);
        assert_eq!(state.topic, "i feel sad today");
        assert!(state.last_update.is_some());

        let calm = t.update("thread", "what's for dinner", "pasta");
        assert_eq!(calm.emotional_weight, 0.2);
    }

    #[test]
    fn keywords_match_whole_words_only() {
        let t = tracker();
        assert_eq!(t.update("a", "sadness", "ok").emotional_weight, 0.2);
        assert_eq!(t.update("a", "we are together", "ok").attunement, 1.0);
    }

    #[test]
    fn ellipsis_marks_mid_thought() {
        let t = tracker();
        assert!(t.update("a", "hi", "well...  ").mid_thought);
        assert!(t.update("a", "hi", "hmm…").mid_thought);
        assert!(!t.update("a", "hi", "done.").mid_thought);
    }

    #[test]
    fn threads_are_isolated() {
        let t = tracker();
        t.update("a", "love you", "same");
        assert_eq!(t.get("b").emotional_weight, 0.0);
        t.forget("a");
        assert_eq!(t.get("a"), AffectState::default());
    }

    #[test]
    fn topic_is_capped() {
        let t = tracker();
        let long = "x".repeat(500);
        assert_eq!(t.update("a", &long, "ok").topic.len(), TOPIC_CHARS);
    }

    #[test]
    fn closures_are_classifiers() {
        let t = AffectTracker::new(
            Arc::new(|text: &str| text.contains('!')),
            Arc::new(|_: &str| false),
        );
        assert_eq!(t.update("a", "wow!", "ok").emotional_weight, 1.0);
    }

    #[test]
    fn empty_vocabulary_never_matches() {
        let c = KeywordClassifier::new(Vec::<String>::new()).unwrap();
        assert!(!c.matches("anything at all"));
    }

    #[test]
    fn typing_delay_is_clamped() {
        let state = AffectState::default();
        assert_eq!(state.typing_delay(1), Duration::from_millis(1_000));
        assert_eq!(state.typing_delay(10_000), Duration::from_millis(8_000));
        // 100 chars * 18ms * 1.2 (attunement 0.9)
        assert_eq!(state.typing_delay(100), Duration::from_millis(2_160));

        let excited = AffectState {
            energy: 0.9,
            emotional_weight: 1.0,
            attunement: 0.7,
            ..AffectState::default()
        };
        // 100 * 18 * 0.75 * 1.4
        assert_eq!(excited.typing_delay(100), Duration::from_millis(1_890));
    }
}
