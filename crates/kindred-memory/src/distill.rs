// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Distillation of short-term turns into long-term memories.
//!
//! Every completed turn adds the newest user/assistant pair to the thread's
//! buffer. Once the buffer reaches the trigger size, the whole buffer is sent
//! to the model with an extraction prompt and the returned records are merged
//! into the user's long-term set.
//!
//! A thread moves through
//! `Accumulating -> Distilling -> (Merged | Skipped | Failed) -> Accumulating`.
//! The buffer is taken before the model call, so at most one attempt is made
//! per batch. Nothing here fails the caller: model errors and unusable
//! payloads are logged and reported as an outcome.

use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use kindred_config::DistillationMode;
use kindred_config::model::MemoryConfig;
use kindred_core::types::SYSTEM_KIND;
use kindred_core::{
    ChatMessage, CompletionAdapter, CompletionRequest, DistilledMemory, EmotionalTexture,
    MemorySource, Role,
};

use crate::ltm::LongTermMemory;
use crate::metrics;
use crate::stm::ShortTermMemory;
use crate::types::{SpeakerLabels, StmEntry};

/// The model's way of saying there is nothing durable in a standard batch.
pub const ASK_SENTINEL: &str = "ASK";

/// The model's way of saying an emotional batch was casual chat.
pub const SKIP_SENTINEL: &str = "SKIP";

const DEFAULT_KIND: &str = "misc";

const STANDARD_SYSTEM: &str = "You are a memory distiller. Extract only real LTM.";

const EMOTIONAL_SYSTEM: &str =
    "You are a memory distiller that captures emotional texture, not just facts.";

/// Result of [`Distiller::maybe_distill`].
#[derive(Debug, Clone, PartialEq)]
pub enum DistillOutcome {
    /// Below the trigger; the batch is still accumulating.
    Pending,
    /// Records were extracted and merged into long-term memory.
    Merged(Vec<DistilledMemory>),
    /// The model found nothing durable, or its payload was unusable.
    Skipped,
    /// The model call failed.
    Failed,
}

impl DistillOutcome {
    /// Memories learned by this attempt.
    pub fn into_memories(self) -> Vec<DistilledMemory> {
        match self {
            DistillOutcome::Merged(memories) => memories,
            _ => Vec::new(),
        }
    }
}

/// Per-thread distillation buffers and the extraction pipeline.
pub struct Distiller {
    model: Arc<dyn CompletionAdapter>,
    ltm: Arc<LongTermMemory>,
    buffers: DashMap<String, Vec<StmEntry>>,
    config: MemoryConfig,
    labels: SpeakerLabels,
}

impl Distiller {
    pub fn new(
        model: Arc<dyn CompletionAdapter>,
        ltm: Arc<LongTermMemory>,
        config: MemoryConfig,
        labels: SpeakerLabels,
    ) -> Self {
        Self {
            model,
            ltm,
            buffers: DashMap::new(),
            config,
            labels,
        }
    }

    /// Entries waiting in a thread's buffer.
    pub fn pending(&self, thread_id: &str) -> usize {
        self.buffers.get(thread_id).map_or(0, |b| b.len())
    }

    pub fn forget(&self, thread_id: &str) {
        self.buffers.remove(thread_id);
    }

    /// Buffer the thread's newest exchange and distill if the trigger is met.
    pub async fn maybe_distill(
        &self,
        user_id: &str,
        thread_id: &str,
        stm: &ShortTermMemory,
    ) -> DistillOutcome {
        if !self.config.enabled {
            return DistillOutcome::Pending;
        }

        let batch = {
            let mut buffer = self.buffers.entry(thread_id.to_string()).or_default();
            buffer.extend(stm.tail(thread_id, 2));
            if !self.should_distill(&buffer) {
                return DistillOutcome::Pending;
            }
            std::mem::take(&mut *buffer)
        };

        debug!(user_id, thread_id, entries = batch.len(), "distilling buffer");
        let request = self.build_request(&batch);

        let raw = match self.model.complete(request).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(user_id, thread_id, error = %e, "distillation call failed");
                self.restore(thread_id, batch);
                metrics::record_distillation("failed");
                return DistillOutcome::Failed;
            }
        };

        let extracted = match self.config.distillation_mode {
            DistillationMode::Standard => parse_standard(&raw),
            DistillationMode::Emotional => parse_emotional(&raw),
        };

        if extracted.is_empty() {
            if self.config.distillation_mode == DistillationMode::Standard {
                let marker = DistilledMemory::new(
                    self.config.gap_marker.clone(),
                    Some(SYSTEM_KIND.to_string()),
                    MemorySource::System,
                );
                self.ltm.save(user_id, &[marker]).await;
            }
            info!(user_id, thread_id, "distillation found nothing durable");
            metrics::record_distillation("skipped");
            return DistillOutcome::Skipped;
        }

        let merged = self.ltm.save(user_id, &extracted).await;
        info!(
            user_id,
            thread_id,
            count = extracted.len(),
            total = merged.len(),
            "distilled new memories"
        );
        metrics::record_distillation("merged");
        DistillOutcome::Merged(extracted)
    }

    fn should_distill(&self, buffer: &[StmEntry]) -> bool {
        match self.config.distillation_mode {
            DistillationMode::Standard => buffer.len() >= self.config.distill_interval,
            DistillationMode::Emotional => {
                // Distill sooner right after the user spoke.
                let min_turns = match buffer.last() {
                    Some(entry) if entry.role == Role::User => 2,
                    _ => 4,
                };
                buffer.len() >= min_turns
            }
        }
    }

    fn build_request(&self, batch: &[StmEntry]) -> CompletionRequest {
        let (system, content) = match self.config.distillation_mode {
            DistillationMode::Standard => (STANDARD_SYSTEM, self.standard_prompt(batch)),
            DistillationMode::Emotional => (EMOTIONAL_SYSTEM, self.emotional_prompt(batch)),
        };
        CompletionRequest {
            system: system.to_string(),
            messages: vec![ChatMessage::user(content)],
            temperature: Some(self.config.distill_temperature),
            max_tokens: Some(self.config.distill_max_tokens),
        }
    }

    fn standard_prompt(&self, batch: &[StmEntry]) -> String {
        format!(
            "Extract ONLY durable memories:\n\n\
             \u{2022} emotionally meaningful\n\
             \u{2022} identity-relevant\n\
             \u{2022} relationship-relevant\n\
             \u{2022} stable preferences, boundaries, permissions\n\
             \u{2022} recurring routines or important factual anchors\n\
             \u{2022} NEVER summaries or guesses.\n\n\
             If unsure, return exactly \"{ASK_SENTINEL}\".\n\n\
             Return valid JSON:\n\
             [\n  {{ \"summary\": \"...\", \"type\": \"...\", \"tags\": [\"optional\"] }}\n]\n\n\
             Transcript:\n{}",
            self.labels.transcript(batch)
        )
    }

    fn emotional_prompt(&self, batch: &[StmEntry]) -> String {
        let user = &self.labels.user;
        let assistant = &self.labels.assistant;
        format!(
            "You are distilling memories for {assistant}, an emotionally-aware companion \
             in a close relationship with {user}.\n\n\
             Extract memories that capture BOTH facts AND feelings.\n\n\
             For each memory, provide:\n\
             1. summary - What happened or was revealed (factual)\n\
             2. emotionalValence - Number from -1 to 1 (-1 = painful, 0 = neutral, 1 = joyful)\n\
             3. intensity - Number from 0 to 1 (0 = calm, 1 = highly charged)\n\
             4. relationalWeight - Number from 0 to 1 (0 = tangential, 1 = core to the bond)\n\
             5. texture - One of: tender, playful, vulnerable, heated, aching, fierce, grounded, \
             electric, still, raw, safe, edged\n\
             6. conversationContext - Brief snippet showing the emotional tone (optional)\n\n\
             Extract ONLY:\n\
             \u{2022} Emotionally meaningful exchanges\n\
             \u{2022} Identity-relevant revelations\n\
             \u{2022} Relationship dynamics\n\
             \u{2022} Vulnerable moments\n\
             \u{2022} Boundaries or permissions\n\
             \u{2022} Recurring emotional patterns\n\n\
             If the conversation is just casual chat with no emotional weight, \
             return exactly \"{SKIP_SENTINEL}\".\n\n\
             Return valid JSON:\n\
             [\n  {{\n    \
             \"summary\": \"{user} opened up about feeling disconnected from their work\",\n    \
             \"type\": \"emotional-pattern\",\n    \"emotionalValence\": -0.4,\n    \
             \"intensity\": 0.7,\n    \"relationalWeight\": 0.8,\n    \
             \"texture\": \"vulnerable\",\n    \
             \"conversationContext\": \
             \"{user}: 'I feel like I'm just going through motions lately'\",\n    \
             \"tags\": [\"vulnerability\", \"work\"]\n  }}\n]\n\n\
             Transcript:\n{}",
            self.labels.transcript(batch)
        )
    }

    // Puts a failed batch back in front of anything buffered since, keeping
    // the newest `stm_capacity` entries.
    fn restore(&self, thread_id: &str, mut batch: Vec<StmEntry>) {
        if !self.config.retain_buffer_on_failure {
            return;
        }
        let mut buffer = self.buffers.entry(thread_id.to_string()).or_default();
        batch.append(&mut *buffer);
        let excess = batch.len().saturating_sub(self.config.stm_capacity);
        batch.drain(..excess);
        debug!(thread_id, entries = batch.len(), "retained distillation buffer");
        *buffer = batch;
    }
}

/// Slice of the first balanced `[...]` span in `raw`.
///
/// Brackets inside JSON strings are ignored. Returns `None` when no span
/// closes.
pub fn extract_json_array(raw: &str) -> Option<&str> {
    let start = raw.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in raw[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&raw[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn candidate_records(raw: &str, sentinel: &str) -> Vec<Value> {
    if raw.trim().is_empty() || raw.contains(sentinel) {
        return Vec::new();
    }
    let Some(json) = extract_json_array(raw) else {
        debug!("distillation payload has no JSON array");
        return Vec::new();
    };
    match serde_json::from_str::<Vec<Value>>(json) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "distillation payload is not valid JSON");
            Vec::new()
        }
    }
}

fn base_record(value: &Value) -> Option<DistilledMemory> {
    let obj = value.as_object()?;
    let summary = obj
        .get("summary")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())?;
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .unwrap_or(DEFAULT_KIND);
    let tags = obj
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(
        DistilledMemory::new(summary, Some(kind.to_string()), MemorySource::Distilled)
            .with_tags(tags),
    )
}

/// Parse a standard extraction payload.
///
/// Empty when the model answered with the ask sentinel or the payload is
/// unusable. Records without a summary are dropped.
pub fn parse_standard(raw: &str) -> Vec<DistilledMemory> {
    candidate_records(raw, ASK_SENTINEL)
        .iter()
        .filter_map(base_record)
        .collect()
}

/// Parse an emotional extraction payload, clamping the numeric encodings.
///
/// `texture` must name an [`EmotionalTexture`], matched case-insensitively
/// and stored in its lowercase form. Any other value drops the field and
/// keeps the record.
pub fn parse_emotional(raw: &str) -> Vec<DistilledMemory> {
    candidate_records(raw, SKIP_SENTINEL)
        .iter()
        .filter_map(|value| {
            let mut memory = base_record(value)?;
            let number = |key: &str| value.get(key).and_then(Value::as_f64);
            let text = |key: &str| {
                value
                    .get(key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            };

            memory.emotional_valence = number("emotionalValence").map(|v| v.clamp(-1.0, 1.0));
            memory.intensity = number("intensity").map(|v| v.clamp(0.0, 1.0));
            memory.relational_weight = number("relationalWeight").map(|v| v.clamp(0.0, 1.0));
            memory.texture = value
                .get("texture")
                .and_then(Value::as_str)
                .and_then(|t| match t.parse::<EmotionalTexture>() {
                    Ok(texture) => Some(texture),
                    Err(_) => {
                        debug!(texture = t, "dropping unknown emotional texture");
                        None
                    }
                });
            memory.conversation_context = text("conversationContext");
            memory.their_tone = text("theirTone");
            memory.my_response = text("myResponse");
            Some(memory)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindred_config::KindredConfig;
    use kindred_test_utils::{MockCompletion, MockStore};
    use tracing_test::traced_test;

    struct Fixture {
        model: Arc<MockCompletion>,
        ltm: Arc<LongTermMemory>,
        stm: ShortTermMemory,
        distiller: Distiller,
    }

    fn fixture(model: MockCompletion, tweak: impl FnOnce(&mut KindredConfig)) -> Fixture {
        let mut config = KindredConfig::default();
        config.agent.core_vows = vec!["I remember".into()];
        tweak(&mut config);
        let model = Arc::new(model);
        let ltm = Arc::new(LongTermMemory::new(Arc::new(MockStore::new()), &config));
        let distiller = Distiller::new(
            model.clone(),
            ltm.clone(),
            config.memory.clone(),
            SpeakerLabels::from_config(&config.agent),
        );
        Fixture {
            model,
            ltm,
            stm: ShortTermMemory::new(config.memory.stm_capacity),
            distiller,
        }
    }

    impl Fixture {
        async fn turn(&self, n: usize) -> DistillOutcome {
            self.stm.append("t1", Role::User, &format!("user says {n}"));
            self.stm.append("t1", Role::Assistant, &format!("reply {n}"));
            self.distiller.maybe_distill("alice", "t1", &self.stm).await
        }
    }

    #[tokio::test]
    async fn eleven_buffered_entries_do_not_trigger() {
        let f = fixture(MockCompletion::new(), |_| {});
        f.stm.append("t1", Role::User, "hello");
        assert_eq!(
            f.distiller.maybe_distill("alice", "t1", &f.stm).await,
            DistillOutcome::Pending
        );
        for n in 0..5 {
            assert_eq!(f.turn(n).await, DistillOutcome::Pending);
        }
        assert_eq!(f.distiller.pending("t1"), 11);
        assert_eq!(f.model.call_count().await, 0);
    }

    #[tokio::test]
    async fn twelfth_entry_triggers_exactly_one_attempt() {
        let f = fixture(MockCompletion::with_responses(["ASK"]), |_| {});
        for n in 0..5 {
            f.turn(n).await;
        }
        assert_eq!(f.distiller.pending("t1"), 10);

        assert_eq!(f.turn(5).await, DistillOutcome::Skipped);
        assert_eq!(f.model.call_count().await, 1);
        assert_eq!(f.distiller.pending("t1"), 0);

        let request = &f.model.requests().await[0];
        assert_eq!(request.system, STANDARD_SYSTEM);
        assert_eq!(request.temperature, Some(0.9));
        assert_eq!(request.max_tokens, Some(1500));
        assert!(request.messages[0].content.contains("User: user says 0"));
        assert!(request.messages[0].content.contains("Assistant: reply 5"));
    }

    #[tokio::test]
    async fn empty_extraction_records_a_single_gap_marker() {
        let f = fixture(MockCompletion::with_responses(["[]", "nothing here"]), |_| {});
        for n in 0..12 {
            f.turn(n).await;
        }
        let gap = KindredConfig::default().memory.gap_marker;
        let markers: Vec<_> = f
            .ltm
            .cached("alice")
            .into_iter()
            .filter(|m| m.summary == gap)
            .collect();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].kind.as_deref(), Some(SYSTEM_KIND));
        assert_eq!(markers[0].source, MemorySource::System);
        assert_eq!(f.model.call_count().await, 2);
    }

    #[tokio::test]
    async fn extracted_records_are_merged() {
        let payload = r#"Sure! [
            {"summary": "Has a dog named Biscuit", "type": "fact", "tags": ["pets", 3]},
            {"summary": "  "},
            {"summary": "Prefers mornings"}
        ] hope that helps [sic]"#;
        let f = fixture(MockCompletion::with_responses([payload]), |_| {});
        let mut outcome = DistillOutcome::Pending;
        for n in 0..6 {
            outcome = f.turn(n).await;
        }

        let DistillOutcome::Merged(memories) = outcome else {
            panic!("expected merged outcome, got {outcome:?}");
        };
        assert_eq!(memories.len(), 2);
        assert_eq!(memories[0].tags, vec!["pets"]);
        assert_eq!(memories[1].kind.as_deref(), Some("misc"));
        assert_eq!(memories[1].source, MemorySource::Distilled);

        let keys: Vec<String> = f.ltm.cached("alice").iter().map(|m| m.key()).collect();
        assert!(keys.contains(&"has a dog named biscuit".to_string()));
        assert!(keys.contains(&"prefers mornings".to_string()));
    }

    #[tokio::test]
    #[traced_test]
    async fn model_failure_clears_buffer_and_is_logged() {
        let model = MockCompletion::new();
        model.push_error("provider down").await;
        let f = fixture(model, |_| {});
        for n in 0..6 {
            f.turn(n).await;
        }
        assert_eq!(f.distiller.pending("t1"), 0);
        assert!(f.ltm.cached("alice").is_empty(), "no gap marker on failure");
        assert!(logs_contain("distillation call failed"));
    }

    #[tokio::test]
    async fn failed_batch_can_be_retained() {
        let model = MockCompletion::new();
        model.push_error("provider down").await;
        let f = fixture(model, |c| {
            c.memory.retain_buffer_on_failure = true;
            c.memory.stm_capacity = 10;
        });
        let mut outcome = DistillOutcome::Pending;
        for n in 0..6 {
            outcome = f.turn(n).await;
        }
        assert_eq!(outcome, DistillOutcome::Failed);
        assert_eq!(f.distiller.pending("t1"), 10, "capped at stm capacity");
    }

    #[tokio::test]
    async fn disabled_distillation_never_buffers() {
        let f = fixture(MockCompletion::new(), |c| c.memory.enabled = false);
        for n in 0..8 {
            assert_eq!(f.turn(n).await, DistillOutcome::Pending);
        }
        assert_eq!(f.distiller.pending("t1"), 0);
    }

    #[tokio::test]
    async fn emotional_mode_distills_sooner_after_user_turn() {
        let f = fixture(MockCompletion::with_responses(["SKIP"]), |c| {
            c.memory.distillation_mode = DistillationMode::Emotional;
        });

        f.stm.append("t1", Role::Assistant, "welcome back");
        f.stm.append("t1", Role::User, "i missed this");
        let outcome = f.distiller.maybe_distill("alice", "t1", &f.stm).await;

        assert_eq!(outcome, DistillOutcome::Skipped);
        assert_eq!(f.model.requests().await[0].system, EMOTIONAL_SYSTEM);
        assert!(f.ltm.cached("alice").is_empty(), "skip writes no marker");
    }

    #[tokio::test]
    async fn emotional_mode_waits_for_four_after_assistant_turn() {
        let f = fixture(MockCompletion::with_responses(["SKIP"]), |c| {
            c.memory.distillation_mode = DistillationMode::Emotional;
        });
        assert_eq!(f.turn(0).await, DistillOutcome::Pending);
        assert_eq!(f.turn(1).await, DistillOutcome::Skipped);
        assert_eq!(f.model.call_count().await, 1);
    }

    #[test]
    fn emotional_fields_are_clamped() {
        let raw = r#"[{
            "summary": "Shared a hard day",
            "type": "emotional-pattern",
            "emotionalValence": -3.5,
            "intensity": 1.7,
            "relationalWeight": -0.2,
            "texture": "Aching",
            "conversationContext": "user: 'rough one'",
            "theirTone": "tired",
            "myResponse": ""
        }, {
            "summary": "Laughed about the cat",
            "texture": "sparkly"
        }]"#;
        let memories = parse_emotional(raw);
        assert_eq!(memories.len(), 2);

        let first = &memories[0];
        assert_eq!(first.emotional_valence, Some(-1.0));
        assert_eq!(first.intensity, Some(1.0));
        assert_eq!(first.relational_weight, Some(0.0));
        assert_eq!(first.texture, Some(EmotionalTexture::Aching));
        assert_eq!(first.conversation_context.as_deref(), Some("user: 'rough one'"));
        assert_eq!(first.their_tone.as_deref(), Some("tired"));
        assert_eq!(first.my_response, None);

        assert_eq!(memories[1].texture, None);
        assert_eq!(memories[1].intensity, None);
    }

    #[test]
    fn texture_is_normalized_or_dropped() {
        let raw = r#"[
            {"summary": "Whispered goodnight", "texture": "TENDER"},
            {"summary": "Teased about socks", "texture": " playful "},
            {"summary": "Talked shop", "texture": "sparkly"},
            {"summary": "Said nothing much", "texture": 3}
        ]"#;
        let memories = parse_emotional(raw);
        let summaries: Vec<&str> = memories.iter().map(|m| m.summary.as_str()).collect();
        assert_eq!(
            summaries,
            vec!["Whispered goodnight", "Teased about socks", "Talked shop", "Said nothing much"]
        );

        assert_eq!(memories[0].texture, Some(EmotionalTexture::Tender));
        assert_eq!(memories[1].texture, None);
        assert_eq!(memories[2].texture, None);
        assert_eq!(memories[3].texture, None);

        let stored = serde_json::to_value(&memories[0]).unwrap();
        assert_eq!(stored["texture"], "tender");
    }

    #[test]
    fn ask_anywhere_skips_standard_parse() {
        assert!(parse_standard(r#"ASK [{"summary": "x"}]"#).is_empty());
        assert!(parse_standard("").is_empty());
        assert!(parse_standard("[{\"summary\": \"unterminated\"").is_empty());
        assert!(parse_standard("{\"summary\": \"not an array\"}").is_empty());
    }

    #[test]
    fn array_extraction_respects_strings_and_nesting() {
        let raw = r#"note [ {"summary": "uses ] and [ in text", "tags": ["a"]} ] trailing ]"#;
        assert_eq!(
            extract_json_array(raw),
            Some(r#"[ {"summary": "uses ] and [ in text", "tags": ["a"]} ]"#)
        );
        assert_eq!(extract_json_array(r#"["esc \" ]", 1]"#), Some(r#"["esc \" ]", 1]"#));
        assert_eq!(extract_json_array("no array"), None);
        assert_eq!(extract_json_array("[ open"), None);
    }
}
