// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn processing.
//!
//! [`MemoryEngine`] owns every per-thread registry (short-term memory, affect,
//! distillation buffers) and runs one turn at a time per thread:
//!
//! 1. load the user's long-term memories and traits
//! 2. snapshot the thread history, then append the user turn
//! 3. handle a manual memory command, or
//! 4. recall archival records and context blocks, build the prompt, call the
//!    model, and clean the reply
//! 5. update affect, append the reply, and maybe distill
//!
//! Turns on different threads run concurrently. Turns on the same thread are
//! serialized by a per-thread async mutex held for the whole turn, including
//! its distillation.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use kindred_config::KindredConfig;
use kindred_config::model::RecallConfig;
use kindred_core::{
    BlockStore, CompletionAdapter, DistilledMemory, KindredError, MemoryRowStore, Role,
};

use crate::affect::{AffectState, AffectTracker, KeywordClassifier, TextClassifier};
use crate::blocks::BlockMemory;
use crate::distill::Distiller;
use crate::ltm::LongTermMemory;
use crate::manual::{ManualMemory, format_ack, parse_manual_memory_command};
use crate::metrics;
use crate::prompt::{PromptBuilder, PromptContext, sanitize};
use crate::relevance::{self, RecallOutcome};
use crate::stm::ShortTermMemory;
use crate::types::{Conversation, SpeakerLabels, StmEntry, TurnReply, TurnRequest};

pub struct MemoryEngine {
    agent_name: String,
    recall: RecallConfig,
    fallback_reply: String,
    manual_failure_reply: String,
    model: Arc<dyn CompletionAdapter>,
    stm: ShortTermMemory,
    ltm: Arc<LongTermMemory>,
    blocks: BlockMemory,
    distiller: Distiller,
    affect: AffectTracker,
    prompt: PromptBuilder,
    significant: HashSet<String>,
    thread_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MemoryEngine {
    /// Build an engine with keyword classifiers from `config.affect`.
    pub fn new(
        config: &KindredConfig,
        model: Arc<dyn CompletionAdapter>,
        rows: Arc<dyn MemoryRowStore>,
        blocks: Arc<dyn BlockStore>,
    ) -> Result<Self, KindredError> {
        let emotional = KeywordClassifier::new(&config.affect.emotional_keywords)
            .map_err(|e| KindredError::Config(format!("affect.emotional_keywords: {e}")))?;
        let intimacy = KeywordClassifier::new(&config.affect.intimacy_keywords)
            .map_err(|e| KindredError::Config(format!("affect.intimacy_keywords: {e}")))?;

        Ok(Self::with_classifiers(
            config,
            model,
            rows,
            blocks,
            Arc::new(emotional),
            Arc::new(intimacy),
        ))
    }

    /// Build an engine with caller-supplied affect classifiers.
    pub fn with_classifiers(
        config: &KindredConfig,
        model: Arc<dyn CompletionAdapter>,
        rows: Arc<dyn MemoryRowStore>,
        blocks: Arc<dyn BlockStore>,
        emotional: Arc<dyn TextClassifier>,
        intimacy: Arc<dyn TextClassifier>,
    ) -> Self {
        let ltm = Arc::new(LongTermMemory::new(rows, config));
        let distiller = Distiller::new(
            model.clone(),
            ltm.clone(),
            config.memory.clone(),
            SpeakerLabels::from_config(&config.agent),
        );

        Self {
            agent_name: config.agent.name.clone(),
            recall: config.recall.clone(),
            fallback_reply: config.prompt.fallback_reply.clone(),
            manual_failure_reply: config.prompt.manual_failure_reply.clone(),
            model,
            stm: ShortTermMemory::new(config.memory.stm_capacity),
            ltm,
            blocks: BlockMemory::new(blocks, config.recall.scan_chunk_size),
            distiller,
            affect: AffectTracker::new(emotional, intimacy),
            prompt: PromptBuilder::new(config),
            significant: relevance::significant_set(&config.affect.significant_words),
            thread_locks: DashMap::new(),
        }
    }

    /// Preload the context blocks.
    pub async fn warm_up(&self) {
        self.blocks.warm_up().await;
    }

    /// Process one incoming message and produce the reply.
    ///
    /// Only blank text is an error. Model failures produce the configured
    /// fallback reply.
    pub async fn process_turn(&self, request: TurnRequest) -> Result<TurnReply, KindredError> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(KindredError::InvalidInput("message text is empty".into()));
        }
        let user_id = request.user_id.as_str();
        let thread_id = request.thread_id.as_str();

        let lock = self.thread_lock(thread_id);
        let _turn = lock.lock().await;

        info!(
            user_id,
            thread_id,
            author = request.author_name.as_deref().unwrap_or("unknown"),
            "message received"
        );

        let memories = self.ltm.load(user_id).await;
        let traits = self.ltm.load_traits(user_id).await;

        let history = self.stm.read(thread_id);
        self.stm.append(thread_id, Role::User, text);

        if let Some(manual) = parse_manual_memory_command(text) {
            return Ok(self.remember(user_id, thread_id, manual).await);
        }

        let (archival, human, persona) = tokio::join!(
            self.blocks.search_archival(text, self.recall.archival_limit),
            self.blocks.search_human(text, self.recall.human_block_limit),
            self.blocks.search_persona(text, self.recall.persona_block_limit),
        );

        let completion = self.prompt.build(&PromptContext {
            user_text: text,
            history: &history,
            memories: &memories,
            traits: &traits,
            archival: &archival,
            human_blocks: &human,
            persona_blocks: &persona,
        });

        let started = Instant::now();
        let raw = match self.model.complete(completion).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(user_id, thread_id, error = %e, "reply generation failed");
                self.stm
                    .append(thread_id, Role::Assistant, &self.fallback_reply);
                metrics::record_turn("fallback");
                return Ok(TurnReply {
                    reply: self.fallback_reply.clone(),
                    distilled: Vec::new(),
                });
            }
        };
        metrics::record_reply_latency(started.elapsed().as_secs_f64());

        let reply = sanitize(&raw, &self.agent_name);
        self.affect.update(thread_id, text, &reply);
        metrics::record_turn("reply");

        if reply.is_empty() {
            warn!(user_id, thread_id, "model returned an empty reply");
            return Ok(TurnReply::default());
        }

        self.stm.append(thread_id, Role::Assistant, &reply);
        let distilled = self
            .distiller
            .maybe_distill(user_id, thread_id, &self.stm)
            .await
            .into_memories();

        Ok(TurnReply { reply, distilled })
    }

    async fn remember(&self, user_id: &str, thread_id: &str, manual: ManualMemory) -> TurnReply {
        match self.ltm.add_manual_memory(user_id, manual).await {
            Ok(entry) => {
                let ack = format_ack(&entry);
                self.stm.append(thread_id, Role::Assistant, &ack);
                metrics::record_turn("manual");
                let distilled = self
                    .distiller
                    .maybe_distill(user_id, thread_id, &self.stm)
                    .await
                    .into_memories();
                TurnReply {
                    reply: ack,
                    distilled,
                }
            }
            Err(e) => {
                error!(user_id, thread_id, error = %e, "manual memory save failed");
                self.stm
                    .append(thread_id, Role::Assistant, &self.manual_failure_reply);
                metrics::record_turn("manual_failed");
                TurnReply {
                    reply: self.manual_failure_reply.clone(),
                    distilled: Vec::new(),
                }
            }
        }
    }

    fn thread_lock(&self, thread_id: &str) -> Arc<Mutex<()>> {
        self.thread_locks
            .entry(thread_id.to_string())
            .or_default()
            .clone()
    }

    /// Drop everything held for a thread. Long-term memories are untouched.
    pub fn forget_thread(&self, thread_id: &str) {
        self.stm.forget(thread_id);
        self.affect.forget(thread_id);
        self.distiller.forget(thread_id);
        // A turn still holding the lock keeps it registered.
        self.thread_locks
            .remove_if(thread_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn affect(&self, thread_id: &str) -> AffectState {
        self.affect.get(thread_id)
    }

    pub fn short_term(&self, thread_id: &str) -> Vec<StmEntry> {
        self.stm.read(thread_id)
    }

    /// Entries waiting for the next distillation of a thread.
    pub fn pending_distillation(&self, thread_id: &str) -> usize {
        self.distiller.pending(thread_id)
    }

    pub fn long_term(&self) -> &Arc<LongTermMemory> {
        &self.ltm
    }

    pub fn blocks(&self) -> &BlockMemory {
        &self.blocks
    }

    /// Keyword recall over a user's long-term memories, loading them first
    /// if needed.
    pub async fn recall_memories(&self, user_id: &str, query: &str) -> Vec<DistilledMemory> {
        if self.ltm.cached(user_id).is_empty() {
            self.ltm.load(user_id).await;
        }
        self.ltm
            .recall(user_id, query, self.recall.keyword_recall_limit)
    }

    /// Search past conversations for windows relevant to `query`.
    pub fn recall_conversations(
        &self,
        query: &str,
        conversations: &[Conversation],
    ) -> RecallOutcome {
        relevance::recall_conversations(query, conversations, &self.significant, &self.recall)
    }
}
