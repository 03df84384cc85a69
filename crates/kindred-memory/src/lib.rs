// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversational memory engine.
//!
//! Keeps a bounded short-term log per conversation thread, distills it into
//! durable long-term memories through a generative model, recalls relevant
//! memories and context blocks for each prompt, and tracks a small affect
//! state per thread.
//!
//! [`MemoryEngine`] is the entry point for turn processing. The individual
//! stores are public so hosts and tools can use them directly.

pub mod affect;
pub mod blocks;
pub mod distill;
pub mod engine;
pub mod ltm;
pub mod manual;
pub mod metrics;
pub mod prompt;
pub mod relevance;
pub mod stm;
pub mod types;

pub use affect::{AffectState, AffectTracker, KeywordClassifier, TextClassifier};
pub use blocks::BlockMemory;
pub use distill::{DistillOutcome, Distiller};
pub use engine::MemoryEngine;
pub use ltm::{CoreIdentity, LongTermMemory, merge_ltm, merge_traits};
pub use manual::{ManualMemory, format_ack, parse_manual_memory_command};
pub use relevance::{RecallOutcome, recall_conversations, score, significant_set};
pub use stm::ShortTermMemory;
pub use types::{
    Conversation, ConversationMessage, SpeakerLabels, StmEntry, TurnReply, TurnRequest,
};
