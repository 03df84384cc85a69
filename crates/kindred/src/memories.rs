// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `kindred memories`, `traits`, `remember` and `recall` command implementations.
//!
//! These work on the stored long-term memory directly; no model is involved.

use std::sync::Arc;

use kindred_config::model::KindredConfig;
use kindred_core::{DistilledMemory, KindredError, MemoryRowStore};
use kindred_memory::{LongTermMemory, ManualMemory, format_ack};
use kindred_storage::SqliteStorage;

/// Open the configured database, creating and migrating it when needed.
pub async fn open_storage(config: &KindredConfig) -> Result<Arc<SqliteStorage>, KindredError> {
    let storage = SqliteStorage::new(config.storage.clone());
    storage.initialize().await?;
    Ok(Arc::new(storage))
}

async fn open_ltm(
    config: &KindredConfig,
) -> Result<(Arc<SqliteStorage>, LongTermMemory), KindredError> {
    let storage = open_storage(config).await?;
    let ltm = LongTermMemory::new(Arc::clone(&storage) as Arc<dyn MemoryRowStore>, config);
    Ok((storage, ltm))
}

/// Run the `kindred memories` command.
pub async fn run_memories(
    config: &KindredConfig,
    user: &str,
    json: bool,
) -> Result<(), KindredError> {
    let (storage, ltm) = open_ltm(config).await?;
    let memories = ltm.load(user).await;
    storage.close().await?;

    if json {
        let out = serde_json::to_string_pretty(&memories)
            .map_err(|e| KindredError::Internal(format!("failed to serialize memories: {e}")))?;
        println!("{out}");
    } else if memories.is_empty() {
        println!("No memories for {user}.");
    } else {
        for memory in &memories {
            println!("{}", format_memory_line(memory));
        }
    }
    Ok(())
}

/// Run the `kindred traits` command.
pub async fn run_traits(config: &KindredConfig, user: &str) -> Result<(), KindredError> {
    let (storage, ltm) = open_ltm(config).await?;
    let traits = ltm.load_traits(user).await;
    storage.close().await?;

    println!("{}", traits.join(", "));
    Ok(())
}

/// Run the `kindred remember` command.
pub async fn run_remember(
    config: &KindredConfig,
    user: &str,
    summary: String,
    kind: Option<String>,
    tags: Vec<String>,
) -> Result<(), KindredError> {
    let entry = remember(config, user, ManualMemory { summary, kind, tags }).await?;
    println!("{}", format_ack(&entry));
    Ok(())
}

/// Run the `kindred recall` command.
pub async fn run_recall(
    config: &KindredConfig,
    user: &str,
    query: &str,
    limit: Option<usize>,
) -> Result<(), KindredError> {
    let limit = limit.unwrap_or(config.recall.keyword_recall_limit);
    let found = recall(config, user, query, limit).await?;

    if found.is_empty() {
        println!("No matching memories.");
    }
    for memory in &found {
        println!("{}", format_memory_line(memory));
    }
    Ok(())
}

async fn remember(
    config: &KindredConfig,
    user: &str,
    input: ManualMemory,
) -> Result<DistilledMemory, KindredError> {
    let (storage, ltm) = open_ltm(config).await?;
    let entry = ltm.add_manual_memory(user, input).await?;
    storage.close().await?;
    Ok(entry)
}

async fn recall(
    config: &KindredConfig,
    user: &str,
    query: &str,
    limit: usize,
) -> Result<Vec<DistilledMemory>, KindredError> {
    let (storage, ltm) = open_ltm(config).await?;
    ltm.load(user).await;
    storage.close().await?;
    Ok(ltm.recall(user, query, limit))
}

/// One memory per line: `- [type] summary {tags} (off)`.
fn format_memory_line(memory: &DistilledMemory) -> String {
    let mut line = String::from("- ");
    if let Some(kind) = &memory.kind {
        line.push_str(&format!("[{kind}] "));
    }
    line.push_str(&memory.summary);
    if !memory.tags.is_empty() {
        line.push_str(&format!(" {{{}}}", memory.tags.join(", ")));
    }
    if !memory.enabled {
        line.push_str(" (off)");
    }
    line
}
