// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `kindred search` and `kindred conversations` command implementations.

use std::path::Path;
use std::sync::Arc;

use kindred_config::model::KindredConfig;
use kindred_core::{ArchivalMemory, BlockStore, KindredError, MemoryBlock};
use kindred_memory::prompt::{format_archival, format_blocks};
use kindred_memory::{BlockMemory, Conversation, RecallOutcome};

use crate::memories::open_storage;

/// Hits from one block and archival search.
#[derive(Debug, Default)]
struct SearchHits {
    human: Vec<MemoryBlock>,
    persona: Vec<MemoryBlock>,
    archival: Vec<ArchivalMemory>,
}

impl SearchHits {
    fn is_empty(&self) -> bool {
        self.human.is_empty() && self.persona.is_empty() && self.archival.is_empty()
    }
}

/// Run the `kindred search` command.
pub async fn run_search(config: &KindredConfig, query: &str) -> Result<(), KindredError> {
    let hits = search(config, query).await?;
    if hits.is_empty() {
        println!("No matching blocks or archival records.");
        return Ok(());
    }

    let max_block = config.prompt.max_block_chars;
    for (title, blocks) in [("Human", &hits.human), ("Persona", &hits.persona)] {
        if !blocks.is_empty() {
            println!("# {title}");
            println!("{}\n", format_blocks(blocks.iter(), max_block));
        }
    }
    if !hits.archival.is_empty() {
        println!("# Archival");
        println!(
            "{}",
            format_archival(&hits.archival, config.prompt.max_archival_chars)
        );
    }
    Ok(())
}

/// Run the `kindred conversations` command.
pub async fn run_conversations(
    config: &KindredConfig,
    file: &Path,
    query: &str,
) -> Result<(), KindredError> {
    let conversations = read_conversations(file).await?;
    match search_conversations(config, &conversations, query) {
        RecallOutcome::NotSearched => println!("Nothing to search."),
        outcome => {
            for line in outcome.into_lines() {
                println!("{line}\n");
            }
        }
    }
    Ok(())
}

async fn search(config: &KindredConfig, query: &str) -> Result<SearchHits, KindredError> {
    let storage = open_storage(config).await?;
    let blocks = BlockMemory::new(
        Arc::clone(&storage) as Arc<dyn BlockStore>,
        config.recall.scan_chunk_size,
    );

    let recall = &config.recall;
    let (human, persona, archival) = tokio::join!(
        blocks.search_human(query, recall.human_block_limit),
        blocks.search_persona(query, recall.persona_block_limit),
        blocks.search_archival(query, recall.archival_limit),
    );
    storage.close().await?;

    Ok(SearchHits {
        human,
        persona,
        archival,
    })
}

async fn read_conversations(file: &Path) -> Result<Vec<Conversation>, KindredError> {
    let raw = tokio::fs::read_to_string(file).await.map_err(|e| {
        KindredError::InvalidInput(format!("cannot read {}: {e}", file.display()))
    })?;
    serde_json::from_str(&raw).map_err(|e| {
        KindredError::InvalidInput(format!("{} is not a conversation list: {e}", file.display()))
    })
}

fn search_conversations(
    config: &KindredConfig,
    conversations: &[Conversation],
    query: &str,
) -> RecallOutcome {
    let significant = kindred_memory::significant_set(&config.affect.significant_words);
    kindred_memory::recall_conversations(query, conversations, &significant, &config.recall)
}
