// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context block and archival search.
//!
//! Human and persona blocks are small and cached after the first successful
//! load. Archival records can be large, so they are read fresh for every
//! search and scored in chunks with a cooperative yield between chunks.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use kindred_core::{ArchivalMemory, BlockKind, BlockStore, KindredError, MemoryBlock};

use crate::relevance::{self, rank, sort_descending};
use crate::types::Scored;

pub struct BlockMemory {
    store: Arc<dyn BlockStore>,
    human: OnceCell<Vec<MemoryBlock>>,
    persona: OnceCell<Vec<MemoryBlock>>,
    scan_chunk: usize,
}

impl BlockMemory {
    pub fn new(store: Arc<dyn BlockStore>, scan_chunk: usize) -> Self {
        Self {
            store,
            human: OnceCell::new(),
            persona: OnceCell::new(),
            scan_chunk: scan_chunk.max(1),
        }
    }

    /// Load and cache both block kinds. Returns `(human, persona)` counts.
    pub async fn warm_up(&self) -> (usize, usize) {
        let (human, persona) = tokio::join!(
            self.blocks(BlockKind::Human),
            self.blocks(BlockKind::Persona)
        );
        info!(
            human = human.len(),
            persona = persona.len(),
            "context blocks loaded"
        );
        (human.len(), persona.len())
    }

    /// All blocks of one kind. Load failures yield an empty list and are
    /// retried on the next call.
    pub async fn blocks(&self, kind: BlockKind) -> &[MemoryBlock] {
        let cell = match kind {
            BlockKind::Human => &self.human,
            BlockKind::Persona => &self.persona,
        };
        let loaded = cell
            .get_or_try_init(|| async {
                let blocks = self.store.list_blocks(kind).await?;
                debug!(kind = %kind, count = blocks.len(), "cached context blocks");
                Ok::<_, KindredError>(blocks)
            })
            .await;

        match loaded {
            Ok(blocks) => blocks.as_slice(),
            Err(e) => {
                warn!(kind = %kind, error = %e, "failed to load context blocks");
                &[]
            }
        }
    }

    pub async fn search_human(&self, query: &str, limit: usize) -> Vec<MemoryBlock> {
        self.search_blocks(BlockKind::Human, query, limit).await
    }

    pub async fn search_persona(&self, query: &str, limit: usize) -> Vec<MemoryBlock> {
        self.search_blocks(BlockKind::Persona, query, limit).await
    }

    async fn search_blocks(&self, kind: BlockKind, query: &str, limit: usize) -> Vec<MemoryBlock> {
        let blocks = self.blocks(kind).await;
        rank(query, blocks, limit, |b| b.content.as_str())
            .into_iter()
            .map(|s| s.item.clone())
            .collect()
    }

    /// Best-matching archival records for `query`.
    pub async fn search_archival(&self, query: &str, limit: usize) -> Vec<ArchivalMemory> {
        let records = match self.store.list_archival().await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "failed to search archival memories");
                return Vec::new();
            }
        };
        debug!(count = records.len(), "scanning archival memories");

        let mut scored: Vec<Scored<&ArchivalMemory>> = Vec::new();
        for (i, chunk) in records.chunks(self.scan_chunk).enumerate() {
            if i > 0 {
                tokio::task::yield_now().await;
            }
            scored.extend(chunk.iter().filter_map(|record| {
                let score = relevance::score(query, &record.content);
                (score > 0.0).then_some(Scored {
                    item: record,
                    score,
                })
            }));
        }

        sort_descending(&mut scored);
        let results: Vec<ArchivalMemory> = scored
            .into_iter()
            .take(limit)
            .map(|s| s.item.clone())
            .collect();
        debug!(count = results.len(), "relevant archival memories");
        results
    }
}
