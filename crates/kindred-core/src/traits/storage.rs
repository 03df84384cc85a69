// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence collaborators for memory rows and context blocks.

use async_trait::async_trait;

use crate::error::KindredError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ArchivalMemory, BlockKind, MemoryBlock, MemoryRow};

/// Row store keyed by `(bot_id, user_id)`.
///
/// Upserts replace the whole row.
#[async_trait]
pub trait MemoryRowStore: PluginAdapter {
    /// Point read of one row.
    async fn get_row(&self, bot_id: &str, user_id: &str)
    -> Result<Option<MemoryRow>, KindredError>;

    /// Insert or replace the row identified by `row.bot_id` and `row.user_id`.
    async fn upsert_row(&self, row: &MemoryRow) -> Result<(), KindredError>;
}

/// Bulk reader for human/persona blocks and archival records.
#[async_trait]
pub trait BlockStore: PluginAdapter {
    /// All blocks of one kind.
    async fn list_blocks(&self, kind: BlockKind) -> Result<Vec<MemoryBlock>, KindredError>;

    /// All archival records.
    async fn list_archival(&self) -> Result<Vec<ArchivalMemory>, KindredError>;
}
