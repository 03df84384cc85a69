// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence mock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use kindred_core::{
    AdapterType, ArchivalMemory, BlockKind, BlockStore, HealthStatus, KindredError, MemoryBlock,
    MemoryRow, MemoryRowStore, PluginAdapter,
};

/// Row and block store backed by hash maps.
///
/// Reads and writes can be made to fail independently, and block listings
/// are counted so caching can be asserted.
#[derive(Default)]
pub struct MockStore {
    rows: Mutex<HashMap<(String, String), MemoryRow>>,
    human: Mutex<Vec<MemoryBlock>>,
    persona: Mutex<Vec<MemoryBlock>>,
    archival: Mutex<Vec<ArchivalMemory>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    upserts: AtomicUsize,
    block_listings: AtomicUsize,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a row directly, bypassing failure injection.
    pub async fn insert_row(&self, row: MemoryRow) {
        self.rows
            .lock()
            .await
            .insert((row.bot_id.clone(), row.user_id.clone()), row);
    }

    /// Snapshot of one row.
    pub async fn row(&self, bot_id: &str, user_id: &str) -> Option<MemoryRow> {
        self.rows
            .lock()
            .await
            .get(&(bot_id.to_string(), user_id.to_string()))
            .cloned()
    }

    pub async fn set_blocks(&self, kind: BlockKind, blocks: Vec<MemoryBlock>) {
        match kind {
            BlockKind::Human => *self.human.lock().await = blocks,
            BlockKind::Persona => *self.persona.lock().await = blocks,
        }
    }

    pub async fn set_archival(&self, records: Vec<ArchivalMemory>) {
        *self.archival.lock().await = records;
    }

    /// Make every read fail until reset.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every upsert fail until reset.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Successful upserts so far.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Calls to `list_blocks` and `list_archival` so far.
    pub fn block_listing_count(&self) -> usize {
        self.block_listings.load(Ordering::SeqCst)
    }

    fn check_reads(&self) -> Result<(), KindredError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(KindredError::storage("injected read failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl PluginAdapter for MockStore {
    fn name(&self) -> &str {
        "mock-store"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, KindredError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), KindredError> {
        Ok(())
    }
}

#[async_trait]
impl MemoryRowStore for MockStore {
    async fn get_row(
        &self,
        bot_id: &str,
        user_id: &str,
    ) -> Result<Option<MemoryRow>, KindredError> {
        self.check_reads()?;
        Ok(self.row(bot_id, user_id).await)
    }

    async fn upsert_row(&self, row: &MemoryRow) -> Result<(), KindredError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(KindredError::storage("injected write failure"));
        }
        self.insert_row(row.clone()).await;
        self.upserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl BlockStore for MockStore {
    async fn list_blocks(&self, kind: BlockKind) -> Result<Vec<MemoryBlock>, KindredError> {
        self.check_reads()?;
        self.block_listings.fetch_add(1, Ordering::SeqCst);
        Ok(match kind {
            BlockKind::Human => self.human.lock().await.clone(),
            BlockKind::Persona => self.persona.lock().await.clone(),
        })
    }

    async fn list_archival(&self) -> Result<Vec<ArchivalMemory>, KindredError> {
        self.check_reads()?;
        self.block_listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.archival.lock().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn row(user: &str) -> MemoryRow {
        MemoryRow {
            bot_id: "bot".into(),
            user_id: user.into(),
            ltm: Vec::new(),
            traits: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn write_failures_leave_rows_untouched() {
        let store = MockStore::new();
        store.upsert_row(&row("a")).await.unwrap();
        store.fail_writes(true);
        assert!(store.upsert_row(&row("b")).await.is_err());
        assert_eq!(store.upsert_count(), 1);
        assert!(store.get_row("bot", "b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_failures_are_reported() {
        let store = MockStore::new();
        store.fail_reads(true);
        assert!(store.get_row("bot", "a").await.is_err());
        assert!(store.list_archival().await.is_err());
    }
}
