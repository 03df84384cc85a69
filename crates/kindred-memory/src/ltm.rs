// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-term memory store.
//!
//! Each user owns a deduplicated set of [`DistilledMemory`] records and a
//! trait list, both scoped by the bot identity. The set is cached in memory
//! and mirrored to a [`MemoryRowStore`] as one whole row.
//!
//! ## Merge rules
//!
//! - Records are keyed by their lowercased summary.
//! - An incoming record replaces an existing one with the same key, keeping
//!   the existing position.
//! - The core vows are written last, so they are always present and always
//!   equal to their canonical definition.
//!
//! Persistence failures are logged and absorbed: the cache is updated even
//! when the row could not be written. A row that could not be read is never
//! written over.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use kindred_config::KindredConfig;
use kindred_core::types::CORE_VOW_KIND;
use kindred_core::{DistilledMemory, MemoryRow, MemoryRowStore, MemorySource};

use crate::metrics;

/// The fixed identity every user's memory set and trait list start from.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreIdentity {
    vows: Vec<DistilledMemory>,
    traits: Vec<String>,
}

impl CoreIdentity {
    pub fn new<V, T>(vows: V, traits: T) -> Self
    where
        V: IntoIterator,
        V::Item: Into<String>,
        T: IntoIterator,
        T::Item: Into<String>,
    {
        Self {
            vows: vows.into_iter().map(|s| canonical_vow(s.into())).collect(),
            traits: traits.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &KindredConfig) -> Self {
        Self::new(
            config.agent.core_vows.iter().cloned(),
            config.agent.core_traits.iter().cloned(),
        )
    }

    pub fn vows(&self) -> &[DistilledMemory] {
        &self.vows
    }

    pub fn traits(&self) -> &[String] {
        &self.traits
    }
}

// Vows carry a fixed timestamp so every copy compares equal.
fn canonical_vow(summary: String) -> DistilledMemory {
    let mut vow =
        DistilledMemory::new(summary, Some(CORE_VOW_KIND.to_string()), MemorySource::System);
    vow.created_at = DateTime::<Utc>::default();
    vow
}

/// Keyed union of `existing` and `incoming`, with the core vows forced in.
pub fn merge_ltm(
    existing: &[DistilledMemory],
    incoming: &[DistilledMemory],
    core: &CoreIdentity,
) -> Vec<DistilledMemory> {
    let mut merged: Vec<DistilledMemory> = Vec::with_capacity(existing.len() + incoming.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for memory in existing.iter().chain(incoming).chain(core.vows()) {
        let key = memory.key();
        if key.is_empty() {
            continue;
        }
        match index.get(&key) {
            Some(&pos) => merged[pos] = memory.clone(),
            None => {
                index.insert(key, merged.len());
                merged.push(memory.clone());
            }
        }
    }

    merged
}

/// Union of the core traits, `existing`, and `incoming`, first occurrence wins.
pub fn merge_traits(core: &[String], existing: &[String], incoming: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    core.iter()
        .chain(existing)
        .chain(incoming)
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect()
}

/// Additions made while a user's stored row could not be read.
#[derive(Debug, Default)]
struct Pending {
    memories: Vec<DistilledMemory>,
    traits: Vec<String>,
}

/// Cached, persisted long-term memory for every user of one bot.
///
/// A user is in the memory cache only after their stored row was read
/// successfully. Until then nothing is written for them: saves are held as
/// pending additions and merged in by the next successful load.
pub struct LongTermMemory {
    store: Arc<dyn MemoryRowStore>,
    bot_id: String,
    seed_user_id: String,
    core: CoreIdentity,
    serialize_saves: bool,
    memories: DashMap<String, Vec<DistilledMemory>>,
    traits: DashMap<String, Vec<String>>,
    pending: DashMap<String, Pending>,
    user_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl LongTermMemory {
    pub fn new(store: Arc<dyn MemoryRowStore>, config: &KindredConfig) -> Self {
        Self {
            store,
            bot_id: config.agent.bot_id.clone(),
            seed_user_id: config.agent.seed_user_id.clone(),
            core: CoreIdentity::from_config(config),
            serialize_saves: config.memory.serialize_user_saves,
            memories: DashMap::new(),
            traits: DashMap::new(),
            pending: DashMap::new(),
            user_locks: DashMap::new(),
        }
    }

    pub fn core(&self) -> &CoreIdentity {
        &self.core
    }

    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    /// Cached memories for a user; empty if never loaded.
    pub fn cached(&self, user_id: &str) -> Vec<DistilledMemory> {
        self.memories
            .get(user_id)
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    /// Cached traits for a user; empty if never loaded.
    pub fn cached_traits(&self, user_id: &str) -> Vec<String> {
        self.traits
            .get(user_id)
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    // Held across read-merge-write so concurrent saves for one user cannot
    // drop each other's additions.
    async fn user_guard(&self, user_id: &str) -> Option<OwnedMutexGuard<()>> {
        if !self.serialize_saves {
            return None;
        }
        let lock = self
            .user_locks
            .entry(user_id.to_string())
            .or_default()
            .clone();
        Some(lock.lock_owned().await)
    }

    /// Load a user's memories into the cache.
    ///
    /// A stored non-empty set is used as is. Otherwise the seed user's set
    /// bootstraps the user and is written back as the user's row. When the
    /// row cannot be read, the last known set (or the core vows) is returned
    /// and nothing is cached or written.
    pub async fn load(&self, user_id: &str) -> Vec<DistilledMemory> {
        let _guard = self.user_guard(user_id).await;
        match self.load_locked(user_id).await {
            Some(memories) => memories,
            None => self.unsynced_view(user_id),
        }
    }

    // `None` when the stored row could not be read.
    async fn load_locked(&self, user_id: &str) -> Option<Vec<DistilledMemory>> {
        let existing_row = match self.store.get_row(&self.bot_id, user_id).await {
            Ok(row) => row,
            Err(e) => {
                warn!(user_id, error = %e, "failed to read long-term memories");
                return None;
            }
        };
        let pending = self
            .pending
            .remove(user_id)
            .map(|(_, p)| p)
            .unwrap_or_default();
        let has_pending = !pending.memories.is_empty() || !pending.traits.is_empty();

        let (memories, mut traits, write) = match existing_row {
            Some(row) if !row.ltm.is_empty() => {
                let memories = merge_ltm(&row.ltm, &pending.memories, &self.core);
                info!(user_id, count = memories.len(), "loaded long-term memories");
                let traits = if row.traits.is_empty() {
                    self.core.traits().to_vec()
                } else {
                    row.traits
                };
                (memories, traits, has_pending)
            }
            existing_row => {
                let seed = match self.store.get_row(&self.bot_id, &self.seed_user_id).await {
                    Ok(row) => row,
                    Err(e) => {
                        warn!(user_id, error = %e, "failed to read seed memories");
                        None
                    }
                };
                let (seed_ltm, seed_traits) = seed.map(|r| (r.ltm, r.traits)).unwrap_or_default();
                let memories = merge_ltm(&seed_ltm, &pending.memories, &self.core);

                let traits = match existing_row {
                    Some(row) if !row.traits.is_empty() => row.traits,
                    _ if !seed_traits.is_empty() => seed_traits,
                    _ => self.core.traits().to_vec(),
                };
                info!(
                    user_id,
                    count = memories.len(),
                    "seeded long-term memories for new user"
                );
                (memories, traits, true)
            }
        };

        if !pending.traits.is_empty() {
            traits = merge_traits(self.core.traits(), &traits, &pending.traits);
        }
        if write {
            self.persist(user_id, memories.clone(), traits.clone()).await;
        }
        self.memories.insert(user_id.to_string(), memories.clone());
        self.traits.insert(user_id.to_string(), traits);
        Some(memories)
    }

    // The user's set as far as it is known while their row is unreadable.
    fn unsynced_view(&self, user_id: &str) -> Vec<DistilledMemory> {
        let pending = self
            .pending
            .get(user_id)
            .map(|p| p.memories.clone())
            .unwrap_or_default();
        merge_ltm(&self.cached(user_id), &pending, &self.core)
    }

    // Make sure the cache mirrors the stored row before writing over it.
    async fn ensure_loaded(&self, user_id: &str) -> bool {
        self.memories.contains_key(user_id) || self.load_locked(user_id).await.is_some()
    }

    /// Merge `additions` into the user's set, persist it, and return the merged set.
    ///
    /// A user that was never loaded is loaded first so stored memories are
    /// not overwritten. If that load fails the additions are kept pending
    /// until the next successful load.
    pub async fn save(&self, user_id: &str, additions: &[DistilledMemory]) -> Vec<DistilledMemory> {
        let _guard = self.user_guard(user_id).await;

        if !self.ensure_loaded(user_id).await {
            warn!(
                user_id,
                count = additions.len(),
                "stored memories unavailable; holding additions until next load"
            );
            self.pending
                .entry(user_id.to_string())
                .or_default()
                .memories
                .extend_from_slice(additions);
            return self.unsynced_view(user_id);
        }

        let merged = merge_ltm(&self.cached(user_id), additions, &self.core);
        self.memories.insert(user_id.to_string(), merged.clone());

        let mut traits = self.cached_traits(user_id);
        if traits.is_empty() {
            traits = self.core.traits().to_vec();
        }

        if self.persist(user_id, merged.clone(), traits).await {
            info!(user_id, count = merged.len(), "saved long-term memories");
        }
        metrics::set_ltm_size(merged.len());
        merged
    }

    /// Load a user's traits, seeding the core traits when none are stored.
    pub async fn load_traits(&self, user_id: &str) -> Vec<String> {
        let _guard = self.user_guard(user_id).await;

        let row = match self.store.get_row(&self.bot_id, user_id).await {
            Ok(Some(row)) if !row.traits.is_empty() => {
                let merged = merge_traits(self.core.traits(), &[], &row.traits);
                self.traits.insert(user_id.to_string(), merged.clone());
                return merged;
            }
            Ok(row) => row,
            Err(e) => {
                warn!(user_id, error = %e, "failed to read traits; using last known traits");
                let pending = self
                    .pending
                    .get(user_id)
                    .map(|p| p.traits.clone())
                    .unwrap_or_default();
                return merge_traits(self.core.traits(), &self.cached_traits(user_id), &pending);
            }
        };

        let ltm = match row {
            Some(row) if !row.ltm.is_empty() => row.ltm,
            _ => self.cached_or_vows(user_id),
        };
        let traits = self.core.traits().to_vec();
        self.persist(user_id, ltm, traits.clone()).await;
        debug!(user_id, "seeded core traits");
        self.traits.insert(user_id.to_string(), traits.clone());
        traits
    }

    /// Union `additions` into the user's traits, persist, and return the result.
    ///
    /// Like [`save`](Self::save), additions are held pending while the
    /// stored row cannot be read.
    pub async fn save_traits(&self, user_id: &str, additions: &[String]) -> Vec<String> {
        let _guard = self.user_guard(user_id).await;

        if !self.ensure_loaded(user_id).await {
            warn!(user_id, "stored traits unavailable; holding additions until next load");
            let mut pending = self.pending.entry(user_id.to_string()).or_default();
            pending.traits.extend_from_slice(additions);
            return merge_traits(self.core.traits(), &self.cached_traits(user_id), &pending.traits);
        }

        let merged = merge_traits(self.core.traits(), &self.cached_traits(user_id), additions);
        self.traits.insert(user_id.to_string(), merged.clone());

        self.persist(user_id, self.cached(user_id), merged.clone())
            .await;
        merged
    }

    /// Enabled memories whose summary or tags contain any query keyword.
    ///
    /// Keywords are the lowercased, whitespace-separated words of `query`.
    /// Results keep cache order.
    pub fn recall(&self, user_id: &str, query: &str, limit: usize) -> Vec<DistilledMemory> {
        let query = query.to_lowercase();
        let keywords: Vec<&str> = query.split_whitespace().collect();
        if keywords.is_empty() {
            return Vec::new();
        }

        let Some(memories) = self.memories.get(user_id) else {
            return Vec::new();
        };

        memories
            .iter()
            .filter(|m| m.enabled)
            .filter(|m| {
                let summary = m.summary.to_lowercase();
                let tags: Vec<String> = m.tags.iter().map(|t| t.to_lowercase()).collect();
                keywords
                    .iter()
                    .any(|kw| summary.contains(kw) || tags.iter().any(|t| t.contains(kw)))
            })
            .take(limit)
            .cloned()
            .collect()
    }

    fn cached_or_vows(&self, user_id: &str) -> Vec<DistilledMemory> {
        let cached = self.cached(user_id);
        if cached.is_empty() {
            self.core.vows().to_vec()
        } else {
            cached
        }
    }

    // Returns whether the row was written.
    async fn persist(
        &self,
        user_id: &str,
        ltm: Vec<DistilledMemory>,
        traits: Vec<String>,
    ) -> bool {
        let row = MemoryRow {
            bot_id: self.bot_id.clone(),
            user_id: user_id.to_string(),
            ltm,
            traits,
            updated_at: Utc::now(),
        };
        match self.store.upsert_row(&row).await {
            Ok(()) => true,
            Err(e) => {
                error!(user_id, error = %e, "failed to persist memory row");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindred_test_utils::MockStore;
    use proptest::prelude::*;

    fn core() -> CoreIdentity {
        CoreIdentity::new(["I keep my promises", "I ask when unsure"], ["warm", "curious"])
    }

    fn mem(summary: &str, kind: &str) -> DistilledMemory {
        DistilledMemory::new(summary, Some(kind.to_string()), MemorySource::Distilled)
    }

    fn config() -> KindredConfig {
        let mut config = KindredConfig::default();
        config.agent.bot_id = "bot".into();
        config.agent.core_vows = vec!["I keep my promises".into()];
        config.agent.core_traits = vec!["warm".into()];
        config
    }

    fn row(user: &str, ltm: Vec<DistilledMemory>, traits: &[&str]) -> MemoryRow {
        MemoryRow {
            bot_id: "bot".into(),
            user_id: user.into(),
            ltm,
            traits: traits.iter().map(|t| t.to_string()).collect(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn later_entry_wins_case_insensitively() {
        let merged = merge_ltm(&[mem("x", "old")], &[mem("X", "new")], &core());
        let xs: Vec<_> = merged.iter().filter(|m| m.key() == "x").collect();
        assert_eq!(xs.len(), 1);
        assert_eq!(xs[0].kind.as_deref(), Some("new"));
        assert_eq!(xs[0].summary, "X");
    }

    #[test]
    fn replacement_keeps_original_position() {
        let merged = merge_ltm(
            &[mem("first", "a"), mem("second", "a")],
            &[mem("FIRST", "b"), mem("third", "a")],
            &core(),
        );
        let summaries: Vec<&str> = merged.iter().map(|m| m.summary.as_str()).collect();
        assert_eq!(
            summaries,
            vec!["FIRST", "second", "third", "I keep my promises", "I ask when unsure"]
        );
    }

    #[test]
    fn core_vows_cannot_be_overwritten() {
        let fake = mem("i keep my promises", "misc");
        let merged = merge_ltm(&[], &[fake], &core());
        let vow = merged
            .iter()
            .find(|m| m.key() == "i keep my promises")
            .unwrap();
        assert_eq!(vow, &core().vows()[0]);
        assert!(vow.is_core_vow());
    }

    #[test]
    fn traits_union_keeps_first_occurrence() {
        let core = vec!["warm".to_string()];
        let merged = merge_traits(
            &core,
            &["calm".to_string(), "warm".to_string()],
            &["calm".to_string(), "bold".to_string()],
        );
        assert_eq!(merged, vec!["warm", "calm", "bold"]);
    }

    fn arb_memory() -> impl Strategy<Value = DistilledMemory> {
        ("[a-dA-D]{1,3}", "[a-z]{1,4}").prop_map(|(summary, kind)| mem(&summary, &kind))
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(
            a in prop::collection::vec(arb_memory(), 0..8),
            b in prop::collection::vec(arb_memory(), 0..8),
        ) {
            let core = core();
            let once = merge_ltm(&a, &b, &core);
            let twice = merge_ltm(&once, &b, &core);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn merge_has_unique_keys_and_all_vows(
            a in prop::collection::vec(arb_memory(), 0..8),
            b in prop::collection::vec(arb_memory(), 0..8),
        ) {
            let core = core();
            let merged = merge_ltm(&a, &b, &core);
            let keys: HashSet<String> = merged.iter().map(|m| m.key()).collect();
            prop_assert_eq!(keys.len(), merged.len());
            for vow in core.vows() {
                prop_assert!(merged.contains(vow));
            }
        }
    }

    #[tokio::test]
    async fn load_uses_stored_set() {
        let store = Arc::new(MockStore::new());
        store
            .insert_row(row("alice", vec![mem("likes tea", "preference")], &["calm"]))
            .await;
        let ltm = LongTermMemory::new(store.clone(), &config());

        let loaded = ltm.load("alice").await;
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].summary, "likes tea");
        assert!(loaded[1].is_core_vow());
        assert_eq!(store.upsert_count(), 0);
    }

    #[tokio::test]
    async fn new_user_is_bootstrapped_from_seed() {
        let store = Arc::new(MockStore::new());
        store
            .insert_row(row("__seed__", vec![mem("baseline persona", "persona")], &["gentle"]))
            .await;
        let ltm = LongTermMemory::new(store.clone(), &config());

        let loaded = ltm.load("bob").await;
        assert_eq!(loaded[0].summary, "baseline persona");

        let persisted = store.row("bot", "bob").await.unwrap();
        assert_eq!(persisted.ltm, loaded);
        assert_eq!(persisted.traits, vec!["gentle"]);
    }

    #[tokio::test]
    async fn new_user_without_seed_gets_core_identity() {
        let store = Arc::new(MockStore::new());
        let ltm = LongTermMemory::new(store.clone(), &config());

        let loaded = ltm.load("carol").await;
        assert_eq!(loaded.len(), 1);
        assert!(loaded[0].is_core_vow());
        assert_eq!(store.row("bot", "carol").await.unwrap().traits, vec!["warm"]);
    }

    #[tokio::test]
    async fn save_merges_into_cache_and_persists() {
        let store = Arc::new(MockStore::new());
        let ltm = LongTermMemory::new(store.clone(), &config());
        ltm.load("alice").await;

        let merged = ltm.save("alice", &[mem("has a dog", "fact")]).await;
        assert_eq!(merged.len(), 2);
        assert_eq!(ltm.cached("alice"), merged);
        assert_eq!(store.row("bot", "alice").await.unwrap().ltm, merged);
    }

    #[tokio::test]
    async fn save_without_load_keeps_stored_memories() {
        let store = Arc::new(MockStore::new());
        store
            .insert_row(row("alice", vec![mem("likes tea", "preference")], &["calm"]))
            .await;
        let ltm = LongTermMemory::new(store.clone(), &config());

        let merged = ltm.save("alice", &[mem("has a dog", "fact")]).await;
        let summaries: Vec<&str> = merged.iter().map(|m| m.summary.as_str()).collect();
        assert!(summaries.contains(&"likes tea"));
        assert!(summaries.contains(&"has a dog"));
        assert_eq!(store.row("bot", "alice").await.unwrap().traits, vec!["calm"]);
    }

    #[tokio::test]
    async fn failed_persist_still_updates_cache() {
        let store = Arc::new(MockStore::new());
        let ltm = LongTermMemory::new(store.clone(), &config());
        ltm.load("alice").await;
        store.fail_writes(true);

        let merged = ltm.save("alice", &[mem("has a dog", "fact")]).await;
        assert_eq!(merged.len(), 2);
        assert_eq!(ltm.cached("alice").len(), 2);
        assert_eq!(store.row("bot", "alice").await.unwrap().ltm.len(), 1);
    }

    #[tokio::test]
    async fn read_failure_does_not_overwrite_row() {
        let store = Arc::new(MockStore::new());
        store
            .insert_row(row("alice", vec![mem("likes tea", "preference")], &["calm"]))
            .await;
        store.fail_reads(true);
        let ltm = LongTermMemory::new(store.clone(), &config());

        let loaded = ltm.load("alice").await;
        assert_eq!(loaded.len(), 1);
        assert_eq!(store.upsert_count(), 0);
    }

    #[tokio::test]
    async fn save_during_read_failure_is_held_until_next_load() {
        let store = Arc::new(MockStore::new());
        store
            .insert_row(row("alice", vec![mem("likes tea", "preference")], &["calm"]))
            .await;
        store.fail_reads(true);
        let ltm = LongTermMemory::new(store.clone(), &config());

        let merged = ltm.save("alice", &[mem("has a dog", "fact")]).await;
        assert!(merged.iter().any(|m| m.summary == "has a dog"));
        ltm.save_traits("alice", &["playful".to_string()]).await;
        assert_eq!(store.upsert_count(), 0);
        assert!(ltm.cached("alice").is_empty());

        let stored = store.row("bot", "alice").await.unwrap();
        assert_eq!(stored.ltm[0].summary, "likes tea");
        assert_eq!(stored.traits, vec!["calm"]);

        store.fail_reads(false);
        let loaded = ltm.load("alice").await;
        let summaries: Vec<&str> = loaded.iter().map(|m| m.summary.as_str()).collect();
        assert_eq!(summaries, vec!["likes tea", "has a dog", "I keep my promises"]);

        let stored = store.row("bot", "alice").await.unwrap();
        assert_eq!(stored.ltm, loaded);
        assert_eq!(stored.traits, vec!["warm", "calm", "playful"]);
    }

    #[tokio::test]
    async fn trait_read_failure_leaves_cache_unloaded() {
        let store = Arc::new(MockStore::new());
        store
            .insert_row(row("alice", vec![mem("likes tea", "preference")], &["calm"]))
            .await;
        store.fail_reads(true);
        let ltm = LongTermMemory::new(store.clone(), &config());

        assert_eq!(ltm.load_traits("alice").await, vec!["warm"]);
        assert!(ltm.cached_traits("alice").is_empty());

        store.fail_reads(false);
        let merged = ltm.save_traits("alice", &["bold".to_string()]).await;
        assert_eq!(merged, vec!["warm", "calm", "bold"]);
        let stored = store.row("bot", "alice").await.unwrap();
        assert_eq!(stored.ltm[0].summary, "likes tea");
    }

    #[tokio::test]
    async fn traits_are_seeded_then_merged() {
        let store = Arc::new(MockStore::new());
        let ltm = LongTermMemory::new(store.clone(), &config());

        assert_eq!(ltm.load_traits("alice").await, vec!["warm"]);
        let merged = ltm
            .save_traits("alice", &["playful".to_string(), "warm".to_string()])
            .await;
        assert_eq!(merged, vec!["warm", "playful"]);

        let persisted = store.row("bot", "alice").await.unwrap();
        assert_eq!(persisted.traits, merged);
        assert!(persisted.ltm[0].is_core_vow());

        let fresh = LongTermMemory::new(store.clone(), &config());
        assert_eq!(fresh.load_traits("alice").await, vec!["warm", "playful"]);
    }

    #[tokio::test]
    async fn keyword_recall_matches_summary_or_tags() {
        let store = Arc::new(MockStore::new());
        let ltm = LongTermMemory::new(store, &config());
        let mut disabled = mem("rainy walks", "preference");
        disabled.enabled = false;
        ltm.save(
            "alice",
            &[
                mem("Loves RAINY days", "preference"),
                mem("has a cat", "fact").with_tags(vec!["Weather".into()]),
                disabled,
            ],
        )
        .await;

        let hits = ltm.recall("alice", "rainy weather", 5);
        let summaries: Vec<&str> = hits.iter().map(|m| m.summary.as_str()).collect();
        assert_eq!(summaries, vec!["Loves RAINY days", "has a cat"]);
        assert_eq!(ltm.recall("alice", "rainy weather", 1).len(), 1);
        assert!(ltm.recall("alice", "   ", 5).is_empty());
        assert!(ltm.recall("nobody", "rainy", 5).is_empty());
    }

    #[tokio::test]
    async fn concurrent_saves_for_one_user_keep_both_additions() {
        let store = Arc::new(MockStore::new());
        let ltm = Arc::new(LongTermMemory::new(store.clone(), &config()));
        ltm.load("alice").await;

        let a = {
            let ltm = ltm.clone();
            tokio::spawn(async move { ltm.save("alice", &[mem("from thread a", "fact")]).await })
        };
        let b = {
            let ltm = ltm.clone();
            tokio::spawn(async move { ltm.save("alice", &[mem("from thread b", "fact")]).await })
        };
        a.await.unwrap();
        b.await.unwrap();

        let persisted = store.row("bot", "alice").await.unwrap();
        let keys: Vec<String> = persisted.ltm.iter().map(|m| m.key()).collect();
        assert!(keys.contains(&"from thread a".to_string()));
        assert!(keys.contains(&"from thread b".to_string()));
    }
}
