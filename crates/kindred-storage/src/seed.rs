// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot seeding of an empty database from JSON files, plus plain-text
//! file import into long-term memory records.
//!
//! Expected files under the data directory:
//!
//! | file                      | contents                                   |
//! |---------------------------|--------------------------------------------|
//! | `bot_memory.json`         | `{ botId: { userId: row } }`               |
//! | `ltm.json`                | memory records for the seed user           |
//! | `archival_memories.json`  | archival records                           |
//! | `human_blocks.json`       | human blocks                               |
//! | `persona_blocks.json`     | persona blocks                             |
//!
//! Each table group is only written while it is empty. A missing file counts
//! as empty; an unreadable one is logged and skipped.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use kindred_core::{
    ArchivalMemory, BlockKind, DistilledMemory, KindredError, MemoryBlock, MemoryRow, MemorySource,
};

use crate::database::Database;
use crate::queries;

const BOT_MEMORY_FILE: &str = "bot_memory.json";
const LTM_FILE: &str = "ltm.json";
const ARCHIVAL_FILE: &str = "archival_memories.json";
const HUMAN_BLOCKS_FILE: &str = "human_blocks.json";
const PERSONA_BLOCKS_FILE: &str = "persona_blocks.json";

/// Characters kept from an imported text file.
pub const MAX_IMPORT_CHARS: usize = 4000;

/// Record type given to imported text files.
pub const DATA_IMPORT_KIND: &str = "data-import";

/// What a seeding pass wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub rows: usize,
    pub archival: usize,
    pub human_blocks: usize,
    pub persona_blocks: usize,
    /// True when every table already had data and nothing was read.
    pub skipped: bool,
}

/// Row shape inside `bot_memory.json`. Every field may be omitted.
#[derive(Debug, Default, Deserialize)]
struct SeedRow {
    bot_id: Option<String>,
    user_id: Option<String>,
    #[serde(default)]
    ltm: Vec<DistilledMemory>,
    #[serde(default)]
    traits: Vec<String>,
    updated_at: Option<String>,
}

type BotMemoryFile = BTreeMap<String, BTreeMap<String, SeedRow>>;

/// Seed empty tables from the JSON files in `dir`.
///
/// `ltm.json` becomes the `(bot_id, seed_user_id)` row with `seed_traits`,
/// and is only applied while `bot_memory` is empty.
pub async fn seed_from_dir(
    db: &Database,
    dir: &Path,
    bot_id: &str,
    seed_user_id: &str,
    seed_traits: &[String],
) -> Result<SeedReport, KindredError> {
    let has_rows = queries::bot_memory::count_rows(db).await? > 0;
    let has_archival = queries::archival::count_archival(db).await? > 0;
    let has_blocks = queries::blocks::count_blocks(db).await? > 0;

    if has_rows && has_archival && has_blocks {
        info!("memory database already seeded; skipping file import");
        return Ok(SeedReport {
            skipped: true,
            ..SeedReport::default()
        });
    }

    let mut report = SeedReport::default();

    if !has_rows {
        let now = Utc::now();
        let file: BotMemoryFile = read_json(&dir.join(BOT_MEMORY_FILE)).await;
        for (file_bot, users) in file {
            for (file_user, seed) in users {
                let row = MemoryRow {
                    bot_id: seed.bot_id.unwrap_or_else(|| file_bot.clone()),
                    user_id: seed.user_id.unwrap_or(file_user),
                    ltm: seed.ltm,
                    traits: seed.traits,
                    updated_at: seed
                        .updated_at
                        .as_deref()
                        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                        .map(|ts| ts.with_timezone(&Utc))
                        .unwrap_or(now),
                };
                queries::bot_memory::upsert_row(db, &row).await?;
                report.rows += 1;
            }
        }

        let seed_ltm: Vec<DistilledMemory> = read_json(&dir.join(LTM_FILE)).await;
        if !seed_ltm.is_empty() {
            let row = MemoryRow {
                bot_id: bot_id.to_string(),
                user_id: seed_user_id.to_string(),
                ltm: seed_ltm,
                traits: seed_traits.to_vec(),
                updated_at: now,
            };
            queries::bot_memory::upsert_row(db, &row).await?;
            report.rows += 1;
        }
    }

    if !has_archival {
        let archival: Vec<ArchivalMemory> = read_json(&dir.join(ARCHIVAL_FILE)).await;
        report.archival = queries::archival::upsert_archival(db, &archival).await?;
    }

    if !has_blocks {
        let human = blocks_of_kind(read_json(&dir.join(HUMAN_BLOCKS_FILE)).await, BlockKind::Human);
        let persona = blocks_of_kind(
            read_json(&dir.join(PERSONA_BLOCKS_FILE)).await,
            BlockKind::Persona,
        );
        report.human_blocks = queries::blocks::upsert_blocks(db, &human).await?;
        report.persona_blocks = queries::blocks::upsert_blocks(db, &persona).await?;
    }

    info!(
        rows = report.rows,
        archival = report.archival,
        human = report.human_blocks,
        persona = report.persona_blocks,
        "seeded memory database"
    );
    Ok(report)
}

// Block files are split by kind; a mislabeled entry follows the file it is in.
fn blocks_of_kind(mut blocks: Vec<MemoryBlock>, kind: BlockKind) -> Vec<MemoryBlock> {
    for block in &mut blocks {
        block.kind = kind;
    }
    blocks
}

/// Turn every non-empty `.txt` file directly inside `dir` into a memory record.
///
/// Files are visited in name order. Unreadable files are logged and skipped;
/// a missing directory yields nothing.
pub async fn import_text_files(dir: &Path) -> Vec<DistilledMemory> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "no data directory to import");
            return Vec::new();
        }
    };

    let mut paths = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                let is_txt = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
                if is_txt && path.is_file() {
                    paths.push(path);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "data import failed");
                return Vec::new();
            }
        }
    }
    paths.sort();

    let mut memories = Vec::new();
    for path in paths {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) => {
                warn!(file = %name, error = %e, "failed to import data file");
                continue;
            }
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        let created_at = tokio::fs::metadata(&path)
            .await
            .and_then(|meta| meta.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        let mut memory = DistilledMemory::new(
            format!("File {name}: {}", truncate_import(text)),
            Some(DATA_IMPORT_KIND.to_string()),
            MemorySource::DataFile(name),
        )
        .with_tags(vec![DATA_IMPORT_KIND.to_string(), "txt".to_string()]);
        memory.created_at = created_at;
        memories.push(memory);
    }

    info!(count = memories.len(), "imported data files");
    memories
}

fn truncate_import(text: &str) -> String {
    if text.chars().count() <= MAX_IMPORT_CHARS {
        return text.trim().to_string();
    }
    let head: String = text.chars().take(MAX_IMPORT_CHARS).collect();
    format!("{} ...", head.trim())
}

/// Read and parse a JSON file, falling back to `T::default()`.
async fn read_json<T: DeserializeOwned + Default>(path: &Path) -> T {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return T::default(),
        Err(e) => {
            warn!(file = %path.display(), error = %e, "could not read seed file");
            return T::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(file = %path.display(), error = %e, "invalid seed file; using empty default");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn long_imports_are_truncated_with_ellipsis() {
        let text = "a".repeat(MAX_IMPORT_CHARS + 10);
        let out = truncate_import(&text);
        assert_eq!(out.len(), MAX_IMPORT_CHARS + 4);
        assert!(out.ends_with(" ..."));
        assert_eq!(truncate_import("  short "), "short");
    }

    #[tokio::test]
    async fn invalid_json_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let parsed: Vec<ArchivalMemory> = read_json(&path).await;
        assert!(parsed.is_empty());
        let missing: Vec<ArchivalMemory> = read_json(&dir.path().join("absent.json")).await;
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn text_import_builds_data_records() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "  second file  ").unwrap();
        std::fs::write(dir.path().join("a.TXT"), "first file").unwrap();
        std::fs::write(dir.path().join("empty.txt"), "   ").unwrap();
        std::fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let memories = import_text_files(dir.path()).await;
        assert_eq!(memories.len(), 2);
        assert_eq!(memories[0].summary, "File a.TXT: first file");
        assert_eq!(memories[1].summary, "File b.txt: second file");
        assert_eq!(memories[1].kind.as_deref(), Some(DATA_IMPORT_KIND));
        assert_eq!(memories[1].source, MemorySource::DataFile("b.txt".into()));
        assert_eq!(memories[1].tags, vec!["data-import", "txt"]);
    }

    #[tokio::test]
    async fn missing_directory_imports_nothing() {
        let dir = tempdir().unwrap();
        assert!(import_text_files(&dir.path().join("nope")).await.is_empty());
    }
}
