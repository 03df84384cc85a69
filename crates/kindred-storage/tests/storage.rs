// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for seeding and the SQLite store.

use kindred_config::model::StorageConfig;
use kindred_core::{BlockKind, BlockStore, MemoryRowStore};
use kindred_storage::{seed_from_dir, Database, SqliteStorage};

const BOT_MEMORY: &str = r#"{
  "wren": {
    "alice": {
      "ltm": [
        {
          "summary": "Alice has a cat named Miso",
          "type": "fact",
          "source": "distilled",
          "createdAt": 1700000000000
        }
      ],
      "traits": ["warm"],
      "updated_at": "2024-01-02T03:04:05Z"
    },
    "bob": { "user_id": "robert" }
  }
}"#;

const LTM: &str = r#"[
  {
    "summary": "I keep promises",
    "type": "core-vow",
    "source": "system",
    "createdAt": 1700000000000
  }
]"#;

const ARCHIVAL: &str = r#"[
  { "id": "a1", "content": "The lake trip in 2019", "tags": ["travel"] },
  { "id": "a2", "content": "First day at the bakery", "importance": 0.8 }
]"#;

const HUMAN: &str = r#"[{ "label": "pets", "block_type": "human", "content": "one cat" }]"#;
const PERSONA: &str = r#"[
  { "label": "voice", "block_type": "persona", "content": "soft" },
  { "label": "habits", "block_type": "persona", "content": "hums" }
]"#;

fn write_seed_files(dir: &std::path::Path) {
    std::fs::write(dir.join("bot_memory.json"), BOT_MEMORY).unwrap();
    std::fs::write(dir.join("ltm.json"), LTM).unwrap();
    std::fs::write(dir.join("archival_memories.json"), ARCHIVAL).unwrap();
    std::fs::write(dir.join("human_blocks.json"), HUMAN).unwrap();
    std::fs::write(dir.join("persona_blocks.json"), PERSONA).unwrap();
}

#[tokio::test]
async fn seeding_fills_every_table_once() {
    let dir = tempfile::tempdir().unwrap();
    write_seed_files(dir.path());
    let db = Database::open_in_memory().await.unwrap();
    let traits = vec!["steady".to_string()];

    let report = seed_from_dir(&db, dir.path(), "wren", "__seed__", &traits)
        .await
        .unwrap();
    assert_eq!(report.rows, 3);
    assert_eq!(report.archival, 2);
    assert_eq!(report.human_blocks, 1);
    assert_eq!(report.persona_blocks, 2);
    assert!(!report.skipped);

    let storage = SqliteStorage::from_database(StorageConfig::default(), db.clone());
    let alice = storage.get_row("wren", "alice").await.unwrap().unwrap();
    assert_eq!(alice.ltm[0].summary, "Alice has a cat named Miso");
    assert_eq!(alice.updated_at.to_rfc3339(), "2024-01-02T03:04:05+00:00");

    // The row's own user_id wins over the map key.
    assert!(storage.get_row("wren", "robert").await.unwrap().is_some());
    assert!(storage.get_row("wren", "bob").await.unwrap().is_none());

    let seed = storage.get_row("wren", "__seed__").await.unwrap().unwrap();
    assert_eq!(seed.traits, traits);
    assert!(seed.ltm[0].is_core_vow());

    assert_eq!(storage.list_archival().await.unwrap().len(), 2);
    assert_eq!(
        storage.list_blocks(BlockKind::Persona).await.unwrap().len(),
        2
    );

    let again = seed_from_dir(&db, dir.path(), "wren", "__seed__", &traits)
        .await
        .unwrap();
    assert!(again.skipped);
}

#[tokio::test]
async fn only_empty_tables_are_seeded() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("archival_memories.json"), ARCHIVAL).unwrap();
    let db = Database::open_in_memory().await.unwrap();

    let first = seed_from_dir(&db, dir.path(), "wren", "__seed__", &[])
        .await
        .unwrap();
    assert_eq!(first.archival, 2);
    assert_eq!(first.rows, 0);

    // Archival is no longer empty, so a changed file is ignored.
    std::fs::write(
        dir.path().join("archival_memories.json"),
        r#"[{ "id": "a3", "content": "new" }]"#,
    )
    .unwrap();
    std::fs::write(dir.path().join("human_blocks.json"), HUMAN).unwrap();

    let second = seed_from_dir(&db, dir.path(), "wren", "__seed__", &[])
        .await
        .unwrap();
    assert_eq!(second.archival, 0);
    assert_eq!(second.human_blocks, 1);
}

#[tokio::test]
async fn malformed_seed_file_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("bot_memory.json"), "[1, 2").unwrap();
    std::fs::write(dir.path().join("human_blocks.json"), HUMAN).unwrap();
    let db = Database::open_in_memory().await.unwrap();

    let report = seed_from_dir(&db, dir.path(), "wren", "__seed__", &[])
        .await
        .unwrap();
    assert_eq!(report.rows, 0);
    assert_eq!(report.human_blocks, 1);
}
