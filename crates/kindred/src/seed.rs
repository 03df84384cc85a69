// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `kindred seed` and `kindred import` command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use kindred_config::model::KindredConfig;
use kindred_core::{KindredError, MemoryRowStore};
use kindred_memory::LongTermMemory;
use kindred_storage::SeedReport;
use tracing::info;

use crate::memories::open_storage;

/// Run the `kindred seed` command.
pub async fn run_seed(config: &KindredConfig, dir: Option<PathBuf>) -> Result<(), KindredError> {
    let dir = dir.unwrap_or_else(|| PathBuf::from(&config.storage.data_dir));
    let report = seed_database(config, &dir).await?;

    if report.skipped {
        println!("Database already seeded; nothing imported.");
    } else {
        println!("Seeded from {}:", dir.display());
        println!("  memory rows     {}", report.rows);
        println!("  archival        {}", report.archival);
        println!("  human blocks    {}", report.human_blocks);
        println!("  persona blocks  {}", report.persona_blocks);
    }
    Ok(())
}

/// Run the `kindred import` command.
pub async fn run_import(
    config: &KindredConfig,
    dir: Option<PathBuf>,
    user: Option<String>,
) -> Result<(), KindredError> {
    let dir = dir.unwrap_or_else(|| PathBuf::from(&config.storage.data_dir));
    let user = user.unwrap_or_else(|| config.agent.seed_user_id.clone());

    let (imported, total) = import_memories(config, &dir, &user).await?;
    if imported == 0 {
        println!("No .txt files found in {}.", dir.display());
    } else {
        println!("Imported {imported} file(s) for {user}; {total} memories stored.");
    }
    Ok(())
}

async fn seed_database(config: &KindredConfig, dir: &Path) -> Result<SeedReport, KindredError> {
    let storage = open_storage(config).await?;
    let report = kindred_storage::seed_from_dir(
        storage.database()?,
        dir,
        &config.agent.bot_id,
        &config.agent.seed_user_id,
        &config.agent.core_traits,
    )
    .await?;
    storage.close().await?;
    Ok(report)
}

/// Import text files for `user`. Returns (files imported, memories now held).
async fn import_memories(
    config: &KindredConfig,
    dir: &Path,
    user: &str,
) -> Result<(usize, usize), KindredError> {
    let imported = kindred_storage::import_text_files(dir).await;
    if imported.is_empty() {
        return Ok((0, 0));
    }

    let storage = open_storage(config).await?;
    let ltm = LongTermMemory::new(Arc::clone(&storage) as Arc<dyn MemoryRowStore>, config);
    let merged = ltm.save(user, &imported).await;
    info!(user_id = user, count = imported.len(), "text files imported");
    storage.close().await?;
    Ok((imported.len(), merged.len()))
}
