// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human and persona context blocks.

use kindred_core::{BlockKind, KindredError, MemoryBlock, Metadata};
use rusqlite::params;

use crate::database::{map_tr_err, Database};

/// Insert or replace blocks keyed by `(block_type, label)` in one transaction.
pub async fn upsert_blocks(db: &Database, blocks: &[MemoryBlock]) -> Result<usize, KindredError> {
    if blocks.is_empty() {
        return Ok(0);
    }

    let mut encoded = Vec::with_capacity(blocks.len());
    for block in blocks {
        let metadata = block
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        encoded.push((
            block.kind.as_str(),
            block.label.clone(),
            block.content.clone(),
            block.description.clone(),
            metadata,
            block.limit,
            block.read_only,
        ));
    }

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO memory_blocks
                         (block_type, label, content, description, metadata, limit_value, read_only)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT (block_type, label) DO UPDATE SET
                         content = excluded.content,
                         description = excluded.description,
                         metadata = excluded.metadata,
                         limit_value = excluded.limit_value,
                         read_only = excluded.read_only",
                )?;
                for (kind, label, content, description, metadata, limit, read_only) in &encoded {
                    stmt.execute(params![
                        kind,
                        label,
                        content,
                        description,
                        metadata,
                        limit,
                        read_only
                    ])?;
                }
            }
            tx.commit()?;
            Ok(encoded.len())
        })
        .await
        .map_err(map_tr_err)
}

/// All blocks of one kind, ordered by label.
pub async fn list_blocks(db: &Database, kind: BlockKind) -> Result<Vec<MemoryBlock>, KindredError> {
    let raw = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT label, content, description, metadata, limit_value, read_only
                 FROM memory_blocks WHERE block_type = ?1 ORDER BY label",
            )?;
            let rows = stmt.query_map(params![kind.as_str()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, Option<bool>>(5)?,
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)?;

    raw.into_iter()
        .map(|(label, content, description, metadata, limit, read_only)| {
            Ok(MemoryBlock {
                label,
                kind,
                content,
                description,
                metadata: decode_metadata(metadata)?,
                limit,
                read_only,
            })
        })
        .collect()
}

/// Number of stored blocks of both kinds.
pub async fn count_blocks(db: &Database) -> Result<i64, KindredError> {
    db.connection()
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM memory_blocks", [], |row| row.get(0)))
        .await
        .map_err(map_tr_err)
}

pub(crate) fn decode_metadata(raw: Option<String>) -> Result<Option<Metadata>, KindredError> {
    Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
}
