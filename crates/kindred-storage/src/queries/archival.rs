// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Archival text records.

use kindred_core::{ArchivalMemory, KindredError};
use rusqlite::params;

use crate::database::{map_tr_err, Database};
use crate::queries::blocks::decode_metadata;

/// Insert or replace records keyed by id in one transaction.
pub async fn upsert_archival(
    db: &Database,
    records: &[ArchivalMemory],
) -> Result<usize, KindredError> {
    if records.is_empty() {
        return Ok(0);
    }

    let mut encoded = Vec::with_capacity(records.len());
    for record in records {
        let tags = serde_json::to_string(&record.tags)?;
        let metadata = record
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        encoded.push((
            record.id.clone(),
            record.content.clone(),
            record.category.clone(),
            record.importance,
            record.timestamp,
            tags,
            metadata,
        ));
    }

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO archival_memories
                         (id, content, category, importance, timestamp, tags, metadata)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT (id) DO UPDATE SET
                         content = excluded.content,
                         category = excluded.category,
                         importance = excluded.importance,
                         timestamp = excluded.timestamp,
                         tags = excluded.tags,
                         metadata = excluded.metadata",
                )?;
                for (id, content, category, importance, timestamp, tags, metadata) in &encoded {
                    stmt.execute(params![
                        id, content, category, importance, timestamp, tags, metadata
                    ])?;
                }
            }
            tx.commit()?;
            Ok(encoded.len())
        })
        .await
        .map_err(map_tr_err)
}

/// Every archival record in insertion order.
pub async fn list_archival(db: &Database) -> Result<Vec<ArchivalMemory>, KindredError> {
    let raw = db
        .connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, content, category, importance, timestamp, tags, metadata
                 FROM archival_memories ORDER BY rowid",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)?;

    raw.into_iter()
        .map(
            |(id, content, category, importance, timestamp, tags, metadata)| {
                Ok(ArchivalMemory {
                    id,
                    content,
                    category,
                    importance,
                    timestamp,
                    tags: match tags {
                        Some(t) => serde_json::from_str(&t)?,
                        None => Vec::new(),
                    },
                    metadata: decode_metadata(metadata)?,
                })
            },
        )
        .collect()
}

pub async fn count_archival(db: &Database) -> Result<i64, KindredError> {
    db.connection()
        .call(|conn| {
            conn.query_row("SELECT COUNT(*) FROM archival_memories", [], |row| {
                row.get(0)
            })
        })
        .await
        .map_err(map_tr_err)
}
