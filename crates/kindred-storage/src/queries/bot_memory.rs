// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-term memory rows keyed by `(bot_id, user_id)`.
//!
//! `ltm` and `traits` are stored as JSON text. Encoding and decoding happen
//! outside the database thread.

use chrono::{DateTime, Utc};
use kindred_core::{KindredError, MemoryRow};
use rusqlite::params;

use crate::database::{map_tr_err, Database};

/// Point read of one row.
pub async fn get_row(
    db: &Database,
    bot_id: &str,
    user_id: &str,
) -> Result<Option<MemoryRow>, KindredError> {
    let (bot, user) = (bot_id.to_string(), user_id.to_string());
    let raw = db
        .connection()
        .call(move |conn| {
            let result = conn.query_row(
                "SELECT ltm, traits, updated_at FROM bot_memory
                 WHERE bot_id = ?1 AND user_id = ?2",
                params![bot, user],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            );
            match result {
                Ok(raw) => Ok(Some(raw)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?;

    let Some((ltm, traits, updated_at)) = raw else {
        return Ok(None);
    };

    Ok(Some(MemoryRow {
        bot_id: bot_id.to_string(),
        user_id: user_id.to_string(),
        ltm: serde_json::from_str(&ltm)?,
        traits: serde_json::from_str(&traits)?,
        updated_at: parse_timestamp(&updated_at)?,
    }))
}

/// Insert or replace a whole row.
pub async fn upsert_row(db: &Database, row: &MemoryRow) -> Result<(), KindredError> {
    let bot_id = row.bot_id.clone();
    let user_id = row.user_id.clone();
    let ltm = serde_json::to_string(&row.ltm)?;
    let traits = serde_json::to_string(&row.traits)?;
    let updated_at = row.updated_at.to_rfc3339();

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO bot_memory (bot_id, user_id, ltm, traits, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (bot_id, user_id) DO UPDATE SET
                     ltm = excluded.ltm,
                     traits = excluded.traits,
                     updated_at = excluded.updated_at",
                params![bot_id, user_id, ltm, traits, updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// User ids with a row for `bot_id`, sorted.
pub async fn list_users(db: &Database, bot_id: &str) -> Result<Vec<String>, KindredError> {
    let bot_id = bot_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt =
                conn.prepare("SELECT user_id FROM bot_memory WHERE bot_id = ?1 ORDER BY user_id")?;
            let rows = stmt.query_map(params![bot_id], |row| row.get(0))?;
            rows.collect::<Result<Vec<String>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Total number of rows across all bots.
pub async fn count_rows(db: &Database) -> Result<i64, KindredError> {
    db.connection()
        .call(|conn| conn.query_row("SELECT COUNT(*) FROM bot_memory", [], |row| row.get(0)))
        .await
        .map_err(map_tr_err)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, KindredError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(KindredError::storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kindred_core::{DistilledMemory, MemorySource};

    fn row(user: &str, summaries: &[&str]) -> MemoryRow {
        MemoryRow {
            bot_id: "bot".to_string(),
            user_id: user.to_string(),
            ltm: summaries
                .iter()
                .map(|s| DistilledMemory::new(*s, Some("misc".into()), MemorySource::Distilled))
                .collect(),
            traits: vec!["warm".to_string()],
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn missing_row_is_none() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(get_row(&db, "bot", "nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_then_get_preserves_memories() {
        let db = Database::open_in_memory().await.unwrap();
        let original = row("alice", &["likes tea", "has a cat"]);
        upsert_row(&db, &original).await.unwrap();

        let loaded = get_row(&db, "bot", "alice").await.unwrap().unwrap();
        assert_eq!(loaded.ltm.len(), 2);
        assert_eq!(loaded.ltm[1].summary, "has a cat");
        assert_eq!(loaded.traits, vec!["warm"]);
        assert_eq!(
            loaded.updated_at.timestamp_millis(),
            original.updated_at.timestamp_millis()
        );
    }

    #[tokio::test]
    async fn upsert_replaces_whole_row() {
        let db = Database::open_in_memory().await.unwrap();
        upsert_row(&db, &row("alice", &["one", "two"])).await.unwrap();
        upsert_row(&db, &row("alice", &["three"])).await.unwrap();

        let loaded = get_row(&db, "bot", "alice").await.unwrap().unwrap();
        assert_eq!(loaded.ltm.len(), 1);
        assert_eq!(loaded.ltm[0].summary, "three");
        assert_eq!(count_rows(&db).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rows_are_scoped_by_bot() {
        let db = Database::open_in_memory().await.unwrap();
        upsert_row(&db, &row("alice", &["x"])).await.unwrap();
        upsert_row(&db, &row("bob", &["y"])).await.unwrap();

        assert_eq!(list_users(&db, "bot").await.unwrap(), vec!["alice", "bob"]);
        assert!(list_users(&db, "other-bot").await.unwrap().is_empty());
        assert!(get_row(&db, "other-bot", "alice").await.unwrap().is_none());
    }
}
