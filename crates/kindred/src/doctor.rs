// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `kindred doctor` command implementation.
//!
//! Runs diagnostic checks against the configuration, the memory database,
//! and the seed data directory. Nothing is written; a database that does
//! not exist yet is reported, not created.

use std::io::IsTerminal;
use std::path::Path;
use std::time::{Duration, Instant};

use kindred_config::model::KindredConfig;
use kindred_core::KindredError;

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `kindred doctor` command.
///
/// With `--deep`, also checks database integrity and allocator statistics.
/// With `--plain` or when stdout is not a terminal, prints without color.
pub async fn run_doctor(
    config: &KindredConfig,
    config_path: Option<&Path>,
    deep: bool,
    plain: bool,
) -> Result<(), KindredError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let db_path = config.storage.database_path.as_str();

    let mut results = vec![
        check_config(config_path).await,
        check_database(db_path).await,
        check_tables(db_path).await,
        check_data_dir(&config.storage.data_dir).await,
    ];
    if deep {
        results.push(check_db_integrity(db_path).await);
        results.push(check_memory_baseline().await);
    }

    println!();
    println!("  kindred doctor");
    println!("  {}", "-".repeat(50));

    let mut issues = 0;
    for result in &results {
        if result.status != CheckStatus::Pass {
            issues += 1;
        }
        println!("{}", format_result(result, use_color));
    }

    println!();
    if issues > 0 {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep for detailed diagnostics.");
        }
    } else {
        println!("  All checks passed.");
    }
    println!();

    Ok(())
}

fn format_result(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();

    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red(), result.message.red()),
        };
        format!(
            "    {symbol} {:<20} {message} ({duration_ms}ms)",
            result.name
        )
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

/// Check configuration loads without errors.
async fn check_config(path: Option<&Path>) -> CheckResult {
    let start = Instant::now();
    let loaded = match path {
        Some(path) => kindred_config::load_and_validate_path(path),
        None => kindred_config::load_and_validate(),
    };
    match loaded {
        Ok(_) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

/// Check the database file exists and answers a query.
async fn check_database(db_path: &str) -> CheckResult {
    let start = Instant::now();

    if !Path::new(db_path).exists() {
        return CheckResult::new(
            "Database",
            CheckStatus::Warn,
            format!("not found: {db_path} (created on first use)"),
            start,
        );
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => {
            return CheckResult::new(
                "Database",
                CheckStatus::Fail,
                format!("open failed: {e}"),
                start,
            );
        }
    };

    let result = conn
        .call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch("SELECT 1")?;
            Ok(())
        })
        .await;

    match result {
        Ok(()) => CheckResult::new("Database", CheckStatus::Pass, "connected", start),
        Err(e) => CheckResult::new(
            "Database",
            CheckStatus::Fail,
            format!("query failed: {e}"),
            start,
        ),
    }
}

/// Report how much each memory table holds.
async fn check_tables(db_path: &str) -> CheckResult {
    let start = Instant::now();

    if !Path::new(db_path).exists() {
        return CheckResult::new("Memory tables", CheckStatus::Warn, "no database yet", start);
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => {
            return CheckResult::new(
                "Memory tables",
                CheckStatus::Fail,
                format!("open failed: {e}"),
                start,
            );
        }
    };

    let counts = conn
        .call(|conn| -> Result<(i64, i64, i64), rusqlite::Error> {
            let count = |table: &str| {
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                    row.get::<_, i64>(0)
                })
            };
            Ok((
                count("bot_memory")?,
                count("memory_blocks")?,
                count("archival_memories")?,
            ))
        })
        .await;

    match counts {
        Ok((0, 0, 0)) => CheckResult::new(
            "Memory tables",
            CheckStatus::Warn,
            "empty; run `kindred seed` to import data",
            start,
        ),
        Ok((rows, blocks, archival)) => CheckResult::new(
            "Memory tables",
            CheckStatus::Pass,
            format!("{rows} row(s), {blocks} block(s), {archival} archival"),
            start,
        ),
        Err(e) => CheckResult::new(
            "Memory tables",
            CheckStatus::Fail,
            format!("schema missing or unreadable: {e}"),
            start,
        ),
    }
}

/// Check the seed data directory is present.
async fn check_data_dir(data_dir: &str) -> CheckResult {
    let start = Instant::now();
    match tokio::fs::metadata(data_dir).await {
        Ok(meta) if meta.is_dir() => {
            CheckResult::new("Data directory", CheckStatus::Pass, data_dir.to_string(), start)
        }
        Ok(_) => CheckResult::new(
            "Data directory",
            CheckStatus::Fail,
            format!("{data_dir} is not a directory"),
            start,
        ),
        Err(_) => CheckResult::new(
            "Data directory",
            CheckStatus::Warn,
            format!("not found: {data_dir}"),
            start,
        ),
    }
}

/// Deep check: SQLite integrity.
async fn check_db_integrity(db_path: &str) -> CheckResult {
    let start = Instant::now();

    if !Path::new(db_path).exists() {
        return CheckResult::new("DB integrity", CheckStatus::Warn, "no database yet", start);
    }

    let conn = match tokio_rusqlite::Connection::open(db_path).await {
        Ok(conn) => conn,
        Err(e) => {
            return CheckResult::new(
                "DB integrity",
                CheckStatus::Fail,
                format!("open failed: {e}"),
                start,
            );
        }
    };

    let result = conn
        .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
            let mut stmt = conn.prepare("PRAGMA integrity_check")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect()
        })
        .await;

    match result {
        Ok(rows) if rows.len() == 1 && rows[0] == "ok" => {
            CheckResult::new("DB integrity", CheckStatus::Pass, "ok", start)
        }
        Ok(rows) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("{} issue(s) found", rows.len()),
            start,
        ),
        Err(e) => CheckResult::new(
            "DB integrity",
            CheckStatus::Fail,
            format!("check failed: {e}"),
            start,
        ),
    }
}

/// Deep check: heap usage via jemalloc.
async fn check_memory_baseline() -> CheckResult {
    let start = Instant::now();

    #[cfg(not(target_env = "msvc"))]
    {
        let _ = tikv_jemalloc_ctl::epoch::advance();
        let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
        let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
        let allocated_mb = allocated as f64 / (1024.0 * 1024.0);
        let resident_mb = resident as f64 / (1024.0 * 1024.0);

        CheckResult::new(
            "Memory baseline",
            CheckStatus::Pass,
            format!("heap: {allocated_mb:.1} MB, resident: {resident_mb:.1} MB"),
            start,
        )
    }

    #[cfg(target_env = "msvc")]
    {
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Warn,
            "jemalloc not available on MSVC",
            start,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn explicit_config_file_passes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kindred.toml");
        std::fs::write(&path, "[agent]\nname = \"wren\"\n").unwrap();
        let result = check_config(Some(&path)).await;
        assert_eq!(result.status, CheckStatus::Pass);
    }

    #[tokio::test]
    async fn invalid_config_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kindred.toml");
        std::fs::write(&path, "[memory]\nstm_capacty = 3\n").unwrap();
        let result = check_config(Some(&path)).await;
        assert_eq!(result.status, CheckStatus::Fail);
        assert_eq!(result.message, "1 error(s)");
    }

    #[tokio::test]
    async fn missing_database_warns_without_creating_it() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let path_str = path.to_str().unwrap();

        assert_eq!(check_database(path_str).await.status, CheckStatus::Warn);
        assert_eq!(check_tables(path_str).await.status, CheckStatus::Warn);
        assert_eq!(check_db_integrity(path_str).await.status, CheckStatus::Warn);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn migrated_database_passes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kindred.db");
        let path_str = path.to_str().unwrap();
        let db = kindred_storage::Database::open(path_str).await.unwrap();
        db.checkpoint().await.unwrap();
        drop(db);

        assert_eq!(check_database(path_str).await.status, CheckStatus::Pass);
        assert_eq!(check_db_integrity(path_str).await.status, CheckStatus::Pass);

        let tables = check_tables(path_str).await;
        assert_eq!(tables.status, CheckStatus::Warn);
        assert!(tables.message.contains("kindred seed"));
    }

    #[tokio::test]
    async fn unmigrated_database_fails_table_check() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plain.db");
        std::fs::File::create(&path).unwrap();
        let result = check_tables(path.to_str().unwrap()).await;
        assert_eq!(result.status, CheckStatus::Fail);
    }

    #[tokio::test]
    async fn data_dir_states() {
        let dir = tempdir().unwrap();
        let dir_str = dir.path().to_str().unwrap();
        assert_eq!(check_data_dir(dir_str).await.status, CheckStatus::Pass);

        let file = dir.path().join("file.txt");
        std::fs::write(&file, "x").unwrap();
        assert_eq!(check_data_dir(file.to_str().unwrap()).await.status, CheckStatus::Fail);

        let missing = dir.path().join("missing");
        assert_eq!(check_data_dir(missing.to_str().unwrap()).await.status, CheckStatus::Warn);
    }

    #[test]
    fn plain_output_uses_tags() {
        let result = CheckResult {
            name: "Database".into(),
            status: CheckStatus::Warn,
            message: "not found".into(),
            duration: Duration::from_millis(3),
        };
        let line = format_result(&result, false);
        assert!(line.starts_with("    [WARN] Database"));
        assert!(line.ends_with("not found (3ms)"));
    }
}
