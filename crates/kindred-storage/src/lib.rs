// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Kindred memory engine.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, typed queries for memory rows,
//! context blocks and archival records, and one-shot seeding from JSON files.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;
pub mod seed;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use seed::{import_text_files, seed_from_dir, SeedReport};
