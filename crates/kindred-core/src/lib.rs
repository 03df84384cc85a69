// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Kindred memory engine.
//!
//! This crate provides the error type, the memory record types that cross
//! component boundaries, and the collaborator traits (generative model and
//! persistence) that the engine is written against.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::KindredError;
pub use types::{
    AdapterType, ArchivalMemory, BlockKind, ChatMessage, CompletionRequest, DistilledMemory,
    EmotionalTexture, HealthStatus, MemoryBlock, MemoryRow, MemorySource, Metadata, Role,
};

pub use traits::{BlockStore, CompletionAdapter, MemoryRowStore, PluginAdapter};
