// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Kindred integration tests.
//!
//! Provides mock collaborators for fast, deterministic tests without a
//! model provider or a database file.
//!
//! # Components
//!
//! - [`MockCompletion`] - Mock generative model with queued responses and call capture
//! - [`MockStore`] - In-memory row and block store with failure injection

pub mod mock_completion;
pub mod mock_store;

pub use mock_completion::MockCompletion;
pub use mock_store::MockStore;
