// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Kindred memory engine.

use thiserror::Error;

/// The primary error type used across all Kindred collaborator traits and core operations.
#[derive(Debug, Error)]
pub enum KindredError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Generative-model errors (transport failure, refusal, unusable output).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Rejected caller input (empty turn text, manual memory without a summary).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl KindredError {
    /// Wrap any error as a storage failure.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        KindredError::Storage {
            source: source.into(),
        }
    }

    /// Build a provider error without an underlying cause.
    pub fn provider(message: impl Into<String>) -> Self {
        KindredError::Provider {
            message: message.into(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for KindredError {
    fn from(e: serde_json::Error) -> Self {
        KindredError::Storage {
            source: Box::new(e),
        }
    }
}
