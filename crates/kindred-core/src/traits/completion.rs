// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Generative-model collaborator.

use async_trait::async_trait;

use crate::error::KindredError;
use crate::traits::adapter::PluginAdapter;
use crate::types::CompletionRequest;

/// Opaque `complete(system, messages) -> text` call.
///
/// Implementations own prompt formatting for their provider and model
/// selection. An empty string is a valid answer; callers treat it as
/// "no output".
#[async_trait]
pub trait CompletionAdapter: PluginAdapter {
    /// Run one completion and return the raw text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, KindredError>;
}
