// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks constraints serde cannot express: non-empty identifiers,
//! positive capacities, and window/stride consistency.

use crate::diagnostic::ConfigError;
use crate::model::KindredConfig;

/// Validate a deserialized configuration.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &KindredConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    for (key, value) in [
        ("agent.bot_id", &config.agent.bot_id),
        ("agent.seed_user_id", &config.agent.seed_user_id),
        ("storage.database_path", &config.storage.database_path),
    ] {
        if value.trim().is_empty() {
            errors.push(ConfigError::validation(format!("{key} must not be empty")));
        }
    }

    if config.memory.stm_capacity < 2 {
        errors.push(ConfigError::validation(format!(
            "memory.stm_capacity must be at least 2 to hold one exchange, got {}",
            config.memory.stm_capacity
        )));
    }

    if config.memory.distill_interval < 2 {
        errors.push(ConfigError::validation(format!(
            "memory.distill_interval must be at least 2, got {}",
            config.memory.distill_interval
        )));
    }

    let temp = config.memory.distill_temperature;
    if !(0.0..=2.0).contains(&temp) {
        errors.push(ConfigError::validation(format!(
            "memory.distill_temperature must be within 0.0..=2.0, got {temp}"
        )));
    }

    let temp = config.prompt.reply_temperature;
    if !(0.0..=2.0).contains(&temp) {
        errors.push(ConfigError::validation(format!(
            "prompt.reply_temperature must be within 0.0..=2.0, got {temp}"
        )));
    }

    if config.recall.scan_chunk_size == 0 {
        errors.push(ConfigError::validation(
            "recall.scan_chunk_size must be at least 1",
        ));
    }

    let window = config.recall.conversation_window;
    let stride = config.recall.conversation_stride;
    if window == 0 {
        errors.push(ConfigError::validation(
            "recall.conversation_window must be at least 1",
        ));
    }
    if stride == 0 || stride > window {
        errors.push(ConfigError::validation(format!(
            "recall.conversation_stride must be between 1 and conversation_window \
             ({window}), got {stride}"
        )));
    }

    if config.agent.core_vows.iter().any(|v| v.trim().is_empty()) {
        errors.push(ConfigError::validation(
            "agent.core_vows must not contain empty entries",
        ));
    }

    for (key, list) in [
        ("affect.emotional_keywords", &config.affect.emotional_keywords),
        ("affect.intimacy_keywords", &config.affect.intimacy_keywords),
        ("affect.significant_words", &config.affect.significant_words),
    ] {
        if list.iter().any(|w| w.trim().is_empty()) {
            errors.push(ConfigError::validation(format!(
                "{key} must not contain blank entries"
            )));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
