// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Lookup order: `./kindred.toml` > `~/.config/kindred/kindred.toml` >
//! `/etc/kindred/kindred.toml`, with `KINDRED_` environment overrides on top.

// figment::Error is external and cannot be boxed without a wrapper.
#![allow(clippy::result_large_err)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::KindredConfig;

/// Config sections that environment variables can address.
const SECTIONS: &[&str] = &["agent", "storage", "memory", "recall", "prompt", "affect"];

/// System-wide config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/kindred/kindred.toml";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "kindred.toml";

/// Per-user config file under the XDG config directory.
pub fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("kindred/kindred.toml"))
        .unwrap_or_default()
}

/// Load configuration from the standard hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/kindred/kindred.toml`
/// 3. `~/.config/kindred/kindred.toml`
/// 4. `./kindred.toml`
/// 5. `KINDRED_*` environment variables
pub fn load_config() -> Result<KindredConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string over the compiled defaults.
///
/// No files and no environment variables are consulted.
pub fn load_config_from_str(toml_content: &str) -> Result<KindredConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KindredConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from one explicit file with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<KindredConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(KindredConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full provider stack before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(KindredConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Render the effective configuration as TOML.
pub fn to_toml_string(config: &KindredConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(config)
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` instead of `Env::split("_")` because key names contain
/// underscores: `KINDRED_MEMORY_STM_CAPACITY` must become
/// `memory.stm_capacity`, not `memory.stm.capacity`.
fn env_provider() -> Env {
    Env::prefixed("KINDRED_").map(|key| map_env_key(key.as_str()).into())
}

/// Map a lowercased, prefix-stripped env key to a dotted config path.
fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
