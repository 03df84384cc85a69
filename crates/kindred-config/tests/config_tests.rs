// SPDX-FileCopyrightText: 2026 Kindred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Kindred configuration system.

use figment::Jail;
use kindred_config::diagnostic::ConfigError;
use kindred_config::{
    load_and_validate, load_and_validate_path, load_and_validate_str, load_config_from_str,
    DistillationMode,
};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[agent]
name = "wren"
bot_id = "wren-bot"
seed_user_id = "__baseline__"
system_prompt = "You are Wren."
core_traits = ["gentle"]

[storage]
database_path = "/tmp/kindred-test.db"
wal_mode = false
data_dir = "/srv/kindred/data"

[memory]
stm_capacity = 20
distill_interval = 8
distillation_mode = "emotional"
retain_buffer_on_failure = true

[recall]
archival_limit = 5
conversation_window = 10
conversation_stride = 5

[prompt]
max_stm_messages = 10

[affect]
emotional_keywords = ["grief"]
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.agent.name, "wren");
    assert_eq!(config.agent.bot_id, "wren-bot");
    assert_eq!(config.agent.seed_user_id, "__baseline__");
    assert_eq!(config.agent.system_prompt.as_deref(), Some("You are Wren."));
    assert_eq!(config.agent.core_traits, vec!["gentle"]);
    assert!(!config.agent.core_vows.is_empty(), "unset lists keep defaults");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.storage.data_dir, "/srv/kindred/data");
    assert_eq!(config.memory.stm_capacity, 20);
    assert_eq!(config.memory.distill_interval, 8);
    assert_eq!(config.memory.distillation_mode, DistillationMode::Emotional);
    assert!(config.memory.retain_buffer_on_failure);
    assert_eq!(config.recall.archival_limit, 5);
    assert_eq!(config.recall.human_block_limit, 2);
    assert_eq!(config.prompt.max_stm_messages, 10);
    assert_eq!(config.affect.emotional_keywords, vec!["grief"]);
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_and_validate_str("").expect("defaults are valid");
    assert_eq!(config.agent.name, "kindred");
    assert_eq!(config.memory.stm_capacity, 30);
    assert_eq!(config.recall.conversation_results, 6);
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[memory]
stm_capacty = 10
"#;
    let errors = load_and_validate_str(toml).expect_err("unknown key must be rejected");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "stm_capacty");
            assert_eq!(suggestion.as_deref(), Some("stm_capacity"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telegram]\nbot_token = \"x\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[memory]\nstm_capacity = \"lots\"\n").unwrap_err();
    match &errors[0] {
        ConfigError::InvalidType { key, .. } => assert!(key.ends_with("stm_capacity")),
        other => panic!("expected InvalidType, got {other:?}"),
    }
}

#[test]
fn unknown_distillation_mode_is_rejected() {
    let result = load_and_validate_str("[memory]\ndistillation_mode = \"poetic\"\n");
    assert!(result.is_err());
}

#[test]
fn validation_runs_after_deserialization() {
    let toml = r#"
[recall]
conversation_window = 4
conversation_stride = 9
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert!(errors[0].to_string().contains("conversation_stride"));
}

#[test]
fn explicit_path_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, "[agent]\nbot_id = \"from-file\"\n").unwrap();

    let config = load_and_validate_path(&path).expect("file config is valid");
    assert_eq!(config.agent.bot_id, "from-file");
}

#[test]
fn local_file_and_env_layer_over_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "kindred.toml",
            r#"
[agent]
bot_id = "local-bot"

[memory]
distill_interval = 6
"#,
        )?;
        jail.set_env("KINDRED_MEMORY_DISTILL_INTERVAL", "4");
        jail.set_env("KINDRED_AGENT_SEED_USER_ID", "__env_seed__");

        let config = load_and_validate().expect("layered config is valid");
        assert_eq!(config.agent.bot_id, "local-bot");
        assert_eq!(config.memory.distill_interval, 4, "env overrides file");
        assert_eq!(config.agent.seed_user_id, "__env_seed__");
        Ok(())
    });
}

#[test]
fn local_file_errors_are_diagnosed() {
    Jail::expect_with(|jail| {
        jail.create_file("kindred.toml", "[prompt]\nmax_stm_mesages = 3\n")?;

        let errors = load_and_validate().expect_err("typo must be rejected");
        match &errors[0] {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => {
                assert_eq!(key, "max_stm_mesages");
                assert_eq!(suggestion.as_deref(), Some("max_stm_messages"));
            }
            other => panic!("expected UnknownKey, got {other:?}"),
        }
        Ok(())
    });
}
