// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
fn defaults_match_spec_documented_values() {
    let config = ShardConfig::default();
    assert_eq!(config.conditional_retry_count, 5);
    assert_eq!(config.max_auto_reset_points, 20);
}

#[test]
fn invalid_retry_count_rejected() {
    let mut config = ShardConfig::default();
    config.conditional_retry_count = 0;
    assert!(config.validate().is_err());
}

#[test]
fn warn_above_error_is_invalid() {
    let mut config = ShardConfig::default();
    config.blob_size_limit_warn = config.blob_size_limit_error + 1;
    assert!(config.validate().is_err());
}

#[test]
#[serial]
fn env_override_takes_precedence_over_default() {
    std::env::set_var("WFH_CONDITIONAL_RETRY_COUNT", "9");
    let config = ShardConfig::from_env();
    std::env::remove_var("WFH_CONDITIONAL_RETRY_COUNT");
    assert_eq!(config.conditional_retry_count, 9);
}

#[test]
fn load_from_toml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shard.toml");
    std::fs::write(&path, "conditional_retry_count = 3\n").unwrap();
    let config = ShardConfig::load(&path).unwrap();
    assert_eq!(config.conditional_retry_count, 3);
}
