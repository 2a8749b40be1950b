// gitdock: Multi-repository Git sync engine
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::{Path, PathBuf};

use super::{LogConfig, LogLevel};
use crate::config::types::GlobalConfig;

#[test]
fn test_log_level_directives_scope_dependencies() {
    insta::assert_snapshot!(LogLevel::INFO.directives(), @"warn,gitdock=info");
    insta::assert_snapshot!(LogLevel::DUMP.directives(), @"trace");
    assert_eq!(LogLevel::SILENT.directives(), "off");
    assert!(LogLevel::DEBUG > LogLevel::INFO);
}

#[test]
fn test_log_level_rejects_out_of_range() {
    assert_eq!(LogLevel::new(6).unwrap(), LogLevel::DUMP);
    let err = LogLevel::new(7).unwrap_err();
    assert!(err.to_string().contains("0-6"), "got: {err}");
}

#[test]
fn test_log_level_deserialize_validates() {
    let ok: LogLevel = serde_json::from_str("4").unwrap();
    assert_eq!(ok, LogLevel::DEBUG);
    assert!(serde_json::from_str::<LogLevel>("12").is_err());
    assert_eq!(serde_json::to_string(&LogLevel::TRACE).unwrap(), "5");
}

#[test]
fn test_log_config_defaults() {
    let config = LogConfig::default();
    assert_eq!(config.console_level(), LogLevel::INFO);
    assert_eq!(config.file_level(), LogLevel::TRACE);
    assert!(config.log_file().is_none());
    assert!(config.timestamps());
    assert!(!config.json_file());
}

#[test]
fn test_log_config_from_global_section() {
    let global = GlobalConfig {
        output_log_level: LogLevel::WARN,
        file_log_level: LogLevel::DEBUG,
        log_file: Some(PathBuf::from("logs/gitdock.jsonl")),
        log_json: true,
    };

    let config = LogConfig::from(&global);

    assert_eq!(config.console_level(), LogLevel::WARN);
    assert_eq!(config.file_level(), LogLevel::DEBUG);
    assert_eq!(config.log_file(), Some(Path::new("logs/gitdock.jsonl")));
    assert!(config.json_file());
}
