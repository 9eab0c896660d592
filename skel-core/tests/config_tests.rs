//! Settings load/save integration tests.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use skel_core::{config, CoreError, InputFile, SkelConfig};

// ---------------------------------------------------------------------------
// 1. First run
// ---------------------------------------------------------------------------

#[test]
fn missing_settings_are_populated_and_reported_not_edited() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.child("skelenox").child(config::SETTINGS_FILE);

    let err = config::load_at(path.path()).unwrap_err();
    assert!(matches!(err, CoreError::NotEdited { .. }), "got: {err}");
    assert!(err.to_string().contains("skelsettings.json"));

    path.assert(predicate::path::exists());
    path.assert(predicate::str::contains("\"edit_flag\": false"));
    path.assert(predicate::str::contains("\"sync_frequency\": 1000"));
}

#[test]
fn unedited_settings_are_rejected() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.child(config::SETTINGS_FILE);
    path.write_str(r#"{"edit_flag": false, "poli_server": "x"}"#)
        .expect("write");

    let err = config::load_at(path.path()).unwrap_err();
    assert!(matches!(err, CoreError::NotEdited { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// 2. Edited settings
// ---------------------------------------------------------------------------

#[test]
fn edited_settings_load_with_defaults_for_missing_keys() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.child(config::SETTINGS_FILE);
    path.write_str(
        r#"{
            "edit_flag": true,
            "poli_server": "127.0.0.1",
            "poli_port": 5000,
            "poli_remote_path": "/api/1.0/",
            "poli_apikey": "k",
            "debug_http": true,
            "sync_frequency": 250,
            "some_future_key": [1, 2, 3]
        }"#,
    )
    .expect("write");

    let config = config::load_at(path.path()).expect("load");
    assert_eq!(config.poli_port, 5000);
    assert_eq!(config.sync_frequency, 250);
    assert_eq!(config.username, "Anonymous");
    assert!(!config.initial_sync);
}

#[test]
fn corrupt_settings_report_parse_error_with_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.child(config::SETTINGS_FILE);
    path.write_str("{ not json").expect("write");

    let err = config::load_at(path.path()).unwrap_err();
    assert!(matches!(err, CoreError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("skelsettings.json"));
}

#[test]
fn save_then_load_roundtrip_and_tmp_cleanup() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let path = dir.child(config::SETTINGS_FILE);
    let config = SkelConfig {
        edit_flag: true,
        poli_server: "poli".to_string(),
        initial_sync: true,
        ..SkelConfig::default()
    };
    config::save_at(path.path(), &config).expect("save");

    let loaded = config::load_at(path.path()).expect("load");
    assert_eq!(loaded, config);
    dir.child("skelsettings.json.tmp")
        .assert(predicate::path::missing());
}

// ---------------------------------------------------------------------------
// 3. Input file identity
// ---------------------------------------------------------------------------

#[test]
fn input_file_md5_is_lowercase_hex() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let bin = dir.child("sample.exe");
    bin.write_binary(b"abc").expect("write");

    let input = InputFile::from_path(bin.path()).expect("hash");
    assert_eq!(input.md5, "900150983cd24fb0d6963f7d28e17f72");
    assert_eq!(input.file_name(), "sample.exe");
}

#[test]
fn input_file_missing_reports_io_error() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let err = InputFile::from_path(dir.path().join("nope.bin")).unwrap_err();
    assert!(matches!(err, CoreError::Io { .. }), "got: {err}");
}
