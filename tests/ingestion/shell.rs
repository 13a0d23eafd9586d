//! Shell Configuration
//!
//! Flag and config-file handling of the `lightning` binary.

use crate::common::SESSION;
use lightning_server::{ConfigError, ShellConfig};
use std::io::Write;

fn args(extra: &[&str]) -> Vec<String> {
    std::iter::once("lightning")
        .chain(extra.iter().copied())
        .map(String::from)
        .collect()
}

#[test]
fn flags_override_toml_file() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(
        file,
        "importer-addr = \"10.0.0.1:8287\"\nsession-id = \"{}\"\nbatch-size = 512\naddr = \"0.0.0.0:9000\"",
        SESSION
    )
    .unwrap();

    let config = ShellConfig::from_args(args(&[
        "--config",
        file.path().to_str().unwrap(),
        "--batch-size",
        "8",
    ]))
    .unwrap();

    assert_eq!(config.importer_addr, "10.0.0.1:8287");
    assert_eq!(config.batch_size, 8);
    assert_eq!(config.addr.port(), 9000);
    assert_eq!(config.session_id.to_string(), SESSION);
}

#[test]
fn generated_workload_size_matches_flags() {
    let config = ShellConfig::from_args(args(&[
        "--importer-addr",
        "127.0.0.1:8287",
        "--session-id",
        SESSION,
        "--key-num",
        "25",
    ]))
    .unwrap();
    let workload = config.workload();
    assert_eq!(workload.total(), 25);
    assert_eq!(workload.count(), 25);
}

#[test]
fn missing_required_flags_are_config_errors() {
    let err = ShellConfig::from_args(args(&[])).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn help_is_reported_separately() {
    let err = ShellConfig::from_args(args(&["-h"])).unwrap_err();
    assert!(matches!(err, ConfigError::Help(_)));
}
