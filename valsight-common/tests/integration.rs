//! Integration tests for valsight-common library.

use std::io::Write;

use serde::Deserialize;
use valsight_common::{Error, LogFormat, LoggingConfig, init_tracing, load_config};

#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default)]
    logging: LoggingConfig,
}

#[test]
fn test_load_config_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(
        file,
        r#"{{
            // comments are allowed in JSON5
            logging: {{ level: "warn", format: "json" }},
        }}"#
    )
    .expect("write config");

    let config: FileConfig = load_config(file.path()).expect("load config");
    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.logging.format, LogFormat::Json);
}

#[test]
fn test_load_config_missing_file() {
    let result: valsight_common::Result<FileConfig> =
        load_config("/nonexistent/valsight/config.json5");

    match result {
        Err(Error::Config(msg)) => assert!(msg.contains("Failed to read config file")),
        other => panic!("expected config error, got {:?}", other),
    }
}

#[test]
fn test_init_tracing_twice_fails() {
    let config = LoggingConfig::default();

    // The first call may race with other tests in this binary, the second never succeeds.
    let _ = init_tracing(&config);
    let second = init_tracing(&config);
    assert!(matches!(second, Err(Error::Logging(_))));
}
