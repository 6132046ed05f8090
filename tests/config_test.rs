use std::time::Duration;

use batchrun::config::{Config, RunConfig};
use batchrun::error::Error;

// Environment variables are process-global, so everything that touches
// BATCHRUN_* lives in this one test.
#[test]
fn env_overrides_defaults_and_rejects_garbage() {
    unsafe {
        std::env::set_var("BATCHRUN_BATCH_SIZE", "25");
        std::env::set_var("BATCHRUN_RETRY_DELAY_MS", "250");
        std::env::remove_var("BATCHRUN_MAX_RETRIES");
        std::env::remove_var("BATCHRUN_BATCH_DELAY_MS");
    }

    let config = Config::from_env().unwrap();
    assert!(!config.log_level.is_empty());
    assert_eq!(config.run.batch_size, 25);
    assert_eq!(config.run.retry_delay_ms, 250);
    assert_eq!(config.run.max_retries, 3);
    assert_eq!(config.run.batch_delay_ms, 100);

    unsafe {
        std::env::set_var("BATCHRUN_MAX_RETRIES", "lots");
    }
    let err = RunConfig::load(None).unwrap_err();
    assert!(matches!(err, Error::Config(msg) if msg.contains("BATCHRUN_MAX_RETRIES")));

    unsafe {
        std::env::remove_var("BATCHRUN_BATCH_SIZE");
        std::env::remove_var("BATCHRUN_RETRY_DELAY_MS");
        std::env::remove_var("BATCHRUN_MAX_RETRIES");
    }
}

#[test]
fn toml_run_table_overrides_defaults() {
    let run = RunConfig::from_toml(
        r#"
        [run]
        batch_size = 3
        max_retries = 5
        "#,
    )
    .unwrap();

    assert_eq!(run.batch_size, 3);
    assert_eq!(run.max_retries, 5);
    assert_eq!(run.retry_delay_ms, 1000);
    assert_eq!(run.batch_delay_ms, 100);
}

#[test]
fn empty_toml_means_defaults() {
    assert_eq!(RunConfig::from_toml("").unwrap(), RunConfig::default());
}

#[test]
fn malformed_toml_is_a_config_error() {
    let err = RunConfig::from_toml("[run]\nbatch_size = \"ten\"").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn config_file_is_read_from_disk() {
    let path = std::env::temp_dir().join(format!("batchrun-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(&path, "[run]\nbatch_delay_ms = 0\nretry_delay_ms = 10\n").unwrap();

    let run = RunConfig::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(run.batch_delay_ms, 0);
    assert_eq!(run.retry_delay_ms, 10);
}

#[test]
fn missing_config_file_is_reported() {
    let err = RunConfig::from_file(std::path::Path::new("/nonexistent/batchrun.toml")).unwrap_err();
    assert!(matches!(err, Error::Config(msg) if msg.contains("/nonexistent/batchrun.toml")));
}

#[test]
fn run_config_converts_to_options() {
    let run = RunConfig {
        batch_size: 4,
        max_retries: 2,
        retry_delay_ms: 50,
        batch_delay_ms: 0,
    };
    let options = run.to_options::<String>();

    assert_eq!(options.batch_size, 4);
    assert_eq!(options.max_retries, 2);
    assert_eq!(options.retry_delay, Duration::from_millis(50));
    assert_eq!(options.batch_delay, Duration::ZERO);
    assert!(options.cancel.is_none());
    assert!(options.validate().is_ok());
}
