//! Settings file tests

use std::time::Duration;

use stackup::logs::LogLevel;
use stackup::storage::layout::StorageLayout;
use stackup::storage::settings::Settings;
use tempfile::TempDir;

#[tokio::test]
async fn test_settings_file_in_layout() {
    let dir = TempDir::new().unwrap();
    let layout = StorageLayout::new(dir.path());
    std::fs::write(
        layout.settings_file().path(),
        r#"{
            "log_level": "warn",
            "region": "ap-southeast-2",
            "bucket": "my-templates",
            "engine": { "changeset_timeout_secs": 60, "stack_wait_max_attempts": 10 }
        }"#,
    )
    .unwrap();

    let settings: Settings = layout.settings_file().read_json().await.unwrap();
    assert_eq!(settings.log_level, LogLevel::Warn);
    assert_eq!(settings.bucket.as_deref(), Some("my-templates"));

    let options = settings.engine_options();
    assert_eq!(options.changeset_timeout, Duration::from_secs(60));
    assert_eq!(options.event_poll_interval, Duration::from_secs(5));
    assert_eq!(options.wait_policy().max_attempts, 10);
}

#[tokio::test]
async fn test_malformed_settings_file() {
    let dir = TempDir::new().unwrap();
    let layout = StorageLayout::new(dir.path());
    std::fs::write(layout.settings_file().path(), "{ region: ").unwrap();

    assert!(layout.settings_file().read_json::<Settings>().await.is_err());
}
