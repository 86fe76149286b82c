//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::deploy::EngineOptions;
use crate::logs::{LogLevel, LogOptions};
use crate::storage::layout::StorageLayout;

/// Tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines on stdout
    #[serde(default)]
    pub json_logs: bool,

    /// Write rolling log files
    #[serde(default)]
    pub log_to_file: bool,

    /// Directory for rolling log files, defaults to the layout's logs dir
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Region stacks are deployed to
    #[serde(default = "default_region")]
    pub region: String,

    /// Bucket packaged templates are uploaded to
    #[serde(default)]
    pub bucket: Option<String>,

    /// Prefix of the derived bucket name when `bucket` is not set
    #[serde(default = "default_bucket_prefix")]
    pub bucket_prefix: String,

    /// Account id used to derive the bucket name
    #[serde(default)]
    pub account_id: Option<String>,

    /// Engine timings
    #[serde(default)]
    pub engine: EngineSettings,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket_prefix() -> String {
    "stackup".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            log_to_file: false,
            log_dir: None,
            region: default_region(),
            bucket: None,
            bucket_prefix: default_bucket_prefix(),
            account_id: None,
            engine: EngineSettings::default(),
        }
    }
}

impl Settings {
    pub fn log_options(&self, layout: &StorageLayout) -> LogOptions {
        let log_dir = match &self.log_dir {
            Some(dir) => Some(dir.clone()),
            None if self.log_to_file => Some(layout.logs_dir()),
            None => None,
        };

        LogOptions {
            log_level: self.log_level.clone(),
            json_format: self.json_logs,
            log_dir,
            ..Default::default()
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        self.engine.to_options()
    }
}

/// Engine polling and timeout settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_event_poll_interval")]
    pub event_poll_interval_secs: u64,

    #[serde(default = "default_changeset_poll_interval")]
    pub changeset_poll_interval_secs: u64,

    #[serde(default = "default_changeset_timeout")]
    pub changeset_timeout_secs: u64,

    #[serde(default = "default_stack_poll_interval")]
    pub stack_poll_interval_secs: u64,

    #[serde(default = "default_stack_wait_max_attempts")]
    pub stack_wait_max_attempts: u32,
}

fn default_event_poll_interval() -> u64 {
    5
}

fn default_changeset_poll_interval() -> u64 {
    5
}

fn default_changeset_timeout() -> u64 {
    20 * 60
}

fn default_stack_poll_interval() -> u64 {
    30
}

fn default_stack_wait_max_attempts() -> u32 {
    120
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            event_poll_interval_secs: default_event_poll_interval(),
            changeset_poll_interval_secs: default_changeset_poll_interval(),
            changeset_timeout_secs: default_changeset_timeout(),
            stack_poll_interval_secs: default_stack_poll_interval(),
            stack_wait_max_attempts: default_stack_wait_max_attempts(),
        }
    }
}

/// Clamp a zero setting to one
fn at_least_one(name: &str, value: u64) -> u64 {
    if value == 0 {
        warn!("{} must be at least 1, using 1", name);
        return 1;
    }
    value
}

impl EngineSettings {
    pub fn to_options(&self) -> EngineOptions {
        let secs = |name: &str, value: u64| Duration::from_secs(at_least_one(name, value));

        EngineOptions {
            event_poll_interval: secs("event_poll_interval_secs", self.event_poll_interval_secs),
            changeset_poll_interval: secs(
                "changeset_poll_interval_secs",
                self.changeset_poll_interval_secs,
            ),
            changeset_timeout: secs("changeset_timeout_secs", self.changeset_timeout_secs),
            stack_poll_interval: secs("stack_poll_interval_secs", self.stack_poll_interval_secs),
            stack_wait_max_attempts: at_least_one(
                "stack_wait_max_attempts",
                self.stack_wait_max_attempts.into(),
            ) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.region, "us-east-1");
        assert_eq!(settings.bucket_prefix, "stackup");
        assert!(settings.bucket.is_none());

        let options = settings.engine_options();
        assert_eq!(options.event_poll_interval, Duration::from_secs(5));
        assert_eq!(options.changeset_poll_interval, Duration::from_secs(5));
        assert_eq!(options.changeset_timeout, Duration::from_secs(1200));
        assert_eq!(options.stack_poll_interval, Duration::from_secs(30));
        assert_eq!(options.stack_wait_max_attempts, 120);
    }

    #[test]
    fn test_partial_engine_settings() {
        let settings: Settings = serde_json::from_str(
            r#"{"log_level": "debug", "region": "ap-southeast-2", "engine": {"changeset_timeout_secs": 60}}"#,
        )
        .unwrap();

        assert_eq!(settings.log_level, LogLevel::Debug);
        assert_eq!(settings.region, "ap-southeast-2");
        assert_eq!(settings.engine.changeset_timeout_secs, 60);
        assert_eq!(settings.engine.event_poll_interval_secs, 5);
        assert_eq!(
            settings.log_options(&StorageLayout::new("/tmp/stackup")).log_level,
            LogLevel::Debug
        );
    }

    #[test]
    fn test_zero_intervals_are_clamped() {
        let settings: Settings = serde_json::from_str(
            r#"{"engine": {"event_poll_interval_secs": 0, "changeset_poll_interval_secs": 0,
                "stack_poll_interval_secs": 0, "stack_wait_max_attempts": 0}}"#,
        )
        .unwrap();

        let options = settings.engine_options();
        assert_eq!(options.event_poll_interval, Duration::from_secs(1));
        assert_eq!(options.changeset_poll_interval, Duration::from_secs(1));
        assert_eq!(options.stack_poll_interval, Duration::from_secs(1));
        assert_eq!(options.stack_wait_max_attempts, 1);
        assert_eq!(options.changeset_timeout, Duration::from_secs(1200));
    }

    #[test]
    fn test_log_dir_falls_back_to_layout() {
        let layout = StorageLayout::new("/tmp/stackup");

        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.log_options(&layout).log_dir, None);

        let settings: Settings = serde_json::from_str(r#"{"log_to_file": true}"#).unwrap();
        assert_eq!(
            settings.log_options(&layout).log_dir,
            Some(PathBuf::from("/tmp/stackup/logs"))
        );

        let settings: Settings =
            serde_json::from_str(r#"{"log_to_file": true, "log_dir": "/var/log/stackup"}"#)
                .unwrap();
        assert_eq!(
            settings.log_options(&layout).log_dir,
            Some(PathBuf::from("/var/log/stackup"))
        );
    }
}
