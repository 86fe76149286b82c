//! Utility functions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Version information for the tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Name of a changeset created for `stack_name` at `now`
pub fn change_set_name(stack_name: &str, now: DateTime<Utc>) -> String {
    format!("{}-{}", stack_name, now.timestamp())
}

/// Deployment version stamped at `now`; versions sort chronologically
pub fn version_from_time(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d-%H%M%S").to_string()
}

/// Bucket name derived from a prefix, the region and the account id
pub fn default_bucket_name(prefix: &str, region: &str, account_id: &str) -> String {
    format!("{}-{}-{}", prefix, region, account_id)
}
