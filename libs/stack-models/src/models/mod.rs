//! Stack models

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stack parameters, passed verbatim to the remote API
pub type Parameters = BTreeMap<String, String>;

/// Stack tags, passed verbatim to the remote API
pub type Tags = BTreeMap<String, String>;

/// Outcome of a deploy or create call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentResult {
    pub stack_id: String,
    pub change_set_id: String,

    /// False when the changeset contained no changes. This is a successful no-op.
    pub did_require_updating: bool,
}

/// Where packaged templates are uploaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageLocator {
    pub bucket: String,
    pub region: String,
    pub prefix: String,
}

impl StorageLocator {
    pub fn new(
        bucket: impl Into<String>,
        region: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            prefix: prefix.into(),
        }
    }

    /// Object key for a file uploaded under this locator
    pub fn object_key(&self, path: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        let path = path.trim_start_matches('/');
        if prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{}", prefix, path)
        }
    }

    /// Absolute URL of a file uploaded under this locator
    pub fn object_url(&self, path: &str) -> String {
        format!(
            "https://s3-{}.amazonaws.com/{}/{}",
            self.region,
            self.bucket,
            self.object_key(path)
        )
    }
}

/// A nested template reference found in a template body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateReference {
    /// Path relative to the root template's directory, without any leading `./`
    pub path: String,

    /// Zero-based line number of the reference
    pub line: usize,
}

/// A stack lifecycle event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackEvent {
    pub event_id: String,
    pub stack_id: String,
    pub logical_resource_id: String,
    pub resource_type: Option<String>,
    pub resource_status: String,
    pub status_reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Changeset type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeSetType {
    Create,
    Update,
}

impl ChangeSetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeSetType::Create => "CREATE",
            ChangeSetType::Update => "UPDATE",
        }
    }
}

impl std::fmt::Display for ChangeSetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Changeset status reported once the changeset is ready
pub const CHANGE_SET_CREATE_COMPLETE: &str = "CREATE_COMPLETE";

/// Changeset status reported when the changeset could not be created
pub const CHANGE_SET_FAILED: &str = "FAILED";

/// A single proposed resource change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub action: String,
    pub logical_resource_id: String,
    pub resource_type: Option<String>,
    pub replacement: Option<String>,
}

/// Changeset description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetDescription {
    pub id: String,
    pub stack_id: String,
    pub status: String,
    pub status_reason: Option<String>,
    pub changes: Vec<Change>,
}

impl ChangeSetDescription {
    /// Whether the changeset proposes any change at all
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// One line per change, for diff views
    pub fn summary_lines(&self) -> Vec<String> {
        self.changes
            .iter()
            .map(|change| {
                let mut line = format!("{} {}", change.action, change.logical_resource_id);
                if let Some(resource_type) = &change.resource_type {
                    line.push_str(&format!(" ({})", resource_type));
                }
                if let Some(replacement) = change.replacement.as_deref() {
                    if replacement != "False" {
                        line.push_str(&format!(" replacement={}", replacement));
                    }
                }
                line
            })
            .collect()
    }
}

/// Summary of a stack returned by list-stacks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackSummary {
    pub stack_id: Option<String>,
    pub stack_name: String,
    pub stack_status: String,
}
