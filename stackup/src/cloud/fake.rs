//! Scripted in-memory remote APIs for tests

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use stack_models::{Change, ChangeSetDescription, StackEvent, StackSummary};

use crate::cloud::status::{StackStatus, StackWait};
use crate::cloud::{
    ChangeSetHandle, ChangeSetRequest, CreateStackRequest, IdentityApi, ObjectStore, StackApi,
    StackDescription, StackPage,
};
use crate::errors::DeployError;

/// Account reported by the fake identity
pub const ACCOUNT_ID: &str = "123456789012";

/// What head-bucket reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BucketState {
    #[default]
    Exists,
    Missing,
    Forbidden,
}

/// Scripted stack and object store
#[derive(Default)]
pub struct FakeCloud {
    /// Stacks returned by list-stacks (already filtered by the caller's statuses)
    pub stacks: Mutex<Vec<StackSummary>>,
    /// List every stack regardless of the requested statuses
    pub ignore_status_filter: Mutex<bool>,
    /// Summaries per list-stacks page
    pub page_size: Mutex<Option<usize>>,
    /// Statuses returned by successive describe-changeset calls; the last one repeats
    pub change_set_statuses: Mutex<VecDeque<String>>,
    /// Changes reported for the created changeset
    pub changes: Mutex<Vec<Change>>,
    /// Successive describe-stack-events responses; the last one repeats
    pub event_batches: Mutex<VecDeque<Result<Vec<StackEvent>, String>>>,
    /// Outputs per stack name
    pub outputs: Mutex<Vec<(String, Vec<(String, String)>)>>,
    pub bucket: Mutex<BucketState>,
    pub reject_templates: Mutex<bool>,
    /// Reject only template bodies containing this text
    pub reject_marker: Mutex<Option<String>>,
    pub fail_uploads: Mutex<bool>,
    pub fail_delete: Mutex<bool>,
    pub fail_identity: Mutex<bool>,
    /// Error returned by wait-until
    pub wait_failure: Mutex<Option<String>>,
    /// Simulated duration of wait-until
    pub wait_delay: Mutex<Duration>,

    pub calls: Mutex<Vec<String>>,
    pub change_set_requests: Mutex<Vec<ChangeSetRequest>>,
    pub create_requests: Mutex<Vec<CreateStackRequest>>,
    pub uploads: Mutex<Vec<(String, String, Vec<u8>)>>,
    pub waits: Mutex<Vec<(String, StackWait)>>,
}

impl FakeCloud {
    pub fn with_stack(self, name: &str) -> Self {
        self.stacks.lock().unwrap().push(StackSummary {
            stack_id: Some(format!("arn:stack/{}", name)),
            stack_name: name.to_string(),
            stack_status: StackStatus::UpdateComplete.to_string(),
        });
        self
    }

    pub fn with_changes(self, changes: usize) -> Self {
        *self.changes.lock().unwrap() = (0..changes)
            .map(|i| Change {
                action: "Add".to_string(),
                logical_resource_id: format!("Resource{}", i),
                resource_type: Some("AWS::SNS::Topic".to_string()),
                replacement: None,
            })
            .collect();
        self
    }

    pub fn with_change_set_statuses(self, statuses: &[&str]) -> Self {
        *self.change_set_statuses.lock().unwrap() =
            statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_event_batches(self, batches: Vec<Result<Vec<StackEvent>, String>>) -> Self {
        *self.event_batches.lock().unwrap() = batches.into();
        self
    }

    pub fn with_bucket(self, state: BucketState) -> Self {
        *self.bucket.lock().unwrap() = state;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == operation)
            .count()
    }

    fn record(&self, operation: &str) {
        self.calls.lock().unwrap().push(operation.to_string());
    }
}

/// Build an event whose timestamp is `seconds` after a fixed epoch
pub fn event(id: &str, logical_id: &str, status: &str, seconds: i64) -> StackEvent {
    StackEvent {
        event_id: id.to_string(),
        stack_id: "arn:stack/demo".to_string(),
        logical_resource_id: logical_id.to_string(),
        resource_type: None,
        resource_status: status.to_string(),
        status_reason: None,
        timestamp: Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap(),
    }
}

#[async_trait]
impl StackApi for FakeCloud {
    async fn validate_template(&self, template_body: &str) -> Result<(), DeployError> {
        self.record("validate-template");
        let marked = self
            .reject_marker
            .lock()
            .unwrap()
            .as_deref()
            .is_some_and(|m| template_body.contains(m));
        if marked || *self.reject_templates.lock().unwrap() {
            return Err(DeployError::RemoteError("Template format error".to_string()));
        }
        Ok(())
    }

    async fn list_stacks(
        &self,
        status_filter: &[StackStatus],
        next_token: Option<String>,
    ) -> Result<StackPage, DeployError> {
        self.record("list-stacks");
        let unfiltered = *self.ignore_status_filter.lock().unwrap();
        let matching: Vec<StackSummary> = self
            .stacks
            .lock()
            .unwrap()
            .iter()
            .filter(|s| {
                unfiltered || status_filter.contains(&StackStatus::from(s.stack_status.as_str()))
            })
            .cloned()
            .collect();

        let start: usize = next_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let size = self.page_size.lock().unwrap().unwrap_or(usize::MAX);
        let end = start.saturating_add(size).min(matching.len());

        Ok(StackPage {
            stacks: matching[start..end].to_vec(),
            next_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn create_stack(&self, request: &CreateStackRequest) -> Result<String, DeployError> {
        self.record("create-stack");
        self.create_requests.lock().unwrap().push(request.clone());
        Ok(format!("arn:stack/{}", request.stack.stack_name))
    }

    async fn create_change_set(
        &self,
        request: &ChangeSetRequest,
    ) -> Result<ChangeSetHandle, DeployError> {
        self.record("create-change-set");
        self.change_set_requests.lock().unwrap().push(request.clone());
        Ok(ChangeSetHandle {
            id: format!("arn:changeSet/{}", request.change_set_name),
            stack_id: format!("arn:stack/{}", request.stack.stack_name),
        })
    }

    async fn describe_change_set(
        &self,
        change_set: &str,
    ) -> Result<ChangeSetDescription, DeployError> {
        self.record("describe-change-set");
        let status = {
            let mut statuses = self.change_set_statuses.lock().unwrap();
            if statuses.len() > 1 {
                statuses.pop_front().unwrap()
            } else {
                statuses
                    .front()
                    .cloned()
                    .unwrap_or_else(|| "CREATE_COMPLETE".to_string())
            }
        };

        Ok(ChangeSetDescription {
            id: change_set.to_string(),
            stack_id: "arn:stack/demo".to_string(),
            status,
            status_reason: None,
            changes: self.changes.lock().unwrap().clone(),
        })
    }

    async fn execute_change_set(
        &self,
        _change_set: &str,
        _stack_name: &str,
    ) -> Result<(), DeployError> {
        self.record("execute-change-set");
        Ok(())
    }

    async fn describe_stack_events(&self, _stack: &str) -> Result<Vec<StackEvent>, DeployError> {
        self.record("describe-stack-events");
        let mut batches = self.event_batches.lock().unwrap();
        let batch = if batches.len() > 1 {
            batches.pop_front().unwrap()
        } else {
            batches.front().cloned().unwrap_or_else(|| Ok(Vec::new()))
        };
        batch.map_err(DeployError::RemoteError)
    }

    async fn describe_stacks(&self, stack: &str) -> Result<Vec<StackDescription>, DeployError> {
        self.record("describe-stacks");
        Ok(self
            .outputs
            .lock()
            .unwrap()
            .iter()
            .map(|(name, outputs)| StackDescription {
                stack_id: Some(format!("arn:stack/{}", name)),
                stack_name: name.clone(),
                status: StackStatus::UpdateComplete,
                outputs: outputs.clone(),
            })
            .filter(|s| s.stack_name == stack)
            .collect())
    }

    async fn delete_stack(&self, _stack: &str) -> Result<(), DeployError> {
        self.record("delete-stack");
        if *self.fail_delete.lock().unwrap() {
            return Err(DeployError::RemoteError("delete-stack: AccessDenied".to_string()));
        }
        Ok(())
    }

    async fn wait_until(&self, stack: &str, wait: StackWait) -> Result<(), DeployError> {
        self.record("wait-until");
        self.waits.lock().unwrap().push((stack.to_string(), wait));
        let delay = *self.wait_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        match self.wait_failure.lock().unwrap().clone() {
            Some(reason) => Err(DeployError::StackFailed(reason)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for FakeCloud {
    async fn head_bucket(&self, bucket: &str) -> Result<(), DeployError> {
        self.record("head-bucket");
        match *self.bucket.lock().unwrap() {
            BucketState::Exists => Ok(()),
            BucketState::Missing => Err(DeployError::NotFound(format!("bucket {}", bucket))),
            BucketState::Forbidden => Err(DeployError::RemoteError("Forbidden".to_string())),
        }
    }

    async fn create_bucket(&self, _bucket: &str, _region: &str) -> Result<(), DeployError> {
        self.record("create-bucket");
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), DeployError> {
        self.record("put-object");
        if *self.fail_uploads.lock().unwrap() {
            return Err(DeployError::RemoteError("put-object: connection reset".to_string()));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((bucket.to_string(), key.to_string(), body));
        Ok(())
    }
}

#[async_trait]
impl IdentityApi for FakeCloud {
    async fn account_id(&self) -> Result<String, DeployError> {
        self.record("get-caller-identity");
        if *self.fail_identity.lock().unwrap() {
            return Err(DeployError::RemoteError("get-caller-identity: ExpiredToken".to_string()));
        }
        Ok(ACCOUNT_ID.to_string())
    }
}
