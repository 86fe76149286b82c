//! Remote stack, object storage and identity APIs

pub mod aws;
#[cfg(test)]
pub mod fake;
pub mod registry;
pub mod status;

use async_trait::async_trait;
use stack_models::{
    ChangeSetDescription, ChangeSetType, Parameters, StackEvent, StackSummary, Tags,
};

use crate::cloud::status::{StackStatus, StackWait};
use crate::errors::DeployError;

/// Capabilities requested on every create and update
pub const CAPABILITIES: [&str; 2] = ["CAPABILITY_IAM", "CAPABILITY_NAMED_IAM"];

/// Template, parameters and tags submitted for a stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackRequest {
    pub stack_name: String,
    pub template_body: String,
    pub parameters: Parameters,
    pub tags: Tags,
    pub capabilities: Vec<String>,
}

impl StackRequest {
    pub fn new(stack_name: &str, template_body: &str, parameters: &Parameters, tags: &Tags) -> Self {
        Self {
            stack_name: stack_name.to_string(),
            template_body: template_body.to_string(),
            parameters: parameters.clone(),
            tags: tags.clone(),
            capabilities: CAPABILITIES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Create-stack request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateStackRequest {
    pub stack: StackRequest,
    pub disable_rollback: bool,
}

/// Create-changeset request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetRequest {
    pub stack: StackRequest,
    pub change_set_name: String,
    pub change_set_type: ChangeSetType,
}

/// Identifiers returned by create-changeset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSetHandle {
    pub id: String,
    pub stack_id: String,
}

/// One page of list-stacks
#[derive(Debug, Clone, Default)]
pub struct StackPage {
    pub stacks: Vec<StackSummary>,
    pub next_token: Option<String>,
}

/// A described stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackDescription {
    pub stack_id: Option<String>,
    pub stack_name: String,
    pub status: StackStatus,
    pub outputs: Vec<(String, String)>,
}

/// Stack management API
#[async_trait]
pub trait StackApi: Send + Sync {
    /// Check that a template body parses
    async fn validate_template(&self, template_body: &str) -> Result<(), DeployError>;

    /// List stacks whose status is in `status_filter`, one page at a time
    async fn list_stacks(
        &self,
        status_filter: &[StackStatus],
        next_token: Option<String>,
    ) -> Result<StackPage, DeployError>;

    /// Create a stack, returning its id
    async fn create_stack(&self, request: &CreateStackRequest) -> Result<String, DeployError>;

    async fn create_change_set(
        &self,
        request: &ChangeSetRequest,
    ) -> Result<ChangeSetHandle, DeployError>;

    async fn describe_change_set(
        &self,
        change_set: &str,
    ) -> Result<ChangeSetDescription, DeployError>;

    async fn execute_change_set(
        &self,
        change_set: &str,
        stack_name: &str,
    ) -> Result<(), DeployError>;

    /// Most recent events of a stack, newest first
    async fn describe_stack_events(&self, stack: &str) -> Result<Vec<StackEvent>, DeployError>;

    async fn describe_stacks(&self, stack: &str) -> Result<Vec<StackDescription>, DeployError>;

    async fn delete_stack(&self, stack: &str) -> Result<(), DeployError>;

    /// Block until the stack satisfies `wait` or reaches a failure state
    async fn wait_until(&self, stack: &str, wait: StackWait) -> Result<(), DeployError>;
}

/// Object storage API
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Probe a bucket. A missing bucket is reported as `DeployError::NotFound`.
    async fn head_bucket(&self, bucket: &str) -> Result<(), DeployError>;

    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), DeployError>;

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), DeployError>;
}

/// Identity of the caller's credentials
#[async_trait]
pub trait IdentityApi: Send + Sync {
    async fn account_id(&self) -> Result<String, DeployError>;
}
