//! AWS implementations of the remote APIs

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_cloudformation::client::Waiters;
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::primitives::DateTime as AwsDateTime;
use aws_sdk_cloudformation::types::{
    Capability, ChangeSetStatus as AwsChangeSetStatus, ChangeSetType as AwsChangeSetType,
    Parameter, ResourceStatus as AwsResourceStatus, StackStatus as AwsStackStatus, Tag,
};
use aws_sdk_cloudformation::waiters::stack_create_complete::WaitUntilStackCreateCompleteError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use chrono::{DateTime, Utc};
use stack_models::{Change, ChangeSetDescription, Parameters, StackEvent, StackSummary, Tags};
use tracing::debug;

use crate::cloud::status::{StackStatus, StackWait};
use crate::cloud::{
    ChangeSetHandle, ChangeSetRequest, CreateStackRequest, IdentityApi, ObjectStore, StackApi,
    StackDescription, StackPage,
};
use crate::errors::DeployError;

/// Region that rejects an explicit location constraint
const DEFAULT_REGION: &str = "us-east-1";

/// How long the stack waiters may run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl WaitPolicy {
    /// Upper bound handed to the SDK waiters
    pub fn max_wait(&self) -> Duration {
        self.interval.saturating_mul(self.max_attempts.max(1))
    }
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            max_attempts: 120,
        }
    }
}

fn remote_error<E>(operation: &str, err: E) -> DeployError
where
    E: std::error::Error,
{
    DeployError::RemoteError(format!("{}: {}", operation, DisplayErrorContext(err)))
}

// SDK getters return either `&str` or `Option<&str>` depending on whether the
// member is required in the service model.
fn text<'a>(value: impl Into<Option<&'a str>>) -> String {
    value.into().unwrap_or_default().to_string()
}

fn opt_text<'a>(value: impl Into<Option<&'a str>>) -> Option<String> {
    value.into().map(str::to_string)
}

fn field<'a, T: 'a>(value: impl Into<Option<&'a T>>) -> Option<&'a T> {
    value.into()
}

fn to_chrono(value: Option<&AwsDateTime>) -> DateTime<Utc> {
    value
        .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
        .unwrap_or_default()
}

fn aws_parameters(parameters: &Parameters) -> Vec<Parameter> {
    parameters
        .iter()
        .map(|(k, v)| Parameter::builder().parameter_key(k).parameter_value(v).build())
        .collect()
}

fn aws_tags(tags: &Tags) -> Vec<Tag> {
    tags.iter()
        .map(|(k, v)| Tag::builder().key(k).value(v).build())
        .collect()
}

fn aws_capabilities(capabilities: &[String]) -> Vec<Capability> {
    capabilities
        .iter()
        .map(|c| Capability::from(c.as_str()))
        .collect()
}

/// CloudFormation backed stack API
#[derive(Debug, Clone)]
pub struct CloudFormationClient {
    client: aws_sdk_cloudformation::Client,
    wait_policy: WaitPolicy,
}

impl CloudFormationClient {
    pub fn new(config: &aws_config::SdkConfig, wait_policy: WaitPolicy) -> Self {
        Self {
            client: aws_sdk_cloudformation::Client::new(config),
            wait_policy,
        }
    }
}

#[async_trait]
impl StackApi for CloudFormationClient {
    async fn validate_template(&self, template_body: &str) -> Result<(), DeployError> {
        self.client
            .validate_template()
            .template_body(template_body)
            .send()
            .await
            .map_err(|e| remote_error("validate-template", e))?;
        Ok(())
    }

    async fn list_stacks(
        &self,
        status_filter: &[StackStatus],
        next_token: Option<String>,
    ) -> Result<StackPage, DeployError> {
        let filter = status_filter
            .iter()
            .map(|s| AwsStackStatus::from(s.as_str()))
            .collect();

        let output = self
            .client
            .list_stacks()
            .set_stack_status_filter(Some(filter))
            .set_next_token(next_token)
            .send()
            .await
            .map_err(|e| remote_error("list-stacks", e))?;

        let stacks = output
            .stack_summaries()
            .iter()
            .map(|s| StackSummary {
                stack_id: opt_text(s.stack_id()),
                stack_name: text(s.stack_name()),
                stack_status: field::<AwsStackStatus>(s.stack_status())
                    .map(|status| status.as_str().to_string())
                    .unwrap_or_default(),
            })
            .collect();

        Ok(StackPage {
            stacks,
            next_token: output.next_token().map(str::to_string),
        })
    }

    async fn create_stack(&self, request: &CreateStackRequest) -> Result<String, DeployError> {
        let stack = &request.stack;
        let output = self
            .client
            .create_stack()
            .stack_name(&stack.stack_name)
            .template_body(&stack.template_body)
            .disable_rollback(request.disable_rollback)
            .set_parameters(Some(aws_parameters(&stack.parameters)))
            .set_tags(Some(aws_tags(&stack.tags)))
            .set_capabilities(Some(aws_capabilities(&stack.capabilities)))
            .send()
            .await
            .map_err(|e| remote_error("create-stack", e))?;

        Ok(text(output.stack_id()))
    }

    async fn create_change_set(
        &self,
        request: &ChangeSetRequest,
    ) -> Result<ChangeSetHandle, DeployError> {
        let stack = &request.stack;
        let output = self
            .client
            .create_change_set()
            .stack_name(&stack.stack_name)
            .change_set_name(&request.change_set_name)
            .change_set_type(AwsChangeSetType::from(request.change_set_type.as_str()))
            .template_body(&stack.template_body)
            .use_previous_template(false)
            .set_parameters(Some(aws_parameters(&stack.parameters)))
            .set_tags(Some(aws_tags(&stack.tags)))
            .set_capabilities(Some(aws_capabilities(&stack.capabilities)))
            .send()
            .await
            .map_err(|e| remote_error("create-change-set", e))?;

        Ok(ChangeSetHandle {
            id: text(output.id()),
            stack_id: text(output.stack_id()),
        })
    }

    async fn describe_change_set(
        &self,
        change_set: &str,
    ) -> Result<ChangeSetDescription, DeployError> {
        let output = self
            .client
            .describe_change_set()
            .change_set_name(change_set)
            .send()
            .await
            .map_err(|e| remote_error("describe-change-set", e))?;

        let changes = output
            .changes()
            .iter()
            .filter_map(|c| c.resource_change())
            .map(|rc| Change {
                action: rc.action().map(|a| a.as_str().to_string()).unwrap_or_default(),
                logical_resource_id: text(rc.logical_resource_id()),
                resource_type: opt_text(rc.resource_type()),
                replacement: rc.replacement().map(|r| r.as_str().to_string()),
            })
            .collect();

        Ok(ChangeSetDescription {
            id: opt_text(output.change_set_id()).unwrap_or_else(|| change_set.to_string()),
            stack_id: text(output.stack_id()),
            status: field::<AwsChangeSetStatus>(output.status())
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            status_reason: opt_text(output.status_reason()),
            changes,
        })
    }

    async fn execute_change_set(
        &self,
        change_set: &str,
        stack_name: &str,
    ) -> Result<(), DeployError> {
        self.client
            .execute_change_set()
            .change_set_name(change_set)
            .stack_name(stack_name)
            .send()
            .await
            .map_err(|e| remote_error("execute-change-set", e))?;
        Ok(())
    }

    async fn describe_stack_events(&self, stack: &str) -> Result<Vec<StackEvent>, DeployError> {
        let output = self
            .client
            .describe_stack_events()
            .stack_name(stack)
            .send()
            .await
            .map_err(|e| remote_error("describe-stack-events", e))?;

        let events = output
            .stack_events()
            .iter()
            .map(|e| StackEvent {
                event_id: text(e.event_id()),
                stack_id: text(e.stack_id()),
                logical_resource_id: text(e.logical_resource_id()),
                resource_type: opt_text(e.resource_type()),
                resource_status: field::<AwsResourceStatus>(e.resource_status())
                    .map(|s| s.as_str().to_string())
                    .unwrap_or_default(),
                status_reason: opt_text(e.resource_status_reason()),
                timestamp: to_chrono(field::<AwsDateTime>(e.timestamp())),
            })
            .collect();

        Ok(events)
    }

    async fn describe_stacks(&self, stack: &str) -> Result<Vec<StackDescription>, DeployError> {
        let output = match self.client.describe_stacks().stack_name(stack).send().await {
            Ok(output) => output,
            Err(err) => {
                let missing = err
                    .as_service_error()
                    .map(|e| {
                        e.code() == Some("ValidationError")
                            && e.message().is_some_and(|m| m.contains("does not exist"))
                    })
                    .unwrap_or(false);

                if missing {
                    return Err(DeployError::NotFound(format!("stack {}", stack)));
                }
                return Err(remote_error("describe-stacks", err));
            }
        };

        let stacks = output
            .stacks()
            .iter()
            .map(|s| StackDescription {
                stack_id: opt_text(s.stack_id()),
                stack_name: text(s.stack_name()),
                status: field::<AwsStackStatus>(s.stack_status())
                    .map(|status| StackStatus::from(status.as_str()))
                    .unwrap_or_else(|| StackStatus::Other(String::new())),
                outputs: s
                    .outputs()
                    .iter()
                    .filter_map(|o| {
                        Some((o.output_key()?.to_string(), o.output_value()?.to_string()))
                    })
                    .collect(),
            })
            .collect();

        Ok(stacks)
    }

    async fn delete_stack(&self, stack: &str) -> Result<(), DeployError> {
        self.client
            .delete_stack()
            .stack_name(stack)
            .send()
            .await
            .map_err(|e| remote_error("delete-stack", e))?;
        Ok(())
    }

    async fn wait_until(&self, stack: &str, wait: StackWait) -> Result<(), DeployError> {
        let max_wait = self.wait_policy.max_wait();
        debug!("Waiting up to {:?} for {} on {}", max_wait, wait.name(), stack);

        // All three waiters poll describe-stacks, so they share one error type
        let result = match wait {
            StackWait::CreateComplete => self
                .client
                .wait_until_stack_create_complete()
                .stack_name(stack)
                .wait(max_wait)
                .await
                .map(|_| ()),
            StackWait::UpdateComplete => self
                .client
                .wait_until_stack_update_complete()
                .stack_name(stack)
                .wait(max_wait)
                .await
                .map(|_| ()),
            StackWait::DeleteComplete => self
                .client
                .wait_until_stack_delete_complete()
                .stack_name(stack)
                .wait(max_wait)
                .await
                .map(|_| ()),
        };

        result.map_err(|e| wait_error(stack, wait, max_wait, e))
    }
}

fn wait_error(
    stack: &str,
    wait: StackWait,
    max_wait: Duration,
    err: WaitUntilStackCreateCompleteError,
) -> DeployError {
    match err {
        WaitUntilStackCreateCompleteError::FailureState(_) => DeployError::StackFailed(format!(
            "{} reached a failure state while waiting for {}",
            stack,
            wait.name()
        )),
        WaitUntilStackCreateCompleteError::ExceededMaxWait(_) => DeployError::StackFailed(format!(
            "{} did not reach {} within {:?}",
            stack,
            wait.name(),
            max_wait
        )),
        other => remote_error(wait.name(), other),
    }
}

/// STS backed caller identity
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    client: aws_sdk_sts::Client,
}

impl CallerIdentity {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_sts::Client::new(config),
        }
    }
}

#[async_trait]
impl IdentityApi for CallerIdentity {
    async fn account_id(&self) -> Result<String, DeployError> {
        let output = self
            .client
            .get_caller_identity()
            .send()
            .await
            .map_err(|e| remote_error("get-caller-identity", e))?;

        output
            .account()
            .map(str::to_string)
            .ok_or_else(|| DeployError::RemoteError("get-caller-identity: no account".to_string()))
    }
}

/// S3 backed object store
#[derive(Debug, Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(config: &aws_config::SdkConfig) -> Self {
        Self {
            client: aws_sdk_s3::Client::new(config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn head_bucket(&self, bucket: &str) -> Result<(), DeployError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(()),
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_not_found())
                    .unwrap_or(false);

                if not_found {
                    Err(DeployError::NotFound(format!("bucket {}", bucket)))
                } else {
                    Err(remote_error("head-bucket", err))
                }
            }
        }
    }

    async fn create_bucket(&self, bucket: &str, region: &str) -> Result<(), DeployError> {
        let mut request = self.client.create_bucket().bucket(bucket);

        if region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(region))
                    .build(),
            );
        }

        request
            .send()
            .await
            .map_err(|e| remote_error("create-bucket", e))?;
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<(), DeployError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| remote_error("put-object", e))?;
        Ok(())
    }
}
