//! Changeset based deployment

use chrono::Utc;
use stack_models::{
    ChangeSetDescription, ChangeSetType, DeploymentResult, Parameters, Tags,
    CHANGE_SET_CREATE_COMPLETE, CHANGE_SET_FAILED,
};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::cloud::status::StackWait;
use crate::cloud::{ChangeSetRequest, StackRequest};
use crate::deploy::StackEngine;
use crate::errors::DeployError;
use crate::utils::change_set_name;

impl StackEngine {
    /// Deploy `template_body` to `stack_name` through a changeset.
    ///
    /// A changeset without changes is a successful no-op and is not executed.
    /// With `dry_run` the changeset is created and left for review.
    pub async fn deploy(
        &self,
        template_body: &str,
        stack_name: &str,
        parameters: &Parameters,
        tags: &Tags,
        dry_run: bool,
    ) -> Result<DeploymentResult, DeployError> {
        self.ensure_not_cancelled("deploy")?;

        let change_set_type = if self.stack_exists(stack_name).await? {
            ChangeSetType::Update
        } else {
            ChangeSetType::Create
        };

        let request = ChangeSetRequest {
            stack: StackRequest::new(stack_name, template_body, parameters, tags),
            change_set_name: change_set_name(stack_name, Utc::now()),
            change_set_type,
        };

        info!(
            "Creating {} changeset {} for stack {}",
            change_set_type, request.change_set_name, stack_name
        );
        let handle = self
            .until_cancelled("create changeset", self.stacks.create_change_set(&request))
            .await?;

        let description = self.wait_for_change_set(&handle.id).await?;

        if !description.has_changes() {
            info!("No changes to deploy for stack {}", stack_name);
            return Ok(DeploymentResult {
                stack_id: handle.stack_id,
                change_set_id: handle.id,
                did_require_updating: false,
            });
        }

        if description.status == CHANGE_SET_FAILED {
            return Err(DeployError::ChangeSetFailed(
                description
                    .status_reason
                    .unwrap_or_else(|| format!("changeset {} failed", handle.id)),
            ));
        }

        if dry_run {
            info!(
                "Dry run: changeset {} has {} changes and was not executed",
                handle.id,
                description.changes.len()
            );
            return Ok(DeploymentResult {
                stack_id: handle.stack_id,
                change_set_id: handle.id,
                did_require_updating: true,
            });
        }

        info!("Executing changeset {}", handle.id);
        self.until_cancelled(
            "execute changeset",
            self.stacks.execute_change_set(&handle.id, stack_name),
        )
        .await?;

        let wait = match change_set_type {
            ChangeSetType::Create => StackWait::CreateComplete,
            ChangeSetType::Update => StackWait::UpdateComplete,
        };
        self.wait_with_events(&handle.stack_id, wait).await?;

        info!("Stack {} deployed", stack_name);
        Ok(DeploymentResult {
            stack_id: handle.stack_id,
            change_set_id: handle.id,
            did_require_updating: true,
        })
    }

    /// Fetch a changeset, e.g. to show the changes of a dry run
    pub async fn describe_change_set(
        &self,
        change_set: &str,
    ) -> Result<ChangeSetDescription, DeployError> {
        self.until_cancelled(
            "describe changeset",
            self.stacks.describe_change_set(change_set),
        )
        .await
    }

    /// Poll a changeset until it is ready or failed
    async fn wait_for_change_set(
        &self,
        change_set: &str,
    ) -> Result<ChangeSetDescription, DeployError> {
        let started = Instant::now();

        loop {
            let description = self.describe_change_set(change_set).await?;
            if description.status == CHANGE_SET_CREATE_COMPLETE
                || description.status == CHANGE_SET_FAILED
            {
                return Ok(description);
            }

            let waited = started.elapsed();
            if waited >= self.options.changeset_timeout {
                return Err(DeployError::Timeout {
                    change_set: change_set.to_string(),
                    awaited: vec![
                        CHANGE_SET_CREATE_COMPLETE.to_string(),
                        CHANGE_SET_FAILED.to_string(),
                    ],
                    waited,
                });
            }

            debug!("Changeset {} is {}", change_set, description.status);
            let interval = self.options.changeset_poll_interval;
            self.until_cancelled("wait for changeset", async {
                tokio::time::sleep(interval).await;
                Ok(())
            })
            .await?;
        }
    }
}
