//! Direct stack creation

use stack_models::{DeploymentResult, Parameters, Tags};
use tracing::info;

use crate::cloud::status::StackWait;
use crate::cloud::{CreateStackRequest, StackRequest};
use crate::deploy::StackEngine;
use crate::errors::DeployError;

impl StackEngine {
    /// Create `stack_name` directly, with rollback disabled so a failed
    /// bootstrap leaves its resources around for inspection.
    ///
    /// Nothing can be previewed without a changeset, so a dry run submits
    /// nothing and reports that an update would be required.
    pub async fn create(
        &self,
        template_body: &str,
        stack_name: &str,
        parameters: &Parameters,
        tags: &Tags,
        dry_run: bool,
    ) -> Result<DeploymentResult, DeployError> {
        self.ensure_not_cancelled("create")?;

        if dry_run {
            info!("Dry run: stack {} would be created", stack_name);
            return Ok(DeploymentResult {
                did_require_updating: true,
                ..Default::default()
            });
        }

        let request = CreateStackRequest {
            stack: StackRequest::new(stack_name, template_body, parameters, tags),
            disable_rollback: true,
        };

        info!("Creating stack {}", stack_name);
        let stack_id = self
            .until_cancelled("create stack", self.stacks.create_stack(&request))
            .await?;

        self.wait_with_events(&stack_id, StackWait::CreateComplete)
            .await?;

        info!("Stack {} created", stack_name);
        Ok(DeploymentResult {
            stack_id,
            change_set_id: String::new(),
            did_require_updating: true,
        })
    }
}
