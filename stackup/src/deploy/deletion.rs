//! Stack deletion

use tracing::info;

use crate::cloud::status::StackWait;
use crate::deploy::StackEngine;
use crate::errors::DeployError;

impl StackEngine {
    /// Delete `stack_name` and wait until it is gone
    pub async fn delete_stack(&self, stack_name: &str) -> Result<(), DeployError> {
        self.ensure_not_cancelled("delete")?;

        info!("Deleting stack {}", stack_name);
        self.until_cancelled("delete stack", self.stacks.delete_stack(stack_name))
            .await?;

        self.wait_with_events(stack_name, StackWait::DeleteComplete)
            .await?;

        info!("Stack {} deleted", stack_name);
        Ok(())
    }
}
