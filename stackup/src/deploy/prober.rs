//! Stack existence probe

use tracing::debug;

use crate::cloud::status::{StackStatus, ALIVE_STATUSES};
use crate::deploy::StackEngine;
use crate::errors::DeployError;

impl StackEngine {
    /// Whether a stack named `stack_name` exists in any live state.
    ///
    /// Deleted stacks do not count, so a torn-down name can be created again.
    pub async fn stack_exists(&self, stack_name: &str) -> Result<bool, DeployError> {
        let mut next_token: Option<String> = None;

        loop {
            self.ensure_not_cancelled("list stacks")?;
            let page = self.stacks.list_stacks(&ALIVE_STATUSES, next_token).await?;

            let found = page.stacks.iter().any(|s| {
                s.stack_name == stack_name && StackStatus::from(s.stack_status.as_str()).is_alive()
            });
            if found {
                debug!("Stack {} exists", stack_name);
                return Ok(true);
            }

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        debug!("Stack {} does not exist", stack_name);
        Ok(false)
    }
}
