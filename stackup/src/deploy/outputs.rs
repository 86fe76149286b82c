//! Stack outputs

use std::collections::BTreeMap;

use crate::deploy::StackEngine;
use crate::errors::DeployError;

impl StackEngine {
    /// Outputs published by `stack_name`, keyed by output name
    pub async fn stack_outputs(
        &self,
        stack_name: &str,
    ) -> Result<BTreeMap<String, String>, DeployError> {
        let stacks = self
            .until_cancelled("describe stacks", self.stacks.describe_stacks(stack_name))
            .await?;

        Ok(stacks
            .into_iter()
            .filter(|stack| stack.stack_name == stack_name)
            .flat_map(|stack| stack.outputs)
            .collect())
    }
}
