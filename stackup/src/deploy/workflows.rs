//! Environment and service workflows built on the engine

use std::collections::BTreeMap;

use stack_models::{DeploymentResult, Parameters, StorageLocator, Tags};
use tracing::info;

use crate::deploy::StackEngine;
use crate::errors::DeployError;
use crate::filesys::file::File;

/// A stack to package and deploy
#[derive(Debug, Clone)]
pub struct StackSpec {
    pub stack_name: String,
    pub template: File,
    pub locator: StorageLocator,
    pub parameters: Parameters,
    pub tags: Tags,
}

/// Tag carrying the deployment version
pub const VERSION_TAG: &str = "version";

/// Tag carrying the version of the tool that deployed the stack
pub const TOOL_VERSION_TAG: &str = "stackup-version";

impl StackSpec {
    /// Spec for deployment `version` of a stack.
    ///
    /// Nested templates are uploaded under `<base_prefix>/<version>` so
    /// deployments never overwrite each other's objects, and the stack is
    /// tagged with the version.
    pub fn versioned(
        stack_name: &str,
        template: File,
        bucket: &str,
        region: &str,
        base_prefix: &str,
        version: &str,
    ) -> Self {
        let prefix = format!("{}/{}", base_prefix.trim_end_matches('/'), version);
        let tags = Tags::from([
            (VERSION_TAG.to_string(), version.to_string()),
            (
                TOOL_VERSION_TAG.to_string(),
                env!("CARGO_PKG_VERSION").to_string(),
            ),
        ]);

        Self {
            stack_name: stack_name.to_string(),
            template,
            locator: StorageLocator::new(bucket, region, &prefix),
            parameters: Parameters::new(),
            tags,
        }
    }
}

/// Maps a parameter name to the parent stack output that supplies it
pub type OutputBindings = BTreeMap<String, String>;

/// Build parameters from a parent stack's outputs.
///
/// Every bound output must exist. Explicit parameters take precedence over
/// bound ones.
pub fn bind_outputs(
    outputs: &BTreeMap<String, String>,
    bindings: &OutputBindings,
    explicit: &Parameters,
) -> Result<Parameters, DeployError> {
    let mut parameters = Parameters::new();

    for (parameter, output) in bindings {
        if explicit.contains_key(parameter) {
            continue;
        }
        let value = outputs.get(output).ok_or_else(|| {
            DeployError::ValidationError(format!(
                "output {} needed for parameter {} was not found",
                output, parameter
            ))
        })?;
        parameters.insert(parameter.clone(), value.clone());
    }

    parameters.extend(explicit.iter().map(|(k, v)| (k.clone(), v.clone())));
    Ok(parameters)
}

impl StackEngine {
    /// Package the stack's template, then deploy it through a changeset
    pub async fn package_and_deploy(
        &self,
        spec: &StackSpec,
        dry_run: bool,
    ) -> Result<DeploymentResult, DeployError> {
        let body = self.package(&spec.template, &spec.locator).await?;
        self.deploy(&body, &spec.stack_name, &spec.parameters, &spec.tags, dry_run)
            .await
    }

    /// Package the stack's template, then create the stack directly
    pub async fn package_and_create(
        &self,
        spec: &StackSpec,
        dry_run: bool,
    ) -> Result<DeploymentResult, DeployError> {
        let body = self.package(&spec.template, &spec.locator).await?;
        self.create(&body, &spec.stack_name, &spec.parameters, &spec.tags, dry_run)
            .await
    }

    /// Bring an environment stack up through a changeset.
    ///
    /// A missing stack gets a create changeset, so a dry run can be reviewed
    /// before anything is provisioned.
    pub async fn environment_up(
        &self,
        spec: &StackSpec,
        dry_run: bool,
    ) -> Result<DeploymentResult, DeployError> {
        match spec.tags.get(VERSION_TAG) {
            Some(version) => info!(
                "Deploying environment stack {} at version {}",
                spec.stack_name, version
            ),
            None => info!("Deploying environment stack {}", spec.stack_name),
        }

        let result = self.package_and_deploy(spec, dry_run).await?;

        if !result.did_require_updating {
            info!("No updates were required to stack {}", spec.stack_name);
        }
        Ok(result)
    }

    /// Deploy a service stack whose parameters come partly from its
    /// environment stack's outputs
    pub async fn service_up(
        &self,
        environment_stack: &str,
        spec: &StackSpec,
        bindings: &OutputBindings,
        dry_run: bool,
    ) -> Result<DeploymentResult, DeployError> {
        let outputs = self.stack_outputs(environment_stack).await?;
        let parameters = bind_outputs(&outputs, bindings, &spec.parameters)?;

        info!("Deploying service stack {}", spec.stack_name);
        let spec = StackSpec {
            parameters,
            ..spec.clone()
        };
        let result = self.package_and_deploy(&spec, dry_run).await?;

        if !result.did_require_updating {
            info!("No updates were required to stack {}", spec.stack_name);
        }
        Ok(result)
    }

    /// Delete the dependent stacks in order, then the environment stack
    pub async fn environment_down(
        &self,
        environment_stack: &str,
        dependents: &[String],
    ) -> Result<(), DeployError> {
        for dependent in dependents {
            self.delete_stack(dependent).await?;
        }

        info!("Deleting environment stack {}", environment_stack);
        self.delete_stack(environment_stack).await
    }
}
