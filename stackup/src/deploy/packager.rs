//! Template packaging

use stack_models::StorageLocator;
use tracing::{debug, info};

use crate::deploy::StackEngine;
use crate::errors::DeployError;
use crate::filesys::file::File;

impl StackEngine {
    /// Upload the nested templates of `template_file` and return its body
    /// rewritten to reference the uploaded objects.
    ///
    /// The root and every nested template are validated before anything is
    /// uploaded. The template file on disk is never modified.
    pub async fn package(
        &self,
        template_file: &File,
        locator: &StorageLocator,
    ) -> Result<String, DeployError> {
        let path = template_file.path().display().to_string();

        let body = template_file.read_string().await.map_err(|e| {
            DeployError::ValidationError(format!("unable to read template {}: {}", path, e))
        })?;
        self.validate_template_at(&path, &body).await?;

        let references = self.templates.references(&body);
        let mut nested_templates = Vec::with_capacity(references.len());
        for reference in &references {
            let nested = template_file.sibling(&reference.path);
            debug!(
                "{} line {} references {}",
                path,
                reference.line + 1,
                nested.path().display()
            );

            let contents = nested.read_bytes().await?;
            let nested_path = nested.path().display().to_string();
            self.validate_template_at(&nested_path, &String::from_utf8_lossy(&contents))
                .await?;
            nested_templates.push((locator.object_key(&reference.path), contents));
        }

        self.ensure_bucket(&locator.bucket).await?;

        for (key, contents) in nested_templates {
            self.ensure_not_cancelled("upload nested template")?;

            debug!("Uploading s3://{}/{}", locator.bucket, key);
            self.store.put_object(&locator.bucket, &key, contents).await?;
        }

        if !references.is_empty() {
            info!("Packaged {} nested templates of {}", references.len(), path);
        }
        Ok(self.templates.rewrite(&body, locator))
    }

    async fn validate_template_at(&self, path: &str, body: &str) -> Result<(), DeployError> {
        self.ensure_not_cancelled("validate template")?;
        self.stacks.validate_template(body).await.map_err(|e| {
            DeployError::ValidationError(format!("template {} is invalid: {}", path, e))
        })
    }
}
