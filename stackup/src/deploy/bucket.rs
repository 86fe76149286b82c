//! Bucket provisioning

use tracing::{debug, info};

use crate::cloud::IdentityApi;
use crate::deploy::StackEngine;
use crate::errors::DeployError;
use crate::utils::default_bucket_name;

/// Name of the default artifact bucket for `region`.
///
/// The account id is looked up from the caller's credentials unless one is
/// configured.
pub async fn default_bucket(
    identity: &dyn IdentityApi,
    prefix: &str,
    region: &str,
    account_id: Option<&str>,
) -> Result<String, DeployError> {
    let account_id = match account_id {
        Some(account_id) => account_id.to_string(),
        None => {
            let account_id = identity.account_id().await?;
            debug!("Resolved account {} from caller identity", account_id);
            account_id
        }
    };
    Ok(default_bucket_name(prefix, region, &account_id))
}

impl StackEngine {
    /// Make sure `bucket` exists, creating it in the engine's region when absent.
    ///
    /// Only a not-found probe leads to a create; any other probe failure is
    /// returned as is.
    pub async fn ensure_bucket(&self, bucket: &str) -> Result<(), DeployError> {
        self.ensure_not_cancelled("ensure bucket")?;

        match self.store.head_bucket(bucket).await {
            Ok(()) => {
                debug!("Bucket {} already exists", bucket);
                Ok(())
            }
            Err(DeployError::NotFound(_)) => {
                info!("Creating bucket {} in {}", bucket, self.region);
                self.store.create_bucket(bucket, &self.region).await
            }
            Err(e) => Err(e),
        }
    }
}
