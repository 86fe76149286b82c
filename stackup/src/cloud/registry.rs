//! Per-region client registry

use std::collections::HashMap;
use std::sync::Arc;

use aws_sdk_cloudformation::config::Region;
use tokio::sync::RwLock;
use tracing::debug;

use crate::cloud::aws::{CallerIdentity, CloudFormationClient, S3Store, WaitPolicy};
use crate::cloud::{IdentityApi, ObjectStore, StackApi};

/// Clients for one region
#[derive(Clone)]
pub struct RegionClients {
    pub region: String,
    pub stacks: Arc<dyn StackApi>,
    pub store: Arc<dyn ObjectStore>,
    pub identity: Arc<dyn IdentityApi>,
}

/// Lazily built, per-region clients.
///
/// Constructed explicitly and passed to whoever needs clients; safe to share
/// between tasks.
pub struct ClientRegistry {
    wait_policy: WaitPolicy,
    clients: RwLock<HashMap<String, RegionClients>>,
}

impl ClientRegistry {
    pub fn new(wait_policy: WaitPolicy) -> Self {
        Self {
            wait_policy,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Get the clients for a region, building them on first use
    pub async fn for_region(&self, region: &str) -> RegionClients {
        {
            let clients = self.clients.read().await;
            if let Some(existing) = clients.get(region) {
                return existing.clone();
            }
        }

        // Loaded outside the lock; a concurrent build for the same region is dropped
        debug!("Loading AWS configuration for region {}", region);
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        let built = RegionClients {
            region: region.to_string(),
            stacks: Arc::new(CloudFormationClient::new(&config, self.wait_policy)),
            store: Arc::new(S3Store::new(&config)),
            identity: Arc::new(CallerIdentity::new(&config)),
        };

        self.insert_if_absent(built).await
    }

    /// Cache `built` unless another task got there first; returns the cached clients
    async fn insert_if_absent(&self, built: RegionClients) -> RegionClients {
        let mut clients = self.clients.write().await;
        clients
            .entry(built.region.clone())
            .or_insert(built)
            .clone()
    }

    /// Register clients for a region, replacing any cached ones
    pub async fn insert(&self, clients: RegionClients) {
        self.clients
            .write()
            .await
            .insert(clients.region.clone(), clients);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::fake::{FakeCloud, ACCOUNT_ID};

    fn fake_clients(region: &str, fake: &Arc<FakeCloud>) -> RegionClients {
        RegionClients {
            region: region.to_string(),
            stacks: fake.clone(),
            store: fake.clone(),
            identity: fake.clone(),
        }
    }

    #[tokio::test]
    async fn test_inserted_clients_are_reused() {
        let registry = ClientRegistry::new(WaitPolicy::default());
        let fake = Arc::new(FakeCloud::default());
        registry.insert(fake_clients("ap-southeast-2", &fake)).await;

        let clients = registry.for_region("ap-southeast-2").await;
        assert_eq!(clients.region, "ap-southeast-2");
        assert_eq!(clients.identity.account_id().await.unwrap(), ACCOUNT_ID);
    }

    #[tokio::test]
    async fn test_first_built_clients_win() {
        let registry = ClientRegistry::new(WaitPolicy::default());
        let first = Arc::new(FakeCloud::default());
        let second = Arc::new(FakeCloud::default());

        registry.insert_if_absent(fake_clients("eu-west-1", &first)).await;
        let kept = registry.insert_if_absent(fake_clients("eu-west-1", &second)).await;

        kept.stacks.validate_template("{}").await.unwrap();
        assert_eq!(first.call_count("validate-template"), 1);
        assert_eq!(second.call_count("validate-template"), 0);
    }
}
