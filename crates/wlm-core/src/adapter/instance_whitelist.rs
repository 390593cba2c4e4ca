// Managed database / managed cache adapter.

use super::{ResourceAdapter, ResourceKind};
use crate::config::InstanceWhitelistTarget;
use crate::error::Result;
use crate::sync::sync;
use crate::traits::{CloudProvider, InstanceService};
use async_trait::async_trait;
use std::net::IpAddr;
use tracing::debug;

/// Adapter for one named whitelist group on a database or cache instance
pub struct InstanceWhitelistAdapter {
    service: InstanceService,
    target: InstanceWhitelistTarget,
}

impl InstanceWhitelistAdapter {
    /// Create an adapter for a whitelist group
    pub fn new(service: InstanceService, target: InstanceWhitelistTarget) -> Self {
        Self { service, target }
    }
}

#[async_trait]
impl ResourceAdapter for InstanceWhitelistAdapter {
    fn kind(&self) -> ResourceKind {
        match self.service {
            InstanceService::Database => ResourceKind::Database,
            InstanceService::Cache => ResourceKind::Cache,
        }
    }

    fn target_id(&self) -> String {
        format!("{}/{}", self.target.instance_id, self.target.whitelist_name)
    }

    async fn apply(
        &self,
        provider: &dyn CloudProvider,
        old_ip: Option<IpAddr>,
        new_ip: Option<IpAddr>,
    ) -> Result<()> {
        let current = provider
            .fetch_instance_whitelist(self.service, &self.target)
            .await?;
        let desired = sync(&current, old_ip, new_ip);

        debug!(
            "{} {}: {} -> {}",
            self.kind(),
            self.target_id(),
            current.to_list_string(),
            desired.to_list_string()
        );

        provider
            .replace_instance_whitelist(self.service, &self.target, &desired)
            .await
    }
}
