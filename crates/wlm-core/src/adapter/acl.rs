// Load-balancer ACL adapter.

use super::{ResourceAdapter, ResourceKind};
use crate::config::AclTarget;
use crate::error::Result;
use crate::sync::sync;
use crate::traits::CloudProvider;
use async_trait::async_trait;
use std::net::IpAddr;
use tracing::debug;

/// Adapter for one load-balancer access-control list
///
/// Replacement is remove-all-then-add; any failure here means the ACL
/// must be checked by hand.
pub struct AclAdapter {
    target: AclTarget,
}

impl AclAdapter {
    /// Create an adapter for an ACL
    pub fn new(target: AclTarget) -> Self {
        Self { target }
    }
}

#[async_trait]
impl ResourceAdapter for AclAdapter {
    fn kind(&self) -> ResourceKind {
        ResourceKind::LoadBalancerAcl
    }

    fn target_id(&self) -> String {
        self.target.acl_id.clone()
    }

    async fn apply(
        &self,
        provider: &dyn CloudProvider,
        old_ip: Option<IpAddr>,
        new_ip: Option<IpAddr>,
    ) -> Result<()> {
        let current = provider.fetch_acl(&self.target).await?;
        let desired = sync(&current, old_ip, new_ip);

        debug!(
            "ACL {}: {} -> {}",
            self.target.acl_id,
            current.to_list_string(),
            desired.to_list_string()
        );

        provider.replace_acl(&self.target, &desired).await
    }
}
