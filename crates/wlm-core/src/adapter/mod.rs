//! Resource adapters
//!
//! One adapter per whitelist-bearing target. Each adapter knows how its
//! resource kind turns an (old, new) IP pair into provider calls:
//!
//! | Kind                | Shape          | Calls                                  |
//! |---------------------|----------------|----------------------------------------|
//! | Compute firewall    | rule-oriented  | revoke old rule, authorize new rule    |
//! | Managed database    | set-oriented   | fetch group, [`sync`], replace group   |
//! | Managed cache       | set-oriented   | fetch group, [`sync`], replace group   |
//! | Load-balancer ACL   | entry-list     | fetch entries, [`sync`], replace all   |
//!
//! [`sync`]: crate::sync::sync

mod acl;
mod firewall;
mod instance_whitelist;

pub use acl::AclAdapter;
pub use firewall::{RulePorts, SecurityGroupAdapter, host_cidr};
pub use instance_whitelist::InstanceWhitelistAdapter;

use crate::config::AccountConfig;
use crate::error::Result;
use crate::traits::{CloudProvider, InstanceService};
use async_trait::async_trait;
use std::fmt;
use std::net::IpAddr;

/// Kind of whitelist-bearing resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Compute security group
    ComputeFirewall,
    /// Managed database whitelist group
    Database,
    /// Managed cache whitelist group
    Cache,
    /// Load-balancer access-control list
    LoadBalancerAcl,
}

impl ResourceKind {
    /// Label used in logs and reports
    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::ComputeFirewall => "ECS security group",
            ResourceKind::Database => "RDS whitelist",
            ResourceKind::Cache => "Redis whitelist",
            ResourceKind::LoadBalancerAcl => "CLB ACL",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Uniform contract over one target of one resource kind
#[async_trait]
pub trait ResourceAdapter: Send + Sync {
    /// Resource kind of the target
    fn kind(&self) -> ResourceKind;

    /// Identifier of the target for logs and reports
    fn target_id(&self) -> String;

    /// Move the target's whitelist from `old_ip` to `new_ip`
    ///
    /// Exactly one attempt; no rollback on failure.
    async fn apply(
        &self,
        provider: &dyn CloudProvider,
        old_ip: Option<IpAddr>,
        new_ip: Option<IpAddr>,
    ) -> Result<()>;
}

/// Build the adapters for every enabled target of an account
///
/// Order: compute firewall, database, cache, load-balancer ACL; targets within
/// a kind in configured order. Disabled kinds contribute nothing.
pub fn adapters_for(account: &AccountConfig) -> Vec<Box<dyn ResourceAdapter>> {
    let mut adapters: Vec<Box<dyn ResourceAdapter>> = Vec::new();

    if account.ecs.enabled {
        for target in &account.ecs.security_groups {
            adapters.push(Box::new(SecurityGroupAdapter::new(target.clone())));
        }
    }

    if account.rds.enabled {
        for target in &account.rds.instance_whitelists {
            adapters.push(Box::new(InstanceWhitelistAdapter::new(
                InstanceService::Database,
                target.clone(),
            )));
        }
    }

    if account.redis.enabled {
        for target in &account.redis.instance_whitelists {
            adapters.push(Box::new(InstanceWhitelistAdapter::new(
                InstanceService::Cache,
                target.clone(),
            )));
        }
    }

    if account.clb.enabled {
        for target in &account.clb.load_balancer_whitelists {
            adapters.push(Box::new(AclAdapter::new(target.clone())));
        }
    }

    adapters
}
