// # Cloud Provider Trait
//
// Defines the provider API calls the resource adapters are built on.
//
// ## Implementations
//
// - Alibaba Cloud: `wlm-provider-aliyun` crate
//
// One provider instance serves one account; region and credentials are bound
// when the factory creates it.

use crate::config::{AclTarget, InstanceWhitelistTarget};
use crate::sync::Membership;
use async_trait::async_trait;
use std::fmt;

/// Protocol of a compute firewall rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpProtocol {
    /// TCP only
    Tcp,
    /// All protocols
    All,
}

impl IpProtocol {
    /// Wire name of the protocol
    pub fn as_str(&self) -> &'static str {
        match self {
            IpProtocol::Tcp => "tcp",
            IpProtocol::All => "all",
        }
    }
}

impl fmt::Display for IpProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fully specified ingress rule on a security group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressRule {
    /// Security group id
    pub security_group_id: String,
    /// Rule protocol
    pub protocol: IpProtocol,
    /// Port range as "from/to"
    pub port_range: String,
    /// Rule priority
    pub priority: u32,
    /// Source CIDR (a single host: "/32" or "/128")
    pub source_cidr: String,
}

/// Managed service that carries named per-instance whitelist groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstanceService {
    /// Managed relational database
    Database,
    /// Managed cache
    Cache,
}

/// Trait for cloud provider implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform API calls to the provider's endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Treat provider-defined "already absent" conditions as success on revoke
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (a failed target waits for the next IP change)
/// - ❌ Cache whitelists between calls (memberships are always re-fetched)
/// - ❌ Decide which IPs to add or remove (owned by the resource adapters)
///
/// Every call is a single attempt bounded by the client's own timeout.
#[async_trait]
pub trait CloudProvider: Send + Sync {
    /// Remove an ingress rule; a rule that does not exist counts as removed
    async fn revoke_ingress(&self, rule: &IngressRule) -> Result<(), crate::Error>;

    /// Add an ingress rule; a duplicate rule is reported as an error
    async fn authorize_ingress(&self, rule: &IngressRule) -> Result<(), crate::Error>;

    /// Read the entries of an instance whitelist group
    ///
    /// Returns `Error::GroupNotFound` when the group does not exist on the instance.
    async fn fetch_instance_whitelist(
        &self,
        service: InstanceService,
        target: &InstanceWhitelistTarget,
    ) -> Result<Membership, crate::Error>;

    /// Overwrite the entries of an instance whitelist group
    async fn replace_instance_whitelist(
        &self,
        service: InstanceService,
        target: &InstanceWhitelistTarget,
        membership: &Membership,
    ) -> Result<(), crate::Error>;

    /// Read the addresses in a load-balancer ACL, host suffixes stripped
    async fn fetch_acl(&self, target: &AclTarget) -> Result<Membership, crate::Error>;

    /// Replace every entry of a load-balancer ACL
    ///
    /// Not atomic: existing entries are removed before the new ones are
    /// added, so a failure in between leaves the ACL empty.
    async fn replace_acl(
        &self,
        target: &AclTarget,
        membership: &Membership,
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing cloud providers from account configuration
pub trait CloudProviderFactory: Send + Sync {
    /// Create a provider bound to the account's region and credentials
    fn create(
        &self,
        account: &crate::config::AccountConfig,
    ) -> Result<Box<dyn CloudProvider>, crate::Error>;
}
