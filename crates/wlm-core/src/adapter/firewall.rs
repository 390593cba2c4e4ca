// Compute firewall adapter.
//
// Security groups hold rules, not a whitelist set: moving to a new IP means
// revoking the rule for the old IP and authorizing a rule for the new one.

use super::{ResourceAdapter, ResourceKind};
use crate::config::SecurityGroupTarget;
use crate::error::Result;
use crate::traits::{CloudProvider, IngressRule, IpProtocol};
use async_trait::async_trait;
use std::net::IpAddr;
use tracing::debug;

/// Protocol and port range derived from a configured port value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulePorts {
    /// Rule protocol
    pub protocol: IpProtocol,
    /// Port range as "from/to"
    pub port_range: String,
}

impl RulePorts {
    /// Normalize a configured port value
    ///
    /// - `"-1/-1"` → all protocols, all ports
    /// - a value containing `/` is already a range → tcp, unchanged
    /// - a bare port `"22"` → tcp, `"22/22"`
    pub fn normalize(port: &str) -> Self {
        let port = port.trim();
        if port == "-1/-1" {
            Self {
                protocol: IpProtocol::All,
                port_range: "-1/-1".to_string(),
            }
        } else if port.contains('/') {
            Self {
                protocol: IpProtocol::Tcp,
                port_range: port.to_string(),
            }
        } else {
            Self {
                protocol: IpProtocol::Tcp,
                port_range: format!("{}/{}", port, port),
            }
        }
    }
}

/// Single-host CIDR for an IP ("/32" for IPv4, "/128" for IPv6)
pub fn host_cidr(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => format!("{}/32", v4),
        IpAddr::V6(v6) => format!("{}/128", v6),
    }
}

/// Adapter for one security group rule slot
pub struct SecurityGroupAdapter {
    target: SecurityGroupTarget,
    ports: RulePorts,
}

impl SecurityGroupAdapter {
    /// Create an adapter for a security group target
    pub fn new(target: SecurityGroupTarget) -> Self {
        let ports = RulePorts::normalize(&target.port);
        Self { target, ports }
    }

    /// The ingress rule that admits `ip` on this target
    pub fn rule_for(&self, ip: IpAddr) -> IngressRule {
        IngressRule {
            security_group_id: self.target.security_group_id.clone(),
            protocol: self.ports.protocol,
            port_range: self.ports.port_range.clone(),
            priority: self.target.priority,
            source_cidr: host_cidr(ip),
        }
    }
}

#[async_trait]
impl ResourceAdapter for SecurityGroupAdapter {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ComputeFirewall
    }

    fn target_id(&self) -> String {
        format!("{}:{}", self.target.security_group_id, self.ports.port_range)
    }

    async fn apply(
        &self,
        provider: &dyn CloudProvider,
        old_ip: Option<IpAddr>,
        new_ip: Option<IpAddr>,
    ) -> Result<()> {
        if let Some(old) = old_ip {
            let rule = self.rule_for(old);
            debug!("Revoking {} on {}", rule.source_cidr, self.target_id());
            provider.revoke_ingress(&rule).await?;
        }

        if let Some(new) = new_ip {
            let rule = self.rule_for(new);
            debug!("Authorizing {} on {}", rule.source_cidr, self.target_id());
            provider.authorize_ingress(&rule).await?;
        }

        Ok(())
    }
}
