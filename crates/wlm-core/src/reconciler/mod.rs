//! Account reconciler
//!
//! Applies one (old, new) IP pair to every enabled target of one account.
//! Targets run sequentially in configured order and each gets exactly one
//! attempt. A failing target is logged and recorded; its siblings still run.

use crate::adapter::{ResourceAdapter, ResourceKind, adapters_for};
use crate::config::AccountConfig;
use crate::error::Result;
use crate::traits::CloudProvider;
use std::net::IpAddr;
use tracing::{error, info};

/// Result of applying the IP pair to one target
#[derive(Debug)]
pub struct TargetOutcome {
    /// Resource kind of the target
    pub kind: ResourceKind,
    /// Target identifier
    pub target: String,
    /// What happened
    pub result: Result<()>,
}

impl TargetOutcome {
    /// Whether the target was updated
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Per-target outcomes of one account in one pass
#[derive(Debug)]
pub struct AccountReport {
    /// Account name
    pub account: String,
    /// Outcomes in the order the targets were processed
    pub outcomes: Vec<TargetOutcome>,
}

impl AccountReport {
    /// Number of targets updated
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// Number of targets that failed
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Reconciles every enabled target of one account
pub struct AccountReconciler {
    name: String,
    provider: Box<dyn CloudProvider>,
    adapters: Vec<Box<dyn ResourceAdapter>>,
}

impl AccountReconciler {
    /// Create a reconciler for an account with its bound provider
    pub fn new(account: &AccountConfig, provider: Box<dyn CloudProvider>) -> Self {
        Self {
            name: account.name.clone(),
            provider,
            adapters: adapters_for(account),
        }
    }

    /// Account name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of enabled targets
    pub fn target_count(&self) -> usize {
        self.adapters.len()
    }

    /// Apply the IP pair to every target
    ///
    /// Never fails as a whole; failures are carried per target in the report.
    pub async fn reconcile(&self, old_ip: Option<IpAddr>, new_ip: Option<IpAddr>) -> AccountReport {
        let mut outcomes = Vec::with_capacity(self.adapters.len());
        info!("[{}] Reconciling {} target(s)", self.name, self.adapters.len());

        for adapter in &self.adapters {
            let kind = adapter.kind();
            let target = adapter.target_id();

            let result = adapter.apply(self.provider.as_ref(), old_ip, new_ip).await;
            match &result {
                Ok(()) => info!(
                    "[{}] {} {} updated ({} -> {})",
                    self.name,
                    kind,
                    target,
                    display_ip(old_ip),
                    display_ip(new_ip)
                ),
                Err(e) => error!("[{}] {} {} failed: {}", self.name, kind, target, e),
            }

            outcomes.push(TargetOutcome {
                kind,
                target,
                result,
            });
        }

        AccountReport {
            account: self.name.clone(),
            outcomes,
        }
    }
}

fn display_ip(ip: Option<IpAddr>) -> String {
    ip.map(|ip| ip.to_string())
        .unwrap_or_else(|| "none".to_string())
}
