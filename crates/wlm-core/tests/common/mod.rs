//! Test doubles and common utilities for architecture contract tests
//!
//! These doubles count and record calls so the tests can verify ordering and
//! isolation without any real network I/O.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{Notify, mpsc};
use wlm_core::config::{
    AccountConfig, AclTarget, EngineConfig, InstanceWhitelistTarget, SecurityGroupTarget,
};
use wlm_core::error::{Error, Result};
use wlm_core::traits::{
    CloudProvider, IngressRule, InstanceService, IpSource, parse_reported_ip,
};
use wlm_core::{AccountReconciler, EngineEvent, IpResolver, Membership, WhitelistEngine};

/// Parse an IP literal
pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid IP literal")
}

/// A source that always gives the same answer and counts calls
pub struct StubSource {
    name: String,
    reply: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl StubSource {
    /// Source that reports `text` (parsed like real source output)
    pub fn replying(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            reply: Some(text.to_string()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Source whose every attempt fails
    pub fn failing(name: &str) -> Self {
        Self {
            name: name.to_string(),
            reply: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Shared call counter, usable after the source is boxed
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl IpSource for StubSource {
    async fn current(&self) -> Result<IpAddr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            Some(text) => parse_reported_ip(text),
            None => Err(Error::ip_source(format!("{} unavailable", self.name))),
        }
    }

    fn describe(&self) -> String {
        format!("stub {}", self.name)
    }
}

/// A source that replays a script of answers, one per call
///
/// `None` entries fail. The last entry repeats once the script runs out.
pub struct ScriptedIpSource {
    script: Mutex<VecDeque<Option<IpAddr>>>,
    last: Mutex<Option<IpAddr>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedIpSource {
    pub fn new(script: Vec<Option<IpAddr>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl IpSource for ScriptedIpSource {
    async fn current(&self) -> Result<IpAddr> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = match self.script.lock().unwrap().pop_front() {
            Some(entry) => {
                *self.last.lock().unwrap() = entry;
                entry
            }
            None => *self.last.lock().unwrap(),
        };
        next.ok_or_else(|| Error::ip_source("scripted failure"))
    }

    fn describe(&self) -> String {
        "scripted".to_string()
    }
}

/// One call observed by [`RecordingProvider`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCall {
    Revoke { group: String, cidr: String },
    Authorize { group: String, cidr: String },
    ReplaceWhitelist { key: String, entries: String },
    ReplaceAcl { acl: String, entries: String },
}

/// Shared state behind a [`RecordingProvider`]
#[derive(Default)]
pub struct ProviderLog {
    calls: Mutex<Vec<ProviderCall>>,
    whitelists: Mutex<HashMap<String, Membership>>,
    acls: Mutex<HashMap<String, Membership>>,
    failing: Mutex<HashSet<String>>,
    failing_revokes: Mutex<HashSet<String>>,
}

impl ProviderLog {
    /// Every mutating call, in order
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Make every call touching `target` fail
    ///
    /// `target` is a security group id, an instance id or an ACL id.
    pub fn fail_on(&self, target: &str) {
        self.failing.lock().unwrap().insert(target.to_string());
    }

    /// Make only revokes on security group `group` fail
    pub fn fail_revoke_on(&self, group: &str) {
        self.failing_revokes.lock().unwrap().insert(group.to_string());
    }

    /// Create a whitelist group with the given entry list
    pub fn seed_whitelist(&self, instance: &str, group: &str, list: &str) {
        self.whitelists
            .lock()
            .unwrap()
            .insert(format!("{}/{}", instance, group), Membership::parse_list(list));
    }

    /// Current entry list of a whitelist group
    pub fn whitelist(&self, instance: &str, group: &str) -> Option<String> {
        self.whitelists
            .lock()
            .unwrap()
            .get(&format!("{}/{}", instance, group))
            .map(Membership::to_list_string)
    }

    /// Create an ACL with the given entry list
    pub fn seed_acl(&self, acl: &str, list: &str) {
        self.acls
            .lock()
            .unwrap()
            .insert(acl.to_string(), Membership::parse_list(list));
    }

    /// Current entry list of an ACL
    pub fn acl(&self, acl: &str) -> String {
        self.acls
            .lock()
            .unwrap()
            .get(acl)
            .map(Membership::to_list_string)
            .unwrap_or_default()
    }

    fn check(&self, target: &str) -> Result<()> {
        if self.failing.lock().unwrap().contains(target) {
            Err(Error::provider("mock", format!("injected failure on {}", target)))
        } else {
            Ok(())
        }
    }

    fn record(&self, call: ProviderCall) {
        self.calls.lock().unwrap().push(call);
    }
}

/// In-memory provider that records calls and supports failure injection
pub struct RecordingProvider {
    log: Arc<ProviderLog>,
}

impl RecordingProvider {
    pub fn new() -> (Self, Arc<ProviderLog>) {
        let log = Arc::new(ProviderLog::default());
        (
            Self {
                log: Arc::clone(&log),
            },
            log,
        )
    }
}

#[async_trait]
impl CloudProvider for RecordingProvider {
    async fn revoke_ingress(&self, rule: &IngressRule) -> Result<()> {
        self.log.check(&rule.security_group_id)?;
        if self
            .log
            .failing_revokes
            .lock()
            .unwrap()
            .contains(&rule.security_group_id)
        {
            return Err(Error::provider(
                "mock",
                format!("injected revoke failure on {}", rule.security_group_id),
            ));
        }
        self.log.record(ProviderCall::Revoke {
            group: rule.security_group_id.clone(),
            cidr: rule.source_cidr.clone(),
        });
        Ok(())
    }

    async fn authorize_ingress(&self, rule: &IngressRule) -> Result<()> {
        self.log.check(&rule.security_group_id)?;
        self.log.record(ProviderCall::Authorize {
            group: rule.security_group_id.clone(),
            cidr: rule.source_cidr.clone(),
        });
        Ok(())
    }

    async fn fetch_instance_whitelist(
        &self,
        _service: InstanceService,
        target: &InstanceWhitelistTarget,
    ) -> Result<Membership> {
        self.log.check(&target.instance_id)?;
        let key = format!("{}/{}", target.instance_id, target.whitelist_name);
        self.log
            .whitelists
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| Error::group_not_found(&target.instance_id, &target.whitelist_name))
    }

    async fn replace_instance_whitelist(
        &self,
        _service: InstanceService,
        target: &InstanceWhitelistTarget,
        membership: &Membership,
    ) -> Result<()> {
        self.log.check(&target.instance_id)?;
        let key = format!("{}/{}", target.instance_id, target.whitelist_name);
        self.log.record(ProviderCall::ReplaceWhitelist {
            key: key.clone(),
            entries: membership.to_list_string(),
        });
        self.log
            .whitelists
            .lock()
            .unwrap()
            .insert(key, membership.clone());
        Ok(())
    }

    async fn fetch_acl(&self, target: &AclTarget) -> Result<Membership> {
        self.log.check(&target.acl_id)?;
        Ok(self
            .log
            .acls
            .lock()
            .unwrap()
            .get(&target.acl_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_acl(&self, target: &AclTarget, membership: &Membership) -> Result<()> {
        self.log.check(&target.acl_id)?;
        self.log.record(ProviderCall::ReplaceAcl {
            acl: target.acl_id.clone(),
            entries: membership.to_list_string(),
        });
        self.log
            .acls
            .lock()
            .unwrap()
            .insert(target.acl_id.clone(), membership.clone());
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "recording"
    }
}

/// Gate shared between a test and a [`GatedProvider`]
#[derive(Default)]
pub struct Gate {
    /// Signalled when a call enters the provider
    pub entered: Notify,
    /// Notify to let the waiting call finish
    pub release: Notify,
    /// Number of calls that ran to completion
    pub completed: AtomicUsize,
}

/// Provider whose authorize call blocks until the test releases it
pub struct GatedProvider {
    gate: Arc<Gate>,
}

impl GatedProvider {
    pub fn new() -> (Self, Arc<Gate>) {
        let gate = Arc::new(Gate::default());
        (
            Self {
                gate: Arc::clone(&gate),
            },
            gate,
        )
    }
}

#[async_trait]
impl CloudProvider for GatedProvider {
    async fn revoke_ingress(&self, _rule: &IngressRule) -> Result<()> {
        Ok(())
    }

    async fn authorize_ingress(&self, _rule: &IngressRule) -> Result<()> {
        self.gate.entered.notify_one();
        self.gate.release.notified().await;
        self.gate.completed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn fetch_instance_whitelist(
        &self,
        _service: InstanceService,
        _target: &InstanceWhitelistTarget,
    ) -> Result<Membership> {
        Ok(Membership::new())
    }

    async fn replace_instance_whitelist(
        &self,
        _service: InstanceService,
        _target: &InstanceWhitelistTarget,
        _membership: &Membership,
    ) -> Result<()> {
        Ok(())
    }

    async fn fetch_acl(&self, _target: &AclTarget) -> Result<Membership> {
        Ok(Membership::new())
    }

    async fn replace_acl(&self, _target: &AclTarget, _membership: &Membership) -> Result<()> {
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "gated"
    }
}

/// Account with one security group only
pub fn firewall_account(name: &str, group: &str) -> AccountConfig {
    AccountConfig::new(name, "AKID", "SECRET", "cn-hangzhou")
        .with_security_groups(vec![SecurityGroupTarget::new(group, "22", 1)])
}

/// Account with one target of every kind
pub fn full_account(name: &str) -> AccountConfig {
    AccountConfig::new(name, "AKID", "SECRET", "cn-hangzhou")
        .with_security_groups(vec![SecurityGroupTarget::new("sg-1", "22", 1)])
        .with_database_whitelists(vec![InstanceWhitelistTarget::new("rm-1", "office")])
        .with_cache_whitelists(vec![InstanceWhitelistTarget::new("r-1", "office")])
        .with_acls(vec![AclTarget::new("acl-1")])
}

/// Build an engine with default engine settings
pub fn engine_with(
    sources: Vec<Box<dyn IpSource>>,
    accounts: Vec<AccountReconciler>,
) -> (WhitelistEngine, mpsc::Receiver<EngineEvent>) {
    WhitelistEngine::new(IpResolver::new(sources), accounts, &EngineConfig::default())
}

/// Drain every event currently buffered
pub fn drain(rx: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
