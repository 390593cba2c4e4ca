//! Architectural Contract Test: Failure Isolation
//!
//! Constraints verified:
//! - A failing target never prevents its siblings from running
//! - Targets run in configured order: firewall, database, cache, ACL
//! - One account's failures do not affect another account
//! - A missing whitelist group is reported, not fatal
//! - Failed targets are not retried while the IP stays the same
//! - A failed revoke ends that security group's attempt before authorize
//!
//! If this test fails, someone has added:
//! - Early return on the first failing target
//! - Retry loops or rollback

mod common;

use common::*;
use wlm_core::config::InstanceWhitelistTarget;
use wlm_core::error::Error;
use wlm_core::{AccountReconciler, CycleReport, EngineEvent, ResourceKind};

#[tokio::test]
async fn failing_target_does_not_block_siblings() {
    let (provider, log) = RecordingProvider::new();
    log.seed_whitelist("rm-1", "office", "");
    log.seed_whitelist("rm-2", "office", "");
    log.fail_on("rm-1");

    let config = firewall_account("prod", "sg-1").with_database_whitelists(vec![
        InstanceWhitelistTarget::new("rm-1", "office"),
        InstanceWhitelistTarget::new("rm-2", "office"),
    ]);
    let account = AccountReconciler::new(&config, Box::new(provider));

    let report = account.reconcile(None, Some(ip("1.2.3.4"))).await;

    let kinds: Vec<_> = report.outcomes.iter().map(|o| o.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ResourceKind::ComputeFirewall,
            ResourceKind::Database,
            ResourceKind::Database
        ]
    );
    assert!(report.outcomes[0].is_success());
    assert!(!report.outcomes[1].is_success());
    assert_eq!(report.outcomes[1].target, "rm-1/office");
    assert!(report.outcomes[2].is_success());
    assert_eq!(report.succeeded(), 2);
    assert_eq!(report.failed(), 1);

    assert_eq!(log.whitelist("rm-2", "office").as_deref(), Some("1.2.3.4"));
    assert_eq!(log.whitelist("rm-1", "office").as_deref(), Some(""));
}

#[tokio::test]
async fn missing_group_is_reported_per_target() {
    let (provider, log) = RecordingProvider::new();
    log.seed_whitelist("rm-2", "office", "10.0.0.1");

    let config = full_account("prod").with_database_whitelists(vec![
        InstanceWhitelistTarget::new("rm-1", "office"),
        InstanceWhitelistTarget::new("rm-2", "office"),
    ]);
    let account = AccountReconciler::new(&config, Box::new(provider));

    let report = account.reconcile(None, Some(ip("1.2.3.4"))).await;

    let missing = &report.outcomes[1];
    match &missing.result {
        Err(Error::GroupNotFound { instance, group }) => {
            assert_eq!(instance, "rm-1");
            assert_eq!(group, "office");
        }
        other => panic!("expected GroupNotFound, got {:?}", other),
    }
    assert!(missing.result.as_ref().is_err_and(Error::is_config_defect));

    // Cache group r-1 was never seeded either; the ACL after it still runs
    assert_eq!(report.outcomes.len(), 5);
    assert_eq!(report.failed(), 2);
    assert_eq!(
        log.whitelist("rm-2", "office").as_deref(),
        Some("1.2.3.4,10.0.0.1")
    );
    assert_eq!(log.acl("acl-1"), "1.2.3.4");
}

#[tokio::test]
async fn accounts_are_isolated() {
    let source = ScriptedIpSource::new(vec![Some(ip("1.2.3.4"))]);

    let (broken, broken_log) = RecordingProvider::new();
    broken_log.fail_on("sg-a");
    let (healthy, healthy_log) = RecordingProvider::new();

    let accounts = vec![
        AccountReconciler::new(&firewall_account("a", "sg-a"), Box::new(broken)),
        AccountReconciler::new(&firewall_account("b", "sg-b"), Box::new(healthy)),
    ];
    let (engine, mut events) = engine_with(vec![Box::new(source)], accounts);

    let report = engine.on_trigger().await.expect("cycle succeeds");
    let CycleReport::Reconciled { accounts, .. } = report else {
        panic!("expected a reconciliation pass");
    };
    assert_eq!(accounts[0].account, "a");
    assert_eq!(accounts[0].failed(), 1);
    assert_eq!(accounts[1].account, "b");
    assert_eq!(accounts[1].succeeded(), 1);

    assert!(broken_log.calls().is_empty());
    assert_eq!(
        healthy_log.calls(),
        vec![ProviderCall::Authorize {
            group: "sg-b".to_string(),
            cidr: "1.2.3.4/32".to_string()
        }]
    );

    let outcomes: Vec<_> = drain(&mut events)
        .into_iter()
        .filter(|e| {
            matches!(
                e,
                EngineEvent::TargetFailed { .. } | EngineEvent::TargetSucceeded { .. }
            )
        })
        .collect();
    assert!(matches!(
        &outcomes[0],
        EngineEvent::TargetFailed { account, target, .. } if account == "a" && target == "sg-a:22/22"
    ));
    assert!(matches!(
        &outcomes[1],
        EngineEvent::TargetSucceeded { account, .. } if account == "b"
    ));
}

#[tokio::test]
async fn failed_targets_wait_for_next_change() {
    let source = ScriptedIpSource::new(vec![Some(ip("1.2.3.4"))]);
    let (provider, log) = RecordingProvider::new();
    log.fail_on("sg-1");

    let account = AccountReconciler::new(&firewall_account("prod", "sg-1"), Box::new(provider));
    let (engine, _events) = engine_with(vec![Box::new(source)], vec![account]);

    engine.on_trigger().await.expect("cycle succeeds");
    assert_eq!(engine.state().await.current_ip, Some(ip("1.2.3.4")));

    let report = engine.on_trigger().await.expect("cycle succeeds");
    assert!(matches!(report, CycleReport::Unchanged { .. }));
    assert!(log.calls().is_empty());
}

#[tokio::test]
async fn failed_revoke_skips_authorize() {
    let source = ScriptedIpSource::new(vec![Some(ip("1.2.3.4")), Some(ip("5.6.7.8"))]);
    let (provider, log) = RecordingProvider::new();

    let account = AccountReconciler::new(&firewall_account("prod", "sg-1"), Box::new(provider));
    let (engine, _events) = engine_with(vec![Box::new(source)], vec![account]);

    engine.on_trigger().await.expect("first cycle succeeds");
    log.fail_revoke_on("sg-1");

    let report = engine.on_trigger().await.expect("second cycle succeeds");
    let CycleReport::Reconciled {
        previous,
        current,
        accounts,
    } = report
    else {
        panic!("expected a reconciliation pass");
    };
    assert_eq!(previous, Some(ip("1.2.3.4")));
    assert_eq!(current, ip("5.6.7.8"));

    let outcome = &accounts[0].outcomes[0];
    assert_eq!(outcome.kind, ResourceKind::ComputeFirewall);
    assert!(matches!(outcome.result, Err(Error::Provider { .. })));

    assert_eq!(
        log.calls(),
        vec![ProviderCall::Authorize {
            group: "sg-1".to_string(),
            cidr: "1.2.3.4/32".to_string(),
        }]
    );
}
