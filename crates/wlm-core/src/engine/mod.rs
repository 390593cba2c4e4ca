//! Core whitelist engine
//!
//! The WhitelistEngine is responsible for:
//! - Resolving the current public IP via the [`IpResolver`]
//! - Tracking the last-known IP pair
//! - Running a reconciliation pass over every account when the IP changes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐    ┌──────────────┐
//! │   Ticker    │───▶│  IpResolver  │─── IpAddr ───┐
//! └─────────────┘    └──────────────┘              │
//!                                                  ▼
//!                                       ┌──────────────────┐
//!                                       │ WhitelistEngine  │
//!                                       │ (lastIP, curIP)  │
//!                                       └──────────────────┘
//!                                                  │ (old, new)
//!              ┌───────────────────────────────────┼──────────────────┐
//!              ▼                                   ▼                  ▼
//!   ┌────────────────────┐             ┌────────────────────┐  ┌─────────────┐
//!   │ AccountReconciler  │     ...     │ AccountReconciler  │  │   Events    │
//!   └────────────────────┘             └────────────────────┘  │  (notify)   │
//!                                                              └─────────────┘
//! ```
//!
//! ## Cycle Flow
//!
//! 1. Trigger fires (startup or interval tick)
//! 2. Resolve the IP; on failure abort the cycle, state untouched
//! 3. Same IP as current: nothing to do
//! 4. Otherwise shift current into last, then reconcile every account with
//!    (old, new) in configured order
//! 5. Emit events for monitoring/logging
//!
//! State is updated before the pass and never rolled back: targets that fail
//! are not retried until the IP changes again.

use crate::adapter::ResourceKind;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::reconciler::{AccountReconciler, AccountReport};
use crate::resolver::IpResolver;
use crate::state::ReconciliationState;
use std::net::IpAddr;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::IntervalStream;
use tracing::{debug, error, info, warn};

/// Events emitted by the WhitelistEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started {
        accounts_count: usize,
    },

    /// A source produced the current IP
    IpResolved {
        ip: IpAddr,
        source: String,
    },

    /// Resolved IP equals the current one
    IpUnchanged {
        ip: IpAddr,
    },

    /// Resolved IP differs from the current one (or is the first)
    IpChanged {
        previous: Option<IpAddr>,
        current: IpAddr,
    },

    /// A target was updated
    TargetSucceeded {
        account: String,
        kind: ResourceKind,
        target: String,
    },

    /// A target failed; the pass continued
    TargetFailed {
        account: String,
        kind: ResourceKind,
        target: String,
        error: String,
    },

    /// No source produced an IP; the cycle was aborted
    ResolutionFailed {
        error: String,
    },

    /// A trigger arrived while a pass was running and was dropped
    CycleSkipped,

    /// Engine stopped
    Stopped {
        reason: String,
    },
}

/// What one trigger did
#[derive(Debug)]
pub enum CycleReport {
    /// Resolved IP equals the current one
    Unchanged { ip: IpAddr },

    /// A reconciliation pass ran
    Reconciled {
        previous: Option<IpAddr>,
        current: IpAddr,
        accounts: Vec<AccountReport>,
    },

    /// Another pass was in flight
    Skipped,
}

/// Core whitelist engine
///
/// ## Lifecycle
///
/// 1. Create with [`WhitelistEngine::new()`]
/// 2. Start with [`WhitelistEngine::run()`], or drive single cycles with
///    [`WhitelistEngine::on_trigger()`]
/// 3. Engine runs until shutdown signal received
///
/// ## Concurrency
///
/// At most one cycle runs at a time. The state lock is held for the whole
/// cycle; a trigger that cannot take it is skipped, not queued.
pub struct WhitelistEngine {
    /// Ordered IP sources
    resolver: IpResolver,

    /// Accounts in configured order
    accounts: Vec<AccountReconciler>,

    /// Last-known IP pair
    state: Mutex<ReconciliationState>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<EngineEvent>,
}

impl WhitelistEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `resolver`: Ordered IP sources
    /// - `accounts`: One reconciler per account, in configured order
    /// - `config`: Engine settings
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        resolver: IpResolver,
        accounts: Vec<AccountReconciler>,
        config: &EngineConfig,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (tx, rx) = mpsc::channel(config.event_channel_capacity.max(1));

        let engine = Self {
            resolver,
            accounts,
            state: Mutex::new(ReconciliationState::new()),
            event_tx: tx,
        };

        (engine, rx)
    }

    /// Snapshot of the last-known IP pair
    pub async fn state(&self) -> ReconciliationState {
        *self.state.lock().await
    }

    /// Number of managed accounts
    pub fn accounts_count(&self) -> usize {
        self.accounts.len()
    }

    /// Run one check-and-reconcile cycle
    ///
    /// # Returns
    ///
    /// - `Ok(CycleReport)`: What the cycle did; per-target failures are inside
    /// - `Err(Error)`: No IP could be resolved; state untouched
    pub async fn on_trigger(&self) -> Result<CycleReport> {
        let Ok(mut state) = self.state.try_lock() else {
            debug!("Reconciliation pass in flight, skipping trigger");
            self.emit_event(EngineEvent::CycleSkipped);
            return Ok(CycleReport::Skipped);
        };

        let (ip, source) = match self.resolver.resolve().await {
            Ok(resolved) => resolved,
            Err(e) => {
                error!("Failed to resolve public IP: {}", e);
                self.emit_event(EngineEvent::ResolutionFailed {
                    error: e.to_string(),
                });
                return Err(e);
            }
        };

        self.emit_event(EngineEvent::IpResolved {
            ip,
            source: source.clone(),
        });

        let Some((previous, current)) = state.observe(ip) else {
            info!("IP has not changed: {}", ip);
            self.emit_event(EngineEvent::IpUnchanged { ip });
            return Ok(CycleReport::Unchanged { ip });
        };

        match previous {
            Some(old) => info!("IP changed: {} -> {} (via {})", old, current, source),
            None => info!("Initial IP: {} (via {})", current, source),
        }
        self.emit_event(EngineEvent::IpChanged { previous, current });

        let mut reports = Vec::with_capacity(self.accounts.len());
        for account in &self.accounts {
            let report = account.reconcile(previous, Some(current)).await;
            self.emit_outcomes(&report);
            reports.push(report);
        }

        let failed: usize = reports.iter().map(AccountReport::failed).sum();
        if failed > 0 {
            warn!("Reconciliation pass finished with {} failed target(s)", failed);
        } else {
            info!("Reconciliation pass finished");
        }

        Ok(CycleReport::Reconciled {
            previous,
            current,
            accounts: reports,
        })
    }

    /// Run the engine
    ///
    /// Triggers once immediately, then every `interval`, until SIGINT.
    /// A pass in flight when the signal arrives runs to completion.
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    /// - `Err(Error)`: Invalid interval
    pub async fn run(&self, interval: Duration) -> Result<()> {
        self.run_internal(interval, None).await
    }

    /// Run the engine until `shutdown_rx` fires
    ///
    /// Same loop as [`WhitelistEngine::run()`] with the shutdown signal owned
    /// by the caller. `None` falls back to Ctrl-C.
    pub async fn run_with_shutdown(
        &self,
        interval: Duration,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        self.run_internal(interval, shutdown_rx).await
    }

    async fn run_internal(
        &self,
        interval: Duration,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::config("interval must be greater than 0"));
        }

        self.emit_event(EngineEvent::Started {
            accounts_count: self.accounts.len(),
        });

        // First tick completes immediately: that is the startup trigger
        let mut timer = tokio::time::interval(interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = IntervalStream::new(timer);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for shutdown signal: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    self.emit_event(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                Some(_) = ticks.next() => {
                    // Errors are already logged and emitted; keep running
                    let _ = self.on_trigger().await;
                }
            }
        }

        info!("Engine stopped");
        Ok(())
    }

    fn emit_outcomes(&self, report: &AccountReport) {
        for outcome in &report.outcomes {
            let event = match &outcome.result {
                Ok(()) => EngineEvent::TargetSucceeded {
                    account: report.account.clone(),
                    kind: outcome.kind,
                    target: outcome.target.clone(),
                },
                Err(e) => EngineEvent::TargetFailed {
                    account: report.account.clone(),
                    kind: outcome.kind,
                    target: outcome.target.clone(),
                    error: e.to_string(),
                },
            };
            self.emit_event(event);
        }
    }

    /// Emit an engine event
    fn emit_event(&self, event: EngineEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(TrySendError::Closed(_)) => {}
        }
    }
}
