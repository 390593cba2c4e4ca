// # Reconciliation State
//
// In-memory record of the last two resolved IPs. Nothing is persisted: after
// a restart the first resolved IP is authorized without revoking anything.

use std::net::IpAddr;

/// Phase of the driver state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingPhase {
    /// No IP has been resolved yet
    NoBaseline,
    /// A current IP is known
    Tracking,
}

/// Last-known IP pair owned by the engine
///
/// `last_ip` is only ever set by shifting `current_ip` into it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconciliationState {
    /// The IP before the most recent change
    pub last_ip: Option<IpAddr>,
    /// The most recently resolved IP
    pub current_ip: Option<IpAddr>,
}

impl ReconciliationState {
    /// Fresh state with no baseline
    pub fn new() -> Self {
        Self::default()
    }

    /// Current phase
    pub fn phase(&self) -> TrackingPhase {
        match self.current_ip {
            None => TrackingPhase::NoBaseline,
            Some(_) => TrackingPhase::Tracking,
        }
    }

    /// Record a freshly resolved IP
    ///
    /// Returns `None` when the IP equals the current one (no transition).
    /// Otherwise shifts current into last, stores the new IP and returns
    /// the `(old, new)` pair a reconciliation pass must apply.
    pub fn observe(&mut self, resolved: IpAddr) -> Option<(Option<IpAddr>, IpAddr)> {
        if self.current_ip == Some(resolved) {
            return None;
        }

        let previous = self.current_ip;
        self.last_ip = previous;
        self.current_ip = Some(resolved);
        Some((previous, resolved))
    }
}
