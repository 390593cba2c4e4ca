// # wlm-core
//
// Core library for keeping cloud network whitelists in sync with the
// operator's current public IP address.
//
// ## Architecture Overview
//
// - **IpSource**: Trait for discovering the current public IP from one source
// - **IpResolver**: Tries an ordered list of sources until one yields a valid IP
// - **sync**: Pure set transformation of a whitelist for an (old, new) IP pair
// - **ResourceAdapter**: Uniform apply contract over the four resource kinds
// - **CloudProvider**: Trait for the provider API a resource adapter drives
// - **AccountReconciler**: Runs every adapter of one account, isolating failures
// - **WhitelistEngine**: Owns the last-known IP and drives reconciliation passes
// - **PluginRegistry**: Factory registry for IP sources and cloud providers
//
// ## Design Principles
//
// 1. **Core-first**: All reconciliation logic lives here; plugins do I/O only
// 2. **Failure isolation**: A failing target never aborts its siblings
// 3. **Single writer**: Only the engine mutates reconciliation state, one pass at a time
// 4. **Library-first**: The daemon is a thin shell around this crate

pub mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod reconciler;
pub mod registry;
pub mod resolver;
pub mod state;
pub mod sync;
pub mod traits;

// Re-export core types for convenience
pub use adapter::{ResourceAdapter, ResourceKind};
pub use config::{AccountConfig, IpSourceConfig, WhitelistConfig};
pub use engine::{CycleReport, EngineEvent, WhitelistEngine};
pub use error::{Error, Result};
pub use reconciler::{AccountReconciler, AccountReport, TargetOutcome};
pub use registry::PluginRegistry;
pub use resolver::IpResolver;
pub use state::{ReconciliationState, TrackingPhase};
pub use sync::{Membership, sync};
pub use traits::{CloudProvider, IpSource};
