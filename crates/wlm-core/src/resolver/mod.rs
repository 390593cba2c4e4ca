//! IP resolver
//!
//! Tries the configured [`IpSource`]s strictly in order and returns the first
//! valid IP. Sources after the winning one are never attempted. Each attempt
//! is bounded by the source's own timeout, so a hung source cannot stall the
//! cycle.

use crate::error::{Error, Result};
use crate::traits::IpSource;
use std::net::IpAddr;
use tracing::{info, warn};

/// Ordered list of IP sources
pub struct IpResolver {
    sources: Vec<Box<dyn IpSource>>,
}

impl IpResolver {
    /// Create a resolver over sources in priority order
    pub fn new(sources: Vec<Box<dyn IpSource>>) -> Self {
        Self { sources }
    }

    /// Number of configured sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether no source is configured
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Resolve the current public IP
    ///
    /// # Returns
    ///
    /// - `Ok((IpAddr, String))`: The IP and a description of the source that produced it
    /// - `Err(Error::SourceExhausted)`: Every source failed
    pub async fn resolve(&self) -> Result<(IpAddr, String)> {
        let mut last_error = String::from("no IP sources configured");
        let mut attempted = 0;

        for source in &self.sources {
            attempted += 1;
            let description = source.describe();
            let budget = source.timeout();

            match tokio::time::timeout(budget, source.current()).await {
                Ok(Ok(ip)) => {
                    info!("Current public IP: {} (from {})", ip, description);
                    return Ok((ip, description));
                }
                Ok(Err(e)) => {
                    warn!("IP source {} failed: {}", description, e);
                    last_error = format!("{}: {}", description, e);
                }
                Err(_) => {
                    warn!("IP source {} timed out after {:?}", description, budget);
                    last_error = format!("{}: timed out after {:?}", description, budget);
                }
            }
        }

        Err(Error::SourceExhausted {
            attempted,
            last_error,
        })
    }
}
