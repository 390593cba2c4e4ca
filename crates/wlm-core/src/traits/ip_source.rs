// # IP Source Trait
//
// Defines the interface for discovering the current public IP address.
//
// ## Implementations
//
// - HTTP endpoint: `wlm-ip-http` crate
// - Shell command and network interface: `wlm-ip-local` crate
//
// ## Usage
//
// ```rust,ignore
// use wlm_core::IpSource;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let source = /* IpSource implementation */;
//
//     // Single attempt, no retry
//     let ip = source.current().await?;
//     println!("public IP: {}", ip);
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;
use std::time::Duration;

/// Time budget for one attempt when a source does not declare its own
pub const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// Trait for IP source implementations
///
/// A source makes exactly one attempt per call to [`IpSource::current`].
/// Ordering, fallback and the overall time budget belong to
/// [`IpResolver`](crate::resolver::IpResolver).
///
/// # Trust Level: Semi-Trusted
///
/// ## Allowed Capabilities
/// - ✅ Perform network I/O, spawn a subprocess, or query OS interfaces
/// - ✅ Bound its own I/O with a timeout
///
/// ## Forbidden Capabilities
/// - ❌ Retry or fall back to another source (owned by `IpResolver`)
/// - ❌ Cache results between calls
/// - ❌ Decide whether whitelists need updating (owned by `WhitelistEngine`)
#[async_trait]
pub trait IpSource: Send + Sync {
    /// Get the current IP address
    ///
    /// # Returns
    ///
    /// - `Ok(IpAddr)`: A syntactically valid IP
    /// - `Err(Error)`: The attempt failed or produced something that is not an IP
    async fn current(&self) -> Result<IpAddr, crate::Error>;

    /// Short description for logs (e.g. "http https://api.ipify.org")
    fn describe(&self) -> String;

    /// Upper bound for one call to [`IpSource::current`]
    fn timeout(&self) -> Duration {
        DEFAULT_SOURCE_TIMEOUT
    }
}

/// Helper trait for constructing IP sources from configuration
pub trait IpSourceFactory: Send + Sync {
    /// Create an IpSource instance from configuration
    fn create(
        &self,
        config: &crate::config::IpSourceConfig,
    ) -> Result<Box<dyn IpSource>, crate::Error>;
}

/// Parse text reported by a source into an IP
///
/// Surrounding whitespace is ignored; anything else that is not a literal
/// IPv4 or IPv6 address is rejected.
pub fn parse_reported_ip(text: &str) -> Result<IpAddr, crate::Error> {
    let trimmed = text.trim();
    trimmed
        .parse()
        .map_err(|_| crate::Error::ip_source(format!("invalid IP address: {:?}", trimmed)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reported_ip() {
        assert_eq!(
            parse_reported_ip(" 203.0.113.5\n").unwrap(),
            IpAddr::from([203, 0, 113, 5])
        );
        assert!(parse_reported_ip("2001:db8::1").unwrap().is_ipv6());
        assert!(parse_reported_ip("not-an-ip").is_err());
        assert!(parse_reported_ip("").is_err());
        assert!(parse_reported_ip("1.2.3.4/32").is_err());
    }
}
