// Network interface IP source.

use wlm_core::config::IpSourceConfig;
use wlm_core::traits::{IpSource, IpSourceFactory};
use wlm_core::{Error, Result};

use std::net::IpAddr;

/// Reads the first usable address of one interface
pub struct InterfaceIpSource {
    interface: String,
    ipv6: bool,
}

impl InterfaceIpSource {
    pub fn new(interface: impl Into<String>, ipv6: bool) -> Self {
        Self {
            interface: interface.into(),
            ipv6,
        }
    }
}

/// Pick the first address of the requested family
///
/// Loopback and IPv6 link-local addresses are skipped.
pub fn select_address(addresses: &[IpAddr], ipv6: bool) -> Option<IpAddr> {
    addresses.iter().copied().find(|ip| {
        if ip.is_loopback() {
            return false;
        }
        match ip {
            IpAddr::V4(_) => !ipv6,
            IpAddr::V6(v6) => ipv6 && (v6.segments()[0] & 0xffc0) != 0xfe80,
        }
    })
}

#[async_trait::async_trait]
impl IpSource for InterfaceIpSource {
    async fn current(&self) -> Result<IpAddr> {
        let name = self.interface.clone();
        let addresses = tokio::task::spawn_blocking(move || sys::interface_addresses(&name))
            .await
            .map_err(|e| Error::ip_source(format!("interface lookup task failed: {}", e)))??;

        let addresses = addresses.ok_or_else(|| {
            Error::ip_source(format!("interface {} not found", self.interface))
        })?;

        select_address(&addresses, self.ipv6).ok_or_else(|| {
            Error::ip_source(format!(
                "no usable {} address on interface {}",
                if self.ipv6 { "IPv6" } else { "IPv4" },
                self.interface
            ))
        })
    }

    fn describe(&self) -> String {
        format!("interface {}", self.interface)
    }
}

/// Factory for creating interface IP sources
pub struct InterfaceFactory;

impl IpSourceFactory for InterfaceFactory {
    fn create(&self, config: &IpSourceConfig) -> Result<Box<dyn IpSource>> {
        if !cfg!(unix) {
            return Err(Error::config(
                "interface IP source is only supported on Unix",
            ));
        }

        match config {
            IpSourceConfig::Interface { interface, ipv6 } => {
                Ok(Box::new(InterfaceIpSource::new(interface.clone(), *ipv6)))
            }
            _ => Err(Error::config("Invalid config for interface IP source")),
        }
    }
}

#[cfg(unix)]
mod sys {
    use nix::ifaddrs::getifaddrs;
    use std::net::{IpAddr, SocketAddrV4, SocketAddrV6};

    /// Addresses bound to `name`, or `None` if no such interface exists
    pub fn interface_addresses(name: &str) -> wlm_core::Result<Option<Vec<IpAddr>>> {
        let mut found = false;
        let mut addresses = Vec::new();

        for entry in getifaddrs().map_err(std::io::Error::from)? {
            if entry.interface_name != name {
                continue;
            }
            found = true;

            let Some(address) = entry.address else {
                continue;
            };
            if let Some(sin) = address.as_sockaddr_in() {
                addresses.push(IpAddr::V4(*SocketAddrV4::from(*sin).ip()));
            } else if let Some(sin6) = address.as_sockaddr_in6() {
                addresses.push(IpAddr::V6(*SocketAddrV6::from(*sin6).ip()));
            }
        }

        Ok(found.then_some(addresses))
    }
}

#[cfg(not(unix))]
mod sys {
    use std::net::IpAddr;

    pub fn interface_addresses(_name: &str) -> wlm_core::Result<Option<Vec<IpAddr>>> {
        Err(wlm_core::Error::ip_source(
            "interface IP source is only supported on Unix",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_select_v4_skips_loopback() {
        let addresses = [ip("127.0.0.1"), ip("fe80::1"), ip("192.0.2.10"), ip("192.0.2.11")];
        assert_eq!(select_address(&addresses, false), Some(ip("192.0.2.10")));
    }

    #[test]
    fn test_select_v6_skips_link_local() {
        let addresses = [ip("192.0.2.10"), ip("::1"), ip("fe80::1"), ip("2001:db8::10")];
        assert_eq!(select_address(&addresses, true), Some(ip("2001:db8::10")));
    }

    #[test]
    fn test_select_no_match() {
        assert_eq!(select_address(&[ip("2001:db8::10")], false), None);
        assert_eq!(select_address(&[], true), None);
    }

    #[tokio::test]
    async fn test_missing_interface_fails() {
        let source = InterfaceIpSource::new("wlm-missing0", false);
        assert!(source.current().await.is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_loopback_addresses_are_listed() {
        let addresses = sys::interface_addresses("lo").unwrap().unwrap();
        assert!(addresses.contains(&ip("127.0.0.1")));
        assert!(sys::interface_addresses("wlm-missing0").unwrap().is_none());
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_loopback_only_interface_fails() {
        assert!(InterfaceIpSource::new("lo", false).current().await.is_err());
    }
}
