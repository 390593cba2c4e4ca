//! Core traits for the whitelist manager
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`IpSource`]: Discover the current public IP from one source
//! - [`CloudProvider`]: Read and change whitelists through a provider API

pub mod cloud_provider;
pub mod ip_source;

pub use cloud_provider::{
    CloudProvider, CloudProviderFactory, IngressRule, InstanceService, IpProtocol,
};
pub use ip_source::{DEFAULT_SOURCE_TIMEOUT, IpSource, IpSourceFactory, parse_reported_ip};
