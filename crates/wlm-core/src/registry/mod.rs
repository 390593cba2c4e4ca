//! Plugin-based factory registry
//!
//! The registry allows IP sources and cloud providers to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wlm_core::registry::PluginRegistry;
//!
//! let registry = PluginRegistry::new();
//! wlm_ip_http::register(&registry);
//! wlm_provider_aliyun::register(&registry);
//!
//! let resolver = registry.create_resolver(&config.sources())?;
//! let provider = registry.create_provider(&account)?;
//! ```
//!
//! ## Registration
//!
//! Implementations register themselves under the name used in configuration:
//!
//! ```rust,ignore
//! // In wlm-provider-aliyun crate
//! pub fn register(registry: &PluginRegistry) {
//!     registry.register_provider("aliyun", Box::new(AliyunFactory));
//! }
//! ```

use crate::config::{AccountConfig, IpSourceConfig};
use crate::error::{Error, Result};
use crate::resolver::IpResolver;
use crate::traits::{CloudProvider, CloudProviderFactory, IpSource, IpSourceFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Registry of IP source and cloud provider factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct PluginRegistry {
    /// Registered IP source factories, keyed by config `type`
    ip_sources: RwLock<HashMap<String, Box<dyn IpSourceFactory>>>,

    /// Registered cloud provider factories, keyed by account `provider`
    providers: RwLock<HashMap<String, Box<dyn CloudProviderFactory>>>,
}

impl PluginRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an IP source factory
    ///
    /// # Parameters
    ///
    /// - `name`: IP source type name (e.g., "http", "command", "interface")
    /// - `factory`: Factory object for creating IP source instances
    pub fn register_ip_source(&self, name: impl Into<String>, factory: Box<dyn IpSourceFactory>) {
        let mut sources = self
            .ip_sources
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        sources.insert(name.into(), factory);
    }

    /// Register a cloud provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider name (e.g., "aliyun")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(
        &self,
        name: impl Into<String>,
        factory: Box<dyn CloudProviderFactory>,
    ) {
        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        providers.insert(name.into(), factory);
    }

    /// Create an IP source from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn IpSource>)`: Created IP source instance
    /// - `Err(Error)`: If source type is not registered or creation fails
    pub fn create_ip_source(&self, config: &IpSourceConfig) -> Result<Box<dyn IpSource>> {
        let source_type = config.type_name();
        let sources = self
            .ip_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = sources
            .get(source_type)
            .ok_or_else(|| Error::config(format!("Unknown IP source type: {}", source_type)))?;

        factory.create(config)
    }

    /// Create a resolver over the given sources, preserving their order
    pub fn create_resolver(&self, configs: &[IpSourceConfig]) -> Result<IpResolver> {
        let sources = configs
            .iter()
            .map(|config| self.create_ip_source(config))
            .collect::<Result<Vec<_>>>()?;
        Ok(IpResolver::new(sources))
    }

    /// Create a cloud provider bound to an account
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn CloudProvider>)`: Created provider instance
    /// - `Err(Error)`: If provider is not registered or creation fails
    pub fn create_provider(&self, account: &AccountConfig) -> Result<Box<dyn CloudProvider>> {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = providers.get(account.provider.as_str()).ok_or_else(|| {
            Error::config(format!(
                "Unknown provider '{}' for account '{}'",
                account.provider, account.name
            ))
        })?;

        factory.create(account)
    }

    /// List all registered IP source types
    pub fn list_ip_sources(&self) -> Vec<String> {
        let sources = self
            .ip_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        sources.keys().cloned().collect()
    }

    /// List all registered providers
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        providers.keys().cloned().collect()
    }

    /// Check if an IP source type is registered
    pub fn has_ip_source(&self, name: &str) -> bool {
        let sources = self
            .ip_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        sources.contains_key(name)
    }

    /// Check if a provider is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }
}
