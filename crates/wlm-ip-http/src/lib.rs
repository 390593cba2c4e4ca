// # HTTP IP Source
//
// This crate provides an HTTP-based IP source for the whitelist manager.
//
// ## Architecture
//
// Queries an endpoint that echoes the caller's address as plain text
// (e.g. api.ipify.org, ifconfig.me/ip, icanhazip.com). One request per call,
// no caching and no retry; fallback to the next source belongs to the
// resolver.
//
// Only the first 1 KiB of the body is read, so a misbehaving endpoint cannot
// make the daemon buffer an arbitrary response.

use wlm_core::PluginRegistry;
use wlm_core::config::IpSourceConfig;
use wlm_core::traits::{IpSource, IpSourceFactory, parse_reported_ip};
use wlm_core::{Error, Result};

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

/// Maximum number of body bytes read from the endpoint
pub const MAX_BODY_BYTES: usize = 1024;

/// HTTP-based IP source
pub struct HttpIpSource {
    /// URL to fetch IP from
    url: String,

    /// Extra request headers
    headers: HashMap<String, String>,

    /// Request timeout
    timeout: Duration,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpSource {
    /// Create a new HTTP IP source
    ///
    /// # Parameters
    ///
    /// - `url`: URL to fetch IP from (e.g., "https://api.ipify.org")
    /// - `headers`: Extra request headers
    /// - `timeout`: Bound for the whole request
    pub fn new(url: String, headers: HashMap<String, String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url,
            headers,
            timeout,
            client,
        })
    }

    /// Fetch current IP from HTTP service
    async fn fetch_ip(&self) -> Result<IpAddr> {
        let mut request = self.client.get(&self.url);
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| Error::ip_source(format!("Request to {} failed: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(Error::ip_source(format!(
                "{} returned HTTP {}",
                self.url,
                response.status()
            )));
        }

        let mut body = Vec::with_capacity(64);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::ip_source(format!("Failed to read response: {}", e)))?
        {
            let room = MAX_BODY_BYTES - body.len();
            body.extend_from_slice(&chunk[..chunk.len().min(room)]);
            if body.len() >= MAX_BODY_BYTES {
                break;
            }
        }

        let text = String::from_utf8_lossy(&body);
        let ip = parse_reported_ip(&text)?;
        tracing::debug!("{} reported {}", self.url, ip);
        Ok(ip)
    }
}

#[async_trait::async_trait]
impl IpSource for HttpIpSource {
    async fn current(&self) -> Result<IpAddr> {
        self.fetch_ip().await
    }

    fn describe(&self) -> String {
        format!("http {}", self.url)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Factory for creating HTTP IP sources
pub struct HttpFactory;

impl IpSourceFactory for HttpFactory {
    fn create(&self, config: &IpSourceConfig) -> Result<Box<dyn IpSource>> {
        match config {
            IpSourceConfig::Http { url, headers, .. } => Ok(Box::new(HttpIpSource::new(
                url.clone(),
                headers.clone(),
                config.timeout(),
            )?)),
            _ => Err(Error::config("Invalid config for HTTP IP source")),
        }
    }
}

/// Register the HTTP IP source with a registry
pub fn register(registry: &PluginRegistry) {
    registry.register_ip_source("http", Box::new(HttpFactory));
}
