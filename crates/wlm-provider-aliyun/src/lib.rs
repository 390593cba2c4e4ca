// # Alibaba Cloud Provider
//
// This crate provides the Alibaba Cloud implementation of `CloudProvider`.
//
// ## Implementation Status
//
// - ✅ ECS security groups: `RevokeSecurityGroup` / `AuthorizeSecurityGroup`
// - ✅ RDS whitelist groups: `DescribeDBInstanceIPArrayList` / `ModifySecurityIps`
// - ✅ Redis (R-KVStore) whitelist groups: `DescribeSecurityIps` / `ModifySecurityIps`
// - ✅ CLB access-control lists: `DescribeAccessControlListAttribute` /
//   `RemoveAccessControlListEntry` / `AddAccessControlListEntry`
// - ✅ One HTTP request per API call, HTTP timeout configured (30 seconds)
// - ✅ Dry-run mode for safe testing
// - ❌ NO retry logic (a failed target waits for the next IP change)
// - ❌ NO caching (whitelists are re-read on every pass)
//
// ## Trust Level: Untrusted (Cloud Provider)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTPS API calls to Alibaba Cloud endpoints only
// - ✅ Parse provider-specific responses
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Decide which IPs to add or remove (owned by the resource adapters)
//
// ## Security Requirements
//
// - The AccessKey secret NEVER appears in logs or `Debug` output
// - Requests are signed; the secret itself is never sent
//
// ## API Reference
//
// - RPC signature: https://www.alibabacloud.com/help/en/sdk/product-overview/rpc-mechanism

mod api;
pub mod signer;

use api::{
    AclAttribute, AclEntryParam, ApiError, CacheSecurityIps, DbIpArrayList, ErrorBody,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use wlm_core::adapter::host_cidr;
use wlm_core::config::{AccountConfig, AclTarget, InstanceWhitelistTarget};
use wlm_core::traits::{CloudProvider, CloudProviderFactory, IngressRule, InstanceService};
use wlm_core::{Error, Membership, Result};

/// Provider name used in the registry and in errors
pub const PROVIDER_NAME: &str = "aliyun";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Description attached to rules and ACL entries this tool creates
pub const RULE_DESCRIPTION: &str = "Auto added by cloud-whitelist-manager";

/// Revoke error code meaning "no such rule"
const RULE_ABSENT_CODE: &str = "InvalidParam.SourceCidrIp";

/// Environment variable that selects dry-run mode (`WLM_MODE=dry-run`)
pub const MODE_ENV: &str = "WLM_MODE";

/// API products and their versions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Product {
    Ecs,
    Rds,
    Redis,
    Slb,
}

impl Product {
    fn version(self) -> &'static str {
        match self {
            Product::Ecs => "2014-05-26",
            Product::Rds => "2014-08-15",
            Product::Redis => "2015-01-01",
            Product::Slb => "2014-05-15",
        }
    }
}

/// Base URLs of the product endpoints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub ecs: String,
    pub rds: String,
    pub redis: String,
    pub slb: String,
}

impl Endpoints {
    /// Public endpoints for a region
    pub fn for_region(region_id: &str) -> Self {
        Self {
            ecs: format!("https://ecs.{}.aliyuncs.com", region_id),
            rds: "https://rds.aliyuncs.com".to_string(),
            redis: "https://r-kvstore.aliyuncs.com".to_string(),
            slb: format!("https://slb.{}.aliyuncs.com", region_id),
        }
    }

    /// Every product served from one base URL (for testing)
    pub fn uniform(base_url: impl Into<String>) -> Self {
        let base = base_url.into();
        Self {
            ecs: base.clone(),
            rds: base.clone(),
            redis: base.clone(),
            slb: base,
        }
    }

    fn for_product(&self, product: Product) -> &str {
        match product {
            Product::Ecs => &self.ecs,
            Product::Rds => &self.rds,
            Product::Redis => &self.redis,
            Product::Slb => &self.slb,
        }
    }
}

/// Alibaba Cloud provider bound to one account and region
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all Describe calls
/// - Log the intended mutation
/// - **NOT** call any mutating API
pub struct AliyunProvider {
    access_key_id: String,

    /// ⚠️ NEVER log this value
    access_key_secret: String,

    region_id: String,

    endpoints: Endpoints,

    client: reqwest::Client,

    dry_run: bool,
}

// Custom Debug implementation that hides the AccessKey secret
impl std::fmt::Debug for AliyunProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliyunProvider")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<REDACTED>")
            .field("region_id", &self.region_id)
            .field("endpoints", &self.endpoints)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl AliyunProvider {
    /// Create a provider for an account's credentials and region
    pub fn new(
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        region_id: impl Into<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let access_key_id = access_key_id.into();
        let access_key_secret = access_key_secret.into();
        let region_id = region_id.into();

        if access_key_id.is_empty() || access_key_secret.is_empty() {
            return Err(Error::config("Alibaba Cloud AccessKey id and secret are required"));
        }
        if region_id.is_empty() {
            return Err(Error::config("Alibaba Cloud region is required"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoints: Endpoints::for_region(&region_id),
            access_key_id,
            access_key_secret,
            region_id,
            client,
            dry_run,
        })
    }

    /// Replace the product endpoints
    pub fn with_endpoints(mut self, endpoints: Endpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Whether mutations are skipped
    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// Sign and send one RPC call, decoding the success body
    async fn call<T: DeserializeOwned>(
        &self,
        product: Product,
        action: &'static str,
        params: &[(&str, String)],
    ) -> std::result::Result<T, ApiError> {
        let mut query: BTreeMap<String, String> = params
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();
        query.insert("Action".to_string(), action.to_string());
        query.insert("Version".to_string(), product.version().to_string());
        query.insert("Format".to_string(), "JSON".to_string());
        query.insert("RegionId".to_string(), self.region_id.clone());
        query.insert("AccessKeyId".to_string(), self.access_key_id.clone());
        query.insert("SignatureMethod".to_string(), "HMAC-SHA1".to_string());
        query.insert("SignatureVersion".to_string(), "1.0".to_string());
        query.insert(
            "SignatureNonce".to_string(),
            uuid::Uuid::new_v4().to_string(),
        );
        query.insert(
            "Timestamp".to_string(),
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        );

        let signed = signer::signed_query(&self.access_key_secret, &query).map_err(|e| {
            ApiError::Transport {
                action,
                message: format!("failed to sign request: {}", e),
            }
        })?;
        let url = format!(
            "{}/?{}",
            self.endpoints.for_product(product).trim_end_matches('/'),
            signed
        );

        tracing::debug!("Calling {} ({:?})", action, product);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                action,
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ApiError::Transport {
            action,
            message: format!("failed to read response: {}", e),
        })?;

        if !status.is_success() {
            let error: ErrorBody = serde_json::from_str(&body).unwrap_or_default();
            return Err(ApiError::Api {
                action,
                status: status.as_u16(),
                code: if error.code.is_empty() {
                    "Unknown".to_string()
                } else {
                    error.code
                },
                message: error.message,
                request_id: error.request_id,
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode {
            action,
            detail: e.to_string(),
        })
    }

    /// Send a mutating call, or only log it in dry-run mode
    async fn mutate(
        &self,
        product: Product,
        action: &'static str,
        params: &[(&str, String)],
    ) -> std::result::Result<(), ApiError> {
        if self.dry_run {
            tracing::info!("[DRY-RUN] Would call {} with {:?}", action, params);
            return Ok(());
        }

        self.call::<serde_json::Value>(product, action, params)
            .await
            .map(|_| ())
    }

    fn rule_params(rule: &IngressRule) -> Vec<(&'static str, String)> {
        vec![
            ("SecurityGroupId", rule.security_group_id.clone()),
            ("IpProtocol", rule.protocol.as_str().to_string()),
            ("PortRange", rule.port_range.clone()),
            ("SourceCidrIp", rule.source_cidr.clone()),
            ("Priority", rule.priority.to_string()),
        ]
    }

    async fn describe_acl(&self, target: &AclTarget) -> Result<AclAttribute> {
        Ok(self
            .call(
                Product::Slb,
                "DescribeAccessControlListAttribute",
                &[("AclId", target.acl_id.clone())],
            )
            .await?)
    }
}

/// Strip the single-host suffix the ACL API reports
fn strip_host_suffix(entry: &str) -> &str {
    entry
        .strip_suffix("/32")
        .or_else(|| entry.strip_suffix("/128"))
        .unwrap_or(entry)
}

/// ACL entry for a membership value: bare addresses become single-host CIDRs
fn acl_entry(value: &str) -> String {
    match value.parse() {
        Ok(ip) => host_cidr(ip),
        Err(_) => value.to_string(),
    }
}

#[async_trait]
impl CloudProvider for AliyunProvider {
    async fn revoke_ingress(&self, rule: &IngressRule) -> Result<()> {
        match self
            .mutate(Product::Ecs, "RevokeSecurityGroup", &Self::rule_params(rule))
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if e.code() == Some(RULE_ABSENT_CODE) => {
                tracing::debug!(
                    "Rule for {} already absent from {}",
                    rule.source_cidr,
                    rule.security_group_id
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn authorize_ingress(&self, rule: &IngressRule) -> Result<()> {
        let mut params = Self::rule_params(rule);
        params.push(("Description", RULE_DESCRIPTION.to_string()));

        Ok(self
            .mutate(Product::Ecs, "AuthorizeSecurityGroup", &params)
            .await?)
    }

    async fn fetch_instance_whitelist(
        &self,
        service: InstanceService,
        target: &InstanceWhitelistTarget,
    ) -> Result<Membership> {
        let list = match service {
            InstanceService::Database => {
                let response: DbIpArrayList = self
                    .call(
                        Product::Rds,
                        "DescribeDBInstanceIPArrayList",
                        &[("DBInstanceId", target.instance_id.clone())],
                    )
                    .await?;
                response
                    .items
                    .arrays
                    .into_iter()
                    .find(|array| array.name == target.whitelist_name)
                    .map(|array| array.security_ip_list)
            }
            InstanceService::Cache => {
                let response: CacheSecurityIps = self
                    .call(
                        Product::Redis,
                        "DescribeSecurityIps",
                        &[("InstanceId", target.instance_id.clone())],
                    )
                    .await?;
                response
                    .groups
                    .groups
                    .into_iter()
                    .find(|group| group.security_ip_group_name == target.whitelist_name)
                    .map(|group| group.security_ip_list)
            }
        };

        let list = list.ok_or_else(|| {
            Error::group_not_found(&target.instance_id, &target.whitelist_name)
        })?;
        Ok(Membership::parse_list(&list))
    }

    async fn replace_instance_whitelist(
        &self,
        service: InstanceService,
        target: &InstanceWhitelistTarget,
        membership: &Membership,
    ) -> Result<()> {
        let ips = membership.to_list_string();

        let result = match service {
            InstanceService::Database => {
                self.mutate(
                    Product::Rds,
                    "ModifySecurityIps",
                    &[
                        ("DBInstanceId", target.instance_id.clone()),
                        ("SecurityIps", ips),
                        ("DBInstanceIPArrayName", target.whitelist_name.clone()),
                        ("WhitelistNetworkType", "MIX".to_string()),
                    ],
                )
                .await
            }
            InstanceService::Cache => {
                self.mutate(
                    Product::Redis,
                    "ModifySecurityIps",
                    &[
                        ("InstanceId", target.instance_id.clone()),
                        ("SecurityIps", ips),
                        ("SecurityIpGroupName", target.whitelist_name.clone()),
                    ],
                )
                .await
            }
        };

        Ok(result?)
    }

    async fn fetch_acl(&self, target: &AclTarget) -> Result<Membership> {
        let attribute = self.describe_acl(target).await?;
        Ok(attribute
            .entries
            .entries
            .iter()
            .map(|entry| strip_host_suffix(entry.ip.trim()))
            .filter(|entry| !entry.is_empty())
            .collect())
    }

    async fn replace_acl(&self, target: &AclTarget, membership: &Membership) -> Result<()> {
        // Remove exactly what is there now, with the comments it carries
        let current = self.describe_acl(target).await?;

        if !current.entries.entries.is_empty() {
            let remove: Vec<AclEntryParam> = current
                .entries
                .entries
                .into_iter()
                .map(|entry| AclEntryParam {
                    entry: entry.ip,
                    comment: entry.comment,
                })
                .collect();
            let remove = serde_json::to_string(&remove)
                .map_err(|e| Error::provider(PROVIDER_NAME, e.to_string()))?;

            self.mutate(
                Product::Slb,
                "RemoveAccessControlListEntry",
                &[("AclId", target.acl_id.clone()), ("AclEntrys", remove)],
            )
            .await?;
        }

        if membership.is_empty() {
            return Ok(());
        }

        let add: Vec<AclEntryParam> = membership
            .iter()
            .map(|value| AclEntryParam {
                entry: acl_entry(value),
                comment: RULE_DESCRIPTION.to_string(),
            })
            .collect();
        let add = serde_json::to_string(&add)
            .map_err(|e| Error::provider(PROVIDER_NAME, e.to_string()))?;

        self.mutate(
            Product::Slb,
            "AddAccessControlListEntry",
            &[("AclId", target.acl_id.clone()), ("AclEntrys", add)],
        )
        .await
        .map_err(|e| {
            Error::provider(
                PROVIDER_NAME,
                format!(
                    "ACL {} was cleared but re-adding entries failed: {}",
                    target.acl_id, e
                ),
            )
        })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Factory for creating Alibaba Cloud providers
pub struct AliyunFactory;

impl CloudProviderFactory for AliyunFactory {
    fn create(&self, account: &AccountConfig) -> Result<Box<dyn CloudProvider>> {
        // Check for dry-run mode environment variable
        let dry_run = std::env::var(MODE_ENV)
            .unwrap_or_default()
            .to_lowercase()
            == "dry-run";

        if dry_run {
            tracing::warn!(
                "Alibaba Cloud provider for account {} running in DRY-RUN mode - no changes will be made",
                account.name
            );
        }

        Ok(Box::new(AliyunProvider::new(
            account.access_key_id.clone(),
            account.access_key_secret.clone(),
            account.region_id.clone(),
            dry_run,
        )?))
    }
}

/// Register the Alibaba Cloud provider with a registry
pub fn register(registry: &wlm_core::PluginRegistry) {
    registry.register_provider(PROVIDER_NAME, Box::new(AliyunFactory));
}
