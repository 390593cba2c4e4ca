//! Configuration types for the whitelist manager
//!
//! The configuration is a YAML document. It is loaded and validated once at
//! startup; everything downstream assumes a validated [`WhitelistConfig`].

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

/// Name given to the account built from the legacy top-level `aliyun` block
pub const LEGACY_ACCOUNT_NAME: &str = "default";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistConfig {
    /// Seconds between scheduled checks
    pub interval: u64,

    /// Single IP source (legacy form, tried before `ip_sources`)
    #[serde(default)]
    pub ip_source: Option<IpSourceConfig>,

    /// Ordered IP sources
    #[serde(default)]
    pub ip_sources: Vec<IpSourceConfig>,

    /// Cloud accounts to keep in sync
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,

    /// Legacy single-account block, used only when `accounts` is empty
    #[serde(default)]
    pub aliyun: Option<AccountConfig>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl WhitelistConfig {
    /// Parse a configuration from YAML text (not validated)
    pub fn from_yaml_str(text: &str) -> Result<Self, crate::Error> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read and parse a configuration file (not validated)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Interval between scheduled checks
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// IP sources in the order they should be tried
    pub fn sources(&self) -> Vec<IpSourceConfig> {
        self.ip_source
            .iter()
            .chain(self.ip_sources.iter())
            .cloned()
            .collect()
    }

    /// Accounts in configured order
    ///
    /// Falls back to the legacy `aliyun` block, named [`LEGACY_ACCOUNT_NAME`]
    /// unless it carries a name of its own.
    pub fn effective_accounts(&self) -> Vec<AccountConfig> {
        if !self.accounts.is_empty() {
            return self.accounts.clone();
        }

        self.aliyun
            .iter()
            .cloned()
            .map(|mut account| {
                if account.name.is_empty() {
                    account.name = LEGACY_ACCOUNT_NAME.to_string();
                }
                account
            })
            .collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval == 0 {
            return Err(crate::Error::config("interval must be greater than 0"));
        }

        let sources = self.sources();
        if sources.is_empty() {
            return Err(crate::Error::config("at least one IP source is required"));
        }
        for (i, source) in sources.iter().enumerate() {
            source
                .validate()
                .map_err(|e| crate::Error::config(format!("IP source {}: {}", i, e)))?;
        }

        if self.engine.event_channel_capacity == 0 {
            return Err(crate::Error::config(
                "engine.event_channel_capacity must be greater than 0",
            ));
        }

        if self.accounts.is_empty() {
            let account = self.aliyun.as_ref().ok_or_else(|| {
                crate::Error::config("either accounts or the aliyun block must be configured")
            })?;
            return account.validate_credentials_and_targets("aliyun");
        }

        let mut names = HashSet::new();
        for (i, account) in self.accounts.iter().enumerate() {
            let label = format!("account {}", i);
            if account.name.is_empty() {
                return Err(crate::Error::config(format!("{}: name is required", label)));
            }
            if !names.insert(account.name.as_str()) {
                return Err(crate::Error::config(format!(
                    "{}: duplicate account name '{}'",
                    label, account.name
                )));
            }
            account.validate_credentials_and_targets(&label)?;
        }

        Ok(())
    }
}

/// IP source configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpSourceConfig {
    /// Query an HTTP endpoint that echoes the caller's address
    Http {
        /// URL to fetch the IP from
        url: String,
        /// Extra request headers
        #[serde(default)]
        headers: HashMap<String, String>,
        /// Request timeout in seconds
        #[serde(default = "default_source_timeout")]
        timeout: u64,
    },

    /// Run a shell command that prints the IP
    Command {
        /// Command line passed to `sh -c`
        cmd: String,
        /// Execution timeout in seconds
        #[serde(default = "default_source_timeout")]
        timeout: u64,
    },

    /// Read the address bound to a local network interface
    Interface {
        /// Interface name (e.g. "eth0")
        interface: String,
        /// Select an IPv6 address instead of IPv4
        #[serde(default)]
        ipv6: bool,
    },
}

impl IpSourceConfig {
    /// Registry name of the source type
    pub fn type_name(&self) -> &'static str {
        match self {
            IpSourceConfig::Http { .. } => "http",
            IpSourceConfig::Command { .. } => "command",
            IpSourceConfig::Interface { .. } => "interface",
        }
    }

    /// Time budget for one attempt at this source
    pub fn timeout(&self) -> Duration {
        match self {
            IpSourceConfig::Http { timeout, .. } | IpSourceConfig::Command { timeout, .. } => {
                Duration::from_secs(*timeout)
            }
            IpSourceConfig::Interface { .. } => Duration::from_secs(default_source_timeout()),
        }
    }

    /// Validate the IP source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            IpSourceConfig::Http { url, timeout, .. } => {
                if url.is_empty() {
                    return Err(crate::Error::config("http source: url is required"));
                }
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    return Err(crate::Error::config(format!(
                        "http source: url must use http or https, got {}",
                        url
                    )));
                }
                if *timeout == 0 {
                    return Err(crate::Error::config("http source: timeout must be > 0"));
                }
                Ok(())
            }
            IpSourceConfig::Command { cmd, timeout } => {
                if cmd.trim().is_empty() {
                    return Err(crate::Error::config("command source: cmd is required"));
                }
                if *timeout == 0 {
                    return Err(crate::Error::config("command source: timeout must be > 0"));
                }
                Ok(())
            }
            IpSourceConfig::Interface { interface, .. } => {
                if interface.is_empty() {
                    return Err(crate::Error::config(
                        "interface source: interface is required",
                    ));
                }
                Ok(())
            }
        }
    }
}

fn default_source_timeout() -> u64 {
    10
}

/// One cloud account and the whitelist-bearing resources it owns
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Account name, used in logs and reports
    #[serde(default)]
    pub name: String,

    /// Provider plugin that serves this account
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Access key id
    pub access_key_id: String,

    /// Access key secret
    /// ⚠️ NEVER log this value
    pub access_key_secret: String,

    /// Region the provider clients are bound to
    pub region_id: String,

    /// Compute security groups
    #[serde(default)]
    pub ecs: EcsConfig,

    /// Managed database whitelists
    #[serde(default)]
    pub rds: InstanceWhitelistConfig,

    /// Managed cache whitelists
    #[serde(default)]
    pub redis: InstanceWhitelistConfig,

    /// Load-balancer ACLs
    #[serde(default)]
    pub clb: ClbConfig,
}

// Custom Debug implementation that hides the access key secret
impl std::fmt::Debug for AccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountConfig")
            .field("name", &self.name)
            .field("provider", &self.provider)
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<REDACTED>")
            .field("region_id", &self.region_id)
            .field("ecs", &self.ecs)
            .field("rds", &self.rds)
            .field("redis", &self.redis)
            .field("clb", &self.clb)
            .finish()
    }
}

fn default_provider() -> String {
    "aliyun".to_string()
}

impl AccountConfig {
    /// Create an account with credentials and no enabled resources
    pub fn new(
        name: impl Into<String>,
        access_key_id: impl Into<String>,
        access_key_secret: impl Into<String>,
        region_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider: default_provider(),
            access_key_id: access_key_id.into(),
            access_key_secret: access_key_secret.into(),
            region_id: region_id.into(),
            ..Self::default()
        }
    }

    /// Enable the compute firewall with the given security groups
    pub fn with_security_groups(mut self, groups: Vec<SecurityGroupTarget>) -> Self {
        self.ecs = EcsConfig {
            enabled: true,
            security_groups: groups,
        };
        self
    }

    /// Enable database whitelists with the given targets
    pub fn with_database_whitelists(mut self, targets: Vec<InstanceWhitelistTarget>) -> Self {
        self.rds = InstanceWhitelistConfig {
            enabled: true,
            instance_whitelists: targets,
        };
        self
    }

    /// Enable cache whitelists with the given targets
    pub fn with_cache_whitelists(mut self, targets: Vec<InstanceWhitelistTarget>) -> Self {
        self.redis = InstanceWhitelistConfig {
            enabled: true,
            instance_whitelists: targets,
        };
        self
    }

    /// Enable load-balancer ACLs with the given targets
    pub fn with_acls(mut self, targets: Vec<AclTarget>) -> Self {
        self.clb = ClbConfig {
            enabled: true,
            load_balancer_whitelists: targets,
        };
        self
    }

    fn validate_credentials_and_targets(&self, label: &str) -> Result<(), crate::Error> {
        let require = |value: &str, field: &str| {
            if value.is_empty() {
                Err(crate::Error::config(format!("{}: {} is required", label, field)))
            } else {
                Ok(())
            }
        };

        require(&self.provider, "provider")?;
        require(&self.access_key_id, "access_key_id")?;
        require(&self.access_key_secret, "access_key_secret")?;
        require(&self.region_id, "region_id")?;

        if self.ecs.enabled {
            if self.ecs.security_groups.is_empty() {
                return Err(crate::Error::config(format!(
                    "{}: at least one ECS security group must be configured when ECS is enabled",
                    label
                )));
            }
            for (j, sg) in self.ecs.security_groups.iter().enumerate() {
                require(
                    &sg.security_group_id,
                    &format!("ECS security group {} security_group_id", j),
                )?;
                require(&sg.port, &format!("ECS security group {} port", j))?;
                if !(1..=100).contains(&sg.priority) {
                    return Err(crate::Error::config(format!(
                        "{}: ECS security group {} priority must be between 1 and 100",
                        label, j
                    )));
                }
            }
        }

        for (kind, section) in [("RDS", &self.rds), ("Redis", &self.redis)] {
            if !section.enabled {
                continue;
            }
            if section.instance_whitelists.is_empty() {
                return Err(crate::Error::config(format!(
                    "{}: at least one {} instance whitelist must be configured when {} is enabled",
                    label, kind, kind
                )));
            }
            for (j, iw) in section.instance_whitelists.iter().enumerate() {
                require(
                    &iw.instance_id,
                    &format!("{} instance whitelist {} instance_id", kind, j),
                )?;
                require(
                    &iw.whitelist_name,
                    &format!("{} instance whitelist {} whitelist_name", kind, j),
                )?;
            }
        }

        if self.clb.enabled {
            if self.clb.load_balancer_whitelists.is_empty() {
                return Err(crate::Error::config(format!(
                    "{}: at least one CLB whitelist must be configured when CLB is enabled",
                    label
                )));
            }
            for (j, acl) in self.clb.load_balancer_whitelists.iter().enumerate() {
                require(&acl.acl_id, &format!("CLB whitelist {} acl_id", j))?;
            }
        }

        Ok(())
    }
}

/// Compute security group settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EcsConfig {
    /// Whether this resource kind is reconciled
    #[serde(default)]
    pub enabled: bool,
    /// Security groups to keep in sync
    #[serde(default)]
    pub security_groups: Vec<SecurityGroupTarget>,
}

/// One security group rule slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupTarget {
    /// Security group id
    pub security_group_id: String,
    /// Port specification: "22", "80/80", "1/65535" or "-1/-1"
    pub port: String,
    /// Rule priority
    pub priority: u32,
}

impl SecurityGroupTarget {
    /// Create a security group target
    pub fn new(security_group_id: impl Into<String>, port: impl Into<String>, priority: u32) -> Self {
        Self {
            security_group_id: security_group_id.into(),
            port: port.into(),
            priority,
        }
    }
}

/// Database or cache whitelist settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstanceWhitelistConfig {
    /// Whether this resource kind is reconciled
    #[serde(default)]
    pub enabled: bool,
    /// Instance whitelist groups to keep in sync
    #[serde(default)]
    pub instance_whitelists: Vec<InstanceWhitelistTarget>,
}

/// One named whitelist group on one instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceWhitelistTarget {
    /// Instance id
    pub instance_id: String,
    /// Whitelist group name
    pub whitelist_name: String,
}

impl InstanceWhitelistTarget {
    /// Create an instance whitelist target
    pub fn new(instance_id: impl Into<String>, whitelist_name: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            whitelist_name: whitelist_name.into(),
        }
    }
}

/// Load-balancer ACL settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClbConfig {
    /// Whether this resource kind is reconciled
    #[serde(default)]
    pub enabled: bool,
    /// ACLs to keep in sync
    #[serde(default)]
    pub load_balancer_whitelists: Vec<AclTarget>,
}

/// One load-balancer access-control list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclTarget {
    /// ACL id
    pub acl_id: String,
}

impl AclTarget {
    /// Create an ACL target
    pub fn new(acl_id: impl Into<String>) -> Self {
        Self {
            acl_id: acl_id.into(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTI_ACCOUNT: &str = r#"
interval: 300
ip_source:
  type: http
  url: https://api.ipify.org
  headers:
    X-Api-Key: abc
ip_sources:
  - type: command
    cmd: "curl -s https://ifconfig.me"
    timeout: 5
  - type: interface
    interface: eth0
    ipv6: true
accounts:
  - name: prod
    access_key_id: AKID
    access_key_secret: SECRET
    region_id: cn-hangzhou
    ecs:
      enabled: true
      security_groups:
        - security_group_id: sg-1
          port: "22"
          priority: 1
    rds:
      enabled: true
      instance_whitelists:
        - instance_id: rm-1
          whitelist_name: office
  - name: staging
    access_key_id: AKID2
    access_key_secret: SECRET2
    region_id: cn-shanghai
    clb:
      enabled: true
      load_balancer_whitelists:
        - acl_id: acl-1
"#;

    #[test]
    fn test_parse_multi_account() {
        let config = WhitelistConfig::from_yaml_str(MULTI_ACCOUNT).unwrap();
        config.validate().unwrap();

        assert_eq!(config.interval(), Duration::from_secs(300));

        let sources = config.sources();
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0].type_name(), "http");
        assert_eq!(sources[0].timeout(), Duration::from_secs(10));
        assert_eq!(sources[1].type_name(), "command");
        assert_eq!(sources[1].timeout(), Duration::from_secs(5));
        assert_eq!(
            sources[2],
            IpSourceConfig::Interface {
                interface: "eth0".to_string(),
                ipv6: true
            }
        );

        let accounts = config.effective_accounts();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].name, "prod");
        assert_eq!(accounts[0].provider, "aliyun");
        assert!(accounts[0].ecs.enabled);
        assert!(!accounts[0].redis.enabled);
        assert_eq!(accounts[1].clb.load_balancer_whitelists[0].acl_id, "acl-1");
    }

    #[test]
    fn test_legacy_single_account() {
        let yaml = r#"
interval: 60
ip_source:
  type: command
  cmd: "echo 1.2.3.4"
aliyun:
  access_key_id: AKID
  access_key_secret: SECRET
  region_id: cn-hangzhou
  redis:
    enabled: true
    instance_whitelists:
      - instance_id: r-1
        whitelist_name: default
"#;
        let config = WhitelistConfig::from_yaml_str(yaml).unwrap();
        config.validate().unwrap();

        let accounts = config.effective_accounts();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].name, LEGACY_ACCOUNT_NAME);
        assert!(accounts[0].redis.enabled);
    }

    #[test]
    fn test_validation_failures() {
        let base = WhitelistConfig::from_yaml_str(MULTI_ACCOUNT).unwrap();

        let mut config = base.clone();
        config.interval = 0;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.ip_source = None;
        config.ip_sources.clear();
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.accounts[0].ecs.security_groups[0].priority = 0;
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.accounts[0].rds.instance_whitelists.clear();
        assert!(config.validate().is_err());

        let mut config = base.clone();
        config.accounts[1].name = "prod".to_string();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("duplicate"), "unexpected error: {}", err);

        let mut config = base.clone();
        config.accounts[1].access_key_secret.clear();
        assert!(config.validate().is_err());

        let mut config = base;
        config.accounts.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_source_validation() {
        let bad_scheme = IpSourceConfig::Http {
            url: "ftp://example.com".to_string(),
            headers: HashMap::new(),
            timeout: 10,
        };
        assert!(bad_scheme.validate().is_err());

        let zero_timeout = IpSourceConfig::Command {
            cmd: "echo 1.2.3.4".to_string(),
            timeout: 0,
        };
        assert!(zero_timeout.validate().is_err());

        let no_interface = IpSourceConfig::Interface {
            interface: String::new(),
            ipv6: false,
        };
        assert!(no_interface.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, MULTI_ACCOUNT).unwrap();

        let config = WhitelistConfig::load(&path).unwrap();
        assert_eq!(config.accounts.len(), 2);

        let missing = WhitelistConfig::load(dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_secret_not_exposed_in_debug() {
        let account = AccountConfig::new("prod", "AKID", "very-secret-value", "cn-hangzhou");
        let debug_str = format!("{:?}", account);
        assert!(!debug_str.contains("very-secret-value"));
        assert!(debug_str.contains("AKID"));
    }
}
