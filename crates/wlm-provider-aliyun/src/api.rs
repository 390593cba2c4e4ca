//! Response and error shapes of the Alibaba Cloud RPC APIs used here

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of one RPC call
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response
    #[error("{action} failed: request error: {message}")]
    Transport {
        action: &'static str,
        message: String,
    },

    /// The API answered with an error body
    #[error("{action} failed: {code}: {message} (HTTP {status}, RequestId: {request_id})")]
    Api {
        action: &'static str,
        status: u16,
        code: String,
        message: String,
        request_id: String,
    },

    /// The response could not be decoded
    #[error("{action} failed: unexpected response: {detail}")]
    Decode {
        action: &'static str,
        detail: String,
    },
}

impl ApiError {
    /// Provider error code, if the API returned one
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

impl From<ApiError> for wlm_core::Error {
    fn from(err: ApiError) -> Self {
        wlm_core::Error::provider(crate::PROVIDER_NAME, err.to_string())
    }
}

/// Error body returned with non-2xx responses
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub request_id: String,
}

/// `DescribeDBInstanceIPArrayList` response
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DbIpArrayList {
    #[serde(rename = "Items")]
    pub items: DbIpArrayItems,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DbIpArrayItems {
    #[serde(rename = "DBInstanceIPArray")]
    pub arrays: Vec<DbIpArray>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DbIpArray {
    #[serde(rename = "DBInstanceIPArrayName")]
    pub name: String,
    #[serde(rename = "SecurityIPList")]
    pub security_ip_list: String,
}

/// `DescribeSecurityIps` (R-KVStore) response
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CacheSecurityIps {
    #[serde(rename = "SecurityIpGroups")]
    pub groups: CacheSecurityIpGroups,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CacheSecurityIpGroups {
    #[serde(rename = "SecurityIpGroup")]
    pub groups: Vec<CacheSecurityIpGroup>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CacheSecurityIpGroup {
    pub security_ip_group_name: String,
    pub security_ip_list: String,
}

/// `DescribeAccessControlListAttribute` response
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AclAttribute {
    #[serde(rename = "AclEntrys")]
    pub entries: AclEntries,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AclEntries {
    #[serde(rename = "AclEntry")]
    pub entries: Vec<AclEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AclEntry {
    #[serde(rename = "AclEntryIP")]
    pub ip: String,
    #[serde(rename = "AclEntryComment")]
    pub comment: String,
}

/// One element of the `AclEntrys` JSON parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AclEntryParam {
    pub entry: String,
    pub comment: String,
}
