//! AWS WAF API boundary.
//!
//! The reconciliation engine only talks to the firewall through the [`WafApi`]
//! trait, using structured request/response values. [`AwsCliClient`] is the
//! production implementation and shells out to the AWS CLI.

mod aws_cli;
#[cfg(test)]
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use aws_cli::AwsCliClient;

use crate::address::{kind_of, Address};
use crate::config::{Config, Generation, Scope};
use crate::error::WafResult;
use crate::token::VersionToken;

#[cfg(test)]
use mockall::automock;

/// Parameters identifying the IP set on every call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpSetFilter {
    pub generation: Generation,
    pub id: String,
    /// Required by wafv2 only
    pub name: Option<String>,
    /// Required by wafv2 only
    pub scope: Option<Scope>,
}

/// One entry of an IP set as the API returns it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IpSetDescriptor {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl IpSetDescriptor {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// Build a descriptor from a bare address string (wafv2 `Addresses`)
    pub fn from_value(value: impl Into<String>) -> Self {
        let value = value.into();
        Self {
            kind: kind_of(&value).as_str().to_string(),
            value,
        }
    }

    /// Same logical entry, even when the two sides spell it differently
    /// (e.g. expanded vs. compressed IPv6)
    pub fn same_entry(&self, other: &IpSetDescriptor) -> bool {
        if self.value == other.value {
            return true;
        }
        match (self.address(), other.address()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn address(&self) -> Option<Address> {
        self.value.parse().ok()
    }
}

impl From<&Address> for IpSetDescriptor {
    fn from(address: &Address) -> Self {
        Self {
            kind: address.kind().as_str().to_string(),
            value: address.to_cidr_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UpdateAction {
    Insert,
    Delete,
}

/// Typed insert/delete operation (waf, waf-regional)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorUpdate {
    #[serde(rename = "Action")]
    pub action: UpdateAction,
    #[serde(rename = "IPSetDescriptor")]
    pub descriptor: IpSetDescriptor,
}

/// A single state change submitted in one `update-ip-set` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Insert/delete operations against descriptor entries
    Descriptors(Vec<DescriptorUpdate>),
    /// Full replacement of the address collection (wafv2)
    Replace(Vec<String>),
}

impl Mutation {
    /// Number of operations (descriptor style) or resulting addresses (replace style)
    pub fn len(&self) -> usize {
        match self {
            Mutation::Descriptors(updates) => updates.len(),
            Mutation::Replace(addresses) => addresses.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// IP set payload of a `get-ip-set` response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpSetPayload {
    pub id: Option<String>,
    pub name: Option<String>,
    pub descriptors: Vec<IpSetDescriptor>,
}

impl IpSetPayload {
    /// An empty payload means the id is unknown in the queried region
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.name.is_none() && self.descriptors.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpSetResponse {
    pub ip_set: Option<IpSetPayload>,
    /// wafv2 lock token (absent for waf/waf-regional)
    pub lock_token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateResponse {
    /// Token handed back by the service (ChangeToken / NextLockToken)
    pub next_token: Option<String>,
}

/// External client used by the IP set resource
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WafApi: Send + Sync {
    /// Describe the IP set
    async fn get_ip_set(&self, filter: &IpSetFilter) -> WafResult<IpSetResponse>;

    /// Obtain a fresh change token (waf, waf-regional). `None` when the
    /// response carried no token.
    async fn get_change_token(&self, filter: &IpSetFilter) -> WafResult<Option<String>>;

    /// Submit one mutation
    async fn update_ip_set(
        &self,
        filter: &IpSetFilter,
        token: &VersionToken,
        mutation: &Mutation,
    ) -> WafResult<UpdateResponse>;
}

/// Create the AWS CLI backed client for a configuration
pub fn create_client(config: &Config) -> Arc<dyn WafApi> {
    Arc::new(AwsCliClient::new(
        &config.aws_cli,
        config.region.clone(),
        config.profile.clone(),
    ))
}
