//! Configuration management for aws-fail2ban.
//!
//! Values come from an optional YAML file, then command-line overrides. The
//! merged [`Config`] is validated once and frozen into an [`IpSetTarget`] and
//! [`ResourceSettings`] for the rest of the invocation.

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{WafError, WafResult};
use crate::flush::MAX_BATCH_SIZE;
use crate::resource::ResourceSettings;
use crate::retry::{RetryConfig, RetryPolicy};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/aws-fail2ban/config.yaml";

/// CloudFront-scoped wafv2 IP sets live in us-east-1
const CLOUDFRONT_REGION: &str = "us-east-1";

/// Firewall generation (API family) owning the IP set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
pub enum Generation {
    /// WAF Classic (global)
    #[serde(rename = "waf")]
    #[value(name = "waf")]
    Legacy,
    /// WAF Classic Regional
    #[default]
    #[serde(rename = "waf-regional")]
    #[value(name = "waf-regional")]
    Regional,
    /// WAFv2
    #[serde(rename = "wafv2")]
    #[value(name = "wafv2")]
    V2,
}

impl Generation {
    /// AWS CLI service name
    pub fn cli_service(&self) -> &'static str {
        match self {
            Generation::Legacy => "waf",
            Generation::Regional => "waf-regional",
            Generation::V2 => "wafv2",
        }
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cli_service())
    }
}

/// wafv2 deployment scope
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Regional,
    Cloudfront,
}

impl Scope {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Scope::Regional => "REGIONAL",
            Scope::Cloudfront => "CLOUDFRONT",
        }
    }
}

/// The IP set one invocation works on. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpSetTarget {
    pub generation: Generation,
    pub id: String,
    pub name: Option<String>,
    pub region: Option<String>,
    pub scope: Scope,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Firewall generation (waf, waf-regional, wafv2)
    pub firewall: Generation,

    /// IP set id
    pub ip_set_id: Option<String>,

    /// IP set name (wafv2 only)
    pub ip_set_name: Option<String>,

    /// AWS region passed to the CLI
    pub region: Option<String>,

    /// wafv2 scope (regional, cloudfront)
    pub scope: Scope,

    /// AWS CLI profile
    pub profile: Option<String>,

    /// AWS CLI executable
    pub aws_cli: String,

    /// Abort when get-ip-set returns a different id than the configured one
    pub verify_ip_set_id: bool,

    /// Entries removed per update call during a flush (1..=1000)
    pub batch_size: usize,

    /// Convergence retry policy for unban and flush
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            firewall: Generation::default(),
            ip_set_id: None,
            ip_set_name: None,
            region: None,
            scope: Scope::default(),
            profile: None,
            aws_cli: "aws".to_string(),
            verify_ip_set_id: false,
            batch_size: MAX_BATCH_SIZE,
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {:?}", path.as_ref()))?;

        Ok(config)
    }

    /// Load the file if it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate values that do not depend on the target IP set
    pub fn validate(&self) -> WafResult<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(WafError::Configuration(format!(
                "batch_size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE, self.batch_size
            )));
        }

        if self.aws_cli.trim().is_empty() {
            return Err(WafError::Configuration("aws_cli cannot be empty".to_string()));
        }

        self.retry_policy().validate()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from(&self.retry)
    }

    /// Freeze the IP set identity, checking what the chosen generation needs
    pub fn target(&self) -> WafResult<IpSetTarget> {
        let id = non_empty(&self.ip_set_id).ok_or_else(|| {
            WafError::Configuration(format!(
                "You must set a target IP set id (-i) for {}",
                self.firewall
            ))
        })?;

        let name = non_empty(&self.ip_set_name);
        if self.firewall == Generation::V2 && name.is_none() {
            return Err(WafError::Configuration(
                "wafv2 requires an IP set name (-n)".to_string(),
            ));
        }

        if self.scope == Scope::Cloudfront {
            if self.firewall != Generation::V2 {
                return Err(WafError::Configuration(format!(
                    "scope 'cloudfront' only applies to wafv2, not {}",
                    self.firewall
                )));
            }
            if let Some(region) = non_empty(&self.region) {
                if region != CLOUDFRONT_REGION {
                    return Err(WafError::Configuration(format!(
                        "CloudFront IP sets must be managed in {}, not {}",
                        CLOUDFRONT_REGION, region
                    )));
                }
            }
        }

        Ok(IpSetTarget {
            generation: self.firewall,
            id,
            name,
            region: non_empty(&self.region),
            scope: self.scope,
        })
    }

    pub fn settings(&self) -> ResourceSettings {
        ResourceSettings {
            retry: self.retry_policy(),
            batch_size: self.batch_size,
            verify_ip_set_id: self.verify_ip_set_id,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
