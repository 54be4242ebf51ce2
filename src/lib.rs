//! # aws-fail2ban - fail2ban action for AWS WAF IP sets
//!
//! Keeps an AWS WAF IP set in sync with fail2ban: `ban` inserts an offender,
//! `unban` removes it and waits until the service confirms the removal,
//! `flush` empties the set in batches and `list` prints its contents.
//!
//! ## Features
//!
//! - **Three firewall generations** - WAF Classic, WAF Classic Regional and WAFv2
//! - **Token aware** - every mutation carries a fresh change/lock token
//! - **Self-healing unban** - stale-token no-ops are detected by re-listing and retried
//! - **Batched flush** - at most 1000 operations per update call
//! - **Bounded retries** - attempt cap, deadline and exponential backoff are configurable
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       aws-fail2ban                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CLI (clap)                                                 │
//! │    └── Commands: ban, unban, list, flush, version           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Config (serde_yaml)                                        │
//! │    └── IpSetTarget + ResourceSettings (retry, batch size)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  IpSetResource (generic driver)                             │
//! │    ├── IpSetVariant: Legacy, Regional, V2                   │
//! │    ├── TokenManager (pull / piggyback)                      │
//! │    ├── Flush engine (batches of <= 1000)                    │
//! │    └── RetryPolicy (cap, deadline, backoff)                 │
//! ├─────────────────────────────────────────────────────────────┤
//! │  WafApi trait                                               │
//! │    └── AwsCliClient (aws waf | waf-regional | wafv2)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use aws_fail2ban::config::Config;
//! use aws_fail2ban::resource::IpSetResource;
//! use aws_fail2ban::waf::create_client;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("/etc/aws-fail2ban/config.yaml")?;
//!     let mut resource = IpSetResource::new(create_client(&config), config.target()?, config.settings());
//!
//!     resource.ban("203.0.113.5").await?;
//!     let report = resource.unban("203.0.113.5").await?;
//!     println!("unbanned after {} attempt(s)", report.attempts);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`address`] - Address validation and CIDR normalization
//! - [`cli`] - Command-line interface definitions
//! - [`cmd_abstraction`] - Process execution seam for the AWS CLI
//! - [`commands`] - CLI command implementations
//! - [`config`] - Configuration parsing and validation
//! - [`error`] - Error taxonomy
//! - [`flush`] - Batch partitioning and the flush pass
//! - [`resource`] - IP set driver and per-generation variants
//! - [`retry`] - Retry policy for the convergence loops
//! - [`token`] - Change/lock token lifecycle
//! - [`waf`] - WAF API boundary and the AWS CLI client

pub mod address;
pub mod cli;
pub mod cmd_abstraction;
pub mod commands;
pub mod config;
pub mod error;
pub mod flush;
pub mod resource;
pub mod retry;
pub mod token;
pub mod waf;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use error::{WafError, WafResult};
