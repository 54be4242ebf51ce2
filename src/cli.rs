//! CLI argument parsing with clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Config, Generation, Scope, DEFAULT_CONFIG_PATH};

#[derive(Parser)]
#[command(name = "aws-fail2ban")]
#[command(author, version, about = "Ban and unban fail2ban offenders in an AWS WAF IP set")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH, global = true)]
    pub config: PathBuf,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose mode (debug output, including tokens)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Target IP set id
    #[arg(short = 'i', long = "ip-set-id", global = true)]
    pub ip_set_id: Option<String>,

    /// AWS region
    #[arg(short, long, global = true)]
    pub region: Option<String>,

    /// IP set name (required for wafv2)
    #[arg(short = 'n', long = "name", global = true)]
    pub ip_set_name: Option<String>,

    /// Firewall generation owning the IP set
    #[arg(long, value_enum, global = true)]
    pub firewall: Option<Generation>,

    /// wafv2 scope
    #[arg(long, value_enum, global = true)]
    pub scope: Option<Scope>,

    /// AWS CLI profile
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Give up unban/flush after this many attempts
    #[arg(long, global = true)]
    pub max_attempts: Option<u32>,

    /// Give up unban/flush after this many seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub deadline: Option<u64>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add an address to the IP set
    Ban {
        /// IPv4/IPv6 address, optionally with a prefix length
        ip: String,
    },

    /// Remove an address from the IP set and wait until it is gone
    Unban {
        /// IPv4/IPv6 address, optionally with a prefix length
        ip: String,
    },

    /// Print the banned addresses
    List,

    /// Remove every address from the IP set
    Flush,

    /// Show version
    Version,
}

impl Cli {
    /// Overlay the command-line flags on values loaded from the config file
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(firewall) = self.firewall {
            config.firewall = firewall;
        }
        if let Some(scope) = self.scope {
            config.scope = scope;
        }
        if self.ip_set_id.is_some() {
            config.ip_set_id = self.ip_set_id.clone();
        }
        if self.ip_set_name.is_some() {
            config.ip_set_name = self.ip_set_name.clone();
        }
        if self.region.is_some() {
            config.region = self.region.clone();
        }
        if self.profile.is_some() {
            config.profile = self.profile.clone();
        }
        if let Some(max_attempts) = self.max_attempts {
            config.retry.max_attempts = Some(max_attempts);
        }
        if let Some(deadline) = self.deadline {
            config.retry.deadline_secs = Some(deadline);
        }
    }
}
