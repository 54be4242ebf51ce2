//! CLI command implementations.

pub mod ban;
pub mod flush;
pub mod list;
pub mod unban;

use anyhow::{Context, Result};
use tracing::debug;

use crate::cli::Cli;
use crate::config::Config;
use crate::resource::IpSetResource;
use crate::waf::create_client;

/// Load the config file (if any) and apply the command-line overrides
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_or_default(&cli.config)?;
    cli.apply_to(&mut config);
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Build the IP set resource the action will work on
pub fn open_resource(cli: &Cli) -> Result<IpSetResource> {
    let config = load_config(cli)?;
    let target = config.target()?;
    debug!(
        "Using {} IP set {} (region: {})",
        target.generation,
        target.id,
        target.region.as_deref().unwrap_or("default")
    );

    Ok(IpSetResource::new(
        create_client(&config),
        target,
        config.settings(),
    ))
}
