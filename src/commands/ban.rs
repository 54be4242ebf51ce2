//! Ban command implementation.

use anyhow::{Context, Result};
use tracing::info;

use crate::resource::IpSetResource;

/// Run the ban command
pub async fn run(resource: &mut IpSetResource, ip: &str) -> Result<()> {
    let address = resource
        .ban(ip)
        .await
        .with_context(|| format!("Failed to ban {}", ip))?;

    info!("Banned {} in IP set {}", address, resource.target().id);
    Ok(())
}
