//! Unban command implementation.

use anyhow::{Context, Result};

use crate::resource::IpSetResource;

/// Run the unban command. Returns once the address is confirmed gone.
pub async fn run(resource: &mut IpSetResource, ip: &str) -> Result<()> {
    resource
        .unban(ip)
        .await
        .with_context(|| format!("Failed to unban {}", ip))?;
    Ok(())
}
