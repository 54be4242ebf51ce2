//! Flush command implementation.

use anyhow::{Context, Result};
use tracing::warn;

use crate::resource::IpSetResource;

/// Run the flush command
pub async fn run(resource: &mut IpSetResource) -> Result<()> {
    let report = resource
        .unban_all()
        .await
        .with_context(|| format!("Failed to flush IP set {}", resource.target().id))?;

    if report.batches_failed > 0 {
        warn!(
            "{} batch(es) failed along the way and were retried",
            report.batches_failed
        );
    }
    Ok(())
}
