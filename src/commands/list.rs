//! List command implementation.

use anyhow::{Context, Result};

use crate::resource::IpSetResource;
use crate::waf::IpSetDescriptor;

/// Run the list command
pub async fn run(resource: &mut IpSetResource) -> Result<()> {
    let entries = resource
        .list_entries()
        .await
        .context("Failed to list IP set")?;

    print!("{}", render(&entries));
    Ok(())
}

/// Banlist report: a count line, then every entry value as the service
/// returned it
pub fn render(entries: &[IpSetDescriptor]) -> String {
    let mut out = format!("{} banned.\n", entries.len());
    for entry in entries {
        out.push_str(&entry.value);
        out.push('\n');
    }
    out
}
