//! IP set resource: list, ban, unban and flush against one remote IP set.
//!
//! A single driver holds the convergence and batching logic. The differences
//! between firewall generations (filter shape, mutation style, token source)
//! are injected through an [`IpSetVariant`] strategy object.

pub mod variant;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::address::{normalize, Address};
use crate::config::IpSetTarget;
use crate::error::{WafError, WafResult};
use crate::flush::{flush, BatchApplier, MAX_BATCH_SIZE};
use crate::retry::RetryPolicy;
use crate::token::TokenManager;
use crate::waf::{IpSetDescriptor, IpSetFilter, WafApi};

pub use variant::{variant_for, IpSetVariant};

/// Behavior knobs frozen from the configuration
#[derive(Debug, Clone)]
pub struct ResourceSettings {
    pub retry: RetryPolicy,
    /// Entries removed per update call during a flush
    pub batch_size: usize,
    /// Reject responses whose IP set id differs from the configured one
    pub verify_ip_set_id: bool,
}

impl Default for ResourceSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            batch_size: MAX_BATCH_SIZE,
            verify_ip_set_id: false,
        }
    }
}

/// Result of [`IpSetResource::list`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Addresses(Vec<Address>),
    Descriptors(Vec<IpSetDescriptor>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnbanReport {
    pub address: Address,
    /// Delete attempts needed until the address was confirmed gone
    pub attempts: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Entries present when the flush started
    pub initial_count: usize,
    pub passes: u32,
    pub batches_attempted: usize,
    pub batches_failed: usize,
}

pub struct IpSetResource {
    api: Arc<dyn WafApi>,
    variant: Box<dyn IpSetVariant>,
    target: IpSetTarget,
    filter: IpSetFilter,
    settings: ResourceSettings,
    tokens: TokenManager,
}

impl IpSetResource {
    pub fn new(api: Arc<dyn WafApi>, target: IpSetTarget, settings: ResourceSettings) -> Self {
        let variant = variant_for(target.generation);
        let filter = variant.filter(&target);
        let tokens = TokenManager::new(variant.token_mode());
        Self {
            api,
            variant,
            target,
            filter,
            settings,
            tokens,
        }
    }

    pub fn target(&self) -> &IpSetTarget {
        &self.target
    }

    /// Describe the IP set and return its entries, checking that the
    /// response really is the configured set.
    async fn fetch_ip_set(&mut self) -> WafResult<Vec<IpSetDescriptor>> {
        let response = self.api.get_ip_set(&self.filter).await?;
        self.tokens.observe(response.lock_token);

        let payload = response.ip_set.ok_or_else(|| {
            WafError::Configuration("IPSet not returned in response".to_string())
        })?;

        if payload.is_empty() {
            return Err(WafError::Configuration(format!(
                "No IPSet found for {}. Are you in the correct region?",
                self.target.id
            )));
        }

        if self.settings.verify_ip_set_id && payload.id.as_deref() != Some(self.target.id.as_str()) {
            return Err(WafError::Configuration(format!(
                "IPSetId in response ({}) does not match the configured id ({})",
                payload.id.as_deref().unwrap_or("none"),
                self.target.id
            )));
        }

        debug!(
            "IP set {} holds {} entries",
            self.target.id,
            payload.descriptors.len()
        );
        Ok(payload.descriptors)
    }

    pub async fn list(&mut self, addresses_only: bool) -> WafResult<Listing> {
        if addresses_only {
            self.list_addresses().await.map(Listing::Addresses)
        } else {
            self.list_entries().await.map(Listing::Descriptors)
        }
    }

    /// Entries in the generation's native descriptor form
    pub async fn list_entries(&mut self) -> WafResult<Vec<IpSetDescriptor>> {
        self.fetch_ip_set().await
    }

    /// Entries as normalized addresses. Values that do not parse are skipped.
    pub async fn list_addresses(&mut self) -> WafResult<Vec<Address>> {
        let entries = self.fetch_ip_set().await?;
        Ok(entries
            .iter()
            .filter_map(|entry| match entry.address() {
                Some(address) => Some(address),
                None => {
                    warn!("Skipping unparsable IP set entry '{}'", entry.value);
                    None
                }
            })
            .collect())
    }

    /// The remote entry matching `address` by normalized CIDR, if any
    pub async fn find_entry(&mut self, address: &Address) -> WafResult<Option<IpSetDescriptor>> {
        let entries = self.fetch_ip_set().await?;
        Ok(entries
            .into_iter()
            .find(|entry| entry.address().as_ref() == Some(address)))
    }

    pub async fn is_banned(&mut self, raw: &str) -> WafResult<bool> {
        let address = normalize(raw)?;
        Ok(self.find_entry(&address).await?.is_some())
    }

    /// Insert `raw` into the IP set with a single mutation. Not verified.
    pub async fn ban(&mut self, raw: &str) -> WafResult<Address> {
        let address = normalize(raw)?;
        info!("Banning {}", address);

        let current = if self.variant.needs_current_entries() {
            self.fetch_ip_set().await?
        } else {
            Vec::new()
        };

        let token = self.tokens.fetch(self.api.as_ref(), &self.filter).await?;
        let mutation = self.variant.insert_mutation(&current, &address);
        debug!("Submitting {:?}", mutation);

        let response = self
            .api
            .update_ip_set(&self.filter, &token, &mutation)
            .await?;
        self.tokens.observe(response.next_token);
        Ok(address)
    }

    /// Remove `raw` from the IP set, retrying until a fresh listing no longer
    /// contains it or the retry policy gives up.
    pub async fn unban(&mut self, raw: &str) -> WafResult<UnbanReport> {
        let address = normalize(raw)?;
        info!("Unbanning {}", address);

        let policy = self.settings.retry.clone();
        let mut retry = policy.start(format!("unban {}", address));
        let mut removal = IpSetDescriptor::from(&address);

        loop {
            let attempt = retry.begin_attempt().await?;

            if let Err(err) = self.delete_entries(std::slice::from_ref(&removal)).await {
                if err.is_fatal() {
                    return Err(err);
                }
                warn!("Unban attempt {} for {} failed: {}", attempt, address, err);
            }

            match self.find_entry(&address).await {
                Ok(None) => {
                    info!("{} unbanned after {} attempt(s)", address, attempt);
                    return Ok(UnbanReport {
                        address,
                        attempts: attempt,
                    });
                }
                Ok(Some(remote)) => {
                    debug!("{} still present after attempt {}", address, attempt);
                    // Delete the entry exactly as the service spells it
                    removal = remote;
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => warn!("Could not verify {}: {}", address, err),
            }
        }
    }

    /// Remove every entry, in batched passes, until the IP set lists empty.
    pub async fn unban_all(&mut self) -> WafResult<FlushReport> {
        let policy = self.settings.retry.clone();
        let mut retry = policy.start("flush");
        let batch_size = self.settings.batch_size;

        let mut entries = self.list_entries().await?;
        let mut report = FlushReport {
            initial_count: entries.len(),
            ..FlushReport::default()
        };

        while !entries.is_empty() {
            let pass = retry.begin_attempt().await?;
            debug!("Flush pass {} over {} entries", pass, entries.len());

            let summary = flush(&mut *self, &entries, batch_size).await?;
            report.passes += 1;
            report.batches_attempted += summary.batches_attempted;
            report.batches_failed += summary.batches_failed;

            entries = match self.list_entries().await {
                Ok(remaining) => remaining,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!("Could not re-list IP set after pass {}: {}", pass, err);
                    entries
                }
            };
        }

        info!(
            "Flushed {} entries in {} pass(es), {} of {} batches failed",
            report.initial_count, report.passes, report.batches_failed, report.batches_attempted
        );
        Ok(report)
    }

    /// One delete mutation with a fresh token. A failed attempt burns the token.
    async fn delete_entries(&mut self, removals: &[IpSetDescriptor]) -> WafResult<()> {
        let current = if self.variant.needs_current_entries() {
            self.fetch_ip_set().await?
        } else {
            Vec::new()
        };

        let token = self.tokens.fetch(self.api.as_ref(), &self.filter).await?;
        let mutation = self.variant.delete_mutation(&current, removals);
        debug!("Submitting delete of {} entries", removals.len());

        match self.api.update_ip_set(&self.filter, &token, &mutation).await {
            Ok(response) => {
                self.tokens.observe(response.next_token);
                Ok(())
            }
            Err(err) => {
                self.tokens.invalidate();
                Err(err)
            }
        }
    }
}

#[async_trait]
impl BatchApplier for IpSetResource {
    async fn apply_batch(&mut self, batch: &[IpSetDescriptor]) -> WafResult<()> {
        self.delete_entries(batch).await
    }
}
