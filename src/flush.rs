//! Batched removal of IP set entries.
//!
//! AWS WAF accepts at most 1000 operations per `update-ip-set` call, so a flush
//! splits the current entries into consecutive batches and submits them one at
//! a time. A failed batch does not stop the pass; the caller re-lists the IP
//! set afterwards and starts another pass if anything is left.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::WafResult;
use crate::waf::IpSetDescriptor;

/// Per-call operation limit of the WAF API
pub const MAX_BATCH_SIZE: usize = 1000;

/// A bounded slice of the entries being removed in one update call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchDescriptor<'a, T> {
    /// Zero-based batch number within the pass
    pub index: usize,
    /// Position of the first entry within the full collection
    pub offset: usize,
    pub entries: &'a [T],
}

impl<T> BatchDescriptor<'_, T> {
    /// Position one past the last entry
    pub fn end(&self) -> usize {
        self.offset + self.entries.len()
    }
}

/// Split `entries` into consecutive batches of at most `batch_size` (capped to
/// [`MAX_BATCH_SIZE`]), keeping the listing order.
pub fn partition<T>(entries: &[T], batch_size: usize) -> Vec<BatchDescriptor<'_, T>> {
    let size = batch_size.clamp(1, MAX_BATCH_SIZE);
    entries
        .chunks(size)
        .enumerate()
        .map(|(index, chunk)| BatchDescriptor {
            index,
            offset: index * size,
            entries: chunk,
        })
        .collect()
}

/// Outcome of one flush pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushSummary {
    /// Entries the pass set out to remove
    pub entries: usize,
    pub batches_attempted: usize,
    pub batches_failed: usize,
    /// Messages of the absorbed batch failures
    pub errors: Vec<String>,
}

impl FlushSummary {
    pub fn all_succeeded(&self) -> bool {
        self.batches_failed == 0
    }
}

/// Submits the removal of one batch
#[async_trait]
pub trait BatchApplier: Send {
    async fn apply_batch(&mut self, batch: &[IpSetDescriptor]) -> WafResult<()>;
}

/// Run one pass over `entries`.
///
/// Non-fatal batch errors are recorded in the summary and the pass moves on to
/// the next batch. Fatal errors (configuration, validation) end the pass.
pub async fn flush<A: BatchApplier + ?Sized>(
    applier: &mut A,
    entries: &[IpSetDescriptor],
    batch_size: usize,
) -> WafResult<FlushSummary> {
    let mut summary = FlushSummary {
        entries: entries.len(),
        ..FlushSummary::default()
    };
    let total = entries.len();

    for batch in partition(entries, batch_size) {
        info!(
            "Unbanning {} to {} of {} banned IPs",
            batch.offset,
            batch.end(),
            total
        );
        summary.batches_attempted += 1;

        if let Err(err) = applier.apply_batch(batch.entries).await {
            if err.is_fatal() {
                return Err(err);
            }
            warn!("Batch {} failed: {}", batch.index + 1, err);
            summary.batches_failed += 1;
            summary.errors.push(err.to_string());
        }
    }

    Ok(summary)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Batches cover every entry exactly once, in order, within the limit
        #[test]
        fn prop_partition_covers_in_order(len in 0usize..5000, size in 1usize..1500) {
            let items: Vec<usize> = (0..len).collect();
            let batches = partition(&items, size);
            let flattened: Vec<usize> = batches.iter().flat_map(|b| b.entries.iter().copied()).collect();
            prop_assert_eq!(&flattened, &items);
            prop_assert!(batches.iter().all(|b| !b.entries.is_empty() && b.entries.len() <= MAX_BATCH_SIZE));
        }

        #[test]
        fn prop_partition_batch_count(len in 0usize..5000) {
            let items: Vec<usize> = (0..len).collect();
            let batches = partition(&items, MAX_BATCH_SIZE);
            prop_assert_eq!(batches.len(), len.div_ceil(MAX_BATCH_SIZE));
        }
    }
}
