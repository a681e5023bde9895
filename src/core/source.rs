//! Item source: the pipeline's producer
//!
//! Pages through the listing collaborator and pushes every usable item onto
//! the bounded work channel. The sender is owned by [`ItemSource::run`], so
//! the channel closes exactly once, on whatever path the producer exits by.

use crate::core::PipelineStats;
use crate::error::{GifSyncError, Result};
use crate::progress::ProgressReporter;
use crate::remote::{Cursor, Item, ItemLister, ListPage};
use async_channel::Sender;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// One page worth of usable items
struct Batch {
    items: Vec<Item>,
    empty: u64,
    next: Option<Cursor>,
}

/// Producer issuing the listing calls
#[derive(Clone)]
pub struct ItemSource {
    lister: Arc<dyn ItemLister>,
}

impl ItemSource {
    pub fn new(lister: Arc<dyn ItemLister>) -> Self {
        Self { lister }
    }

    /// Fetch the page at `cursor`; `None` means the listing is exhausted
    async fn fetch(&self, cursor: Cursor, cancel: &CancellationToken) -> Result<Option<Batch>> {
        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GifSyncError::Cancelled),
            page = self.lister.list_items(cursor, cancel) => {
                page.map_err(|e| GifSyncError::listing(cursor, e))?
            }
        };

        match page {
            // Only reachable with a cached pagination hash; treat as done
            ListPage::NotModified => {
                debug!(%cursor, "Listing not modified");
                Ok(None)
            }
            ListPage::Page { entries, .. } if entries.is_empty() => {
                debug!(%cursor, "Listing exhausted");
                Ok(None)
            }
            ListPage::Page { entries, next } => {
                let total = entries.len();
                let items: Vec<Item> = entries.into_iter().filter_map(|e| e.into_item()).collect();
                let empty = (total - items.len()) as u64;
                if empty > 0 {
                    debug!(%cursor, empty, "Skipping empty listing records");
                }
                Ok(Some(Batch { items, empty, next }))
            }
        }
    }

    /// Emit every listed item onto `tx` until the listing is exhausted.
    ///
    /// Returns the number of items sent. Stops quietly if every receiver is
    /// gone.
    pub async fn run(
        self,
        tx: Sender<Item>,
        cancel: CancellationToken,
        stats: Arc<PipelineStats>,
        progress: Option<Arc<ProgressReporter>>,
    ) -> Result<u64> {
        let mut cursor = Cursor::START;
        let mut sent = 0u64;

        loop {
            let Some(batch) = self.fetch(cursor, &cancel).await? else {
                break;
            };
            stats.pages.fetch_add(1, Ordering::SeqCst);
            stats.empty_entries.fetch_add(batch.empty, Ordering::SeqCst);

            for item in batch.items {
                let send = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(GifSyncError::Cancelled),
                    send = tx.send(item) => send,
                };
                if send.is_err() {
                    debug!(sent, "All workers gone, stopping listing");
                    return Ok(sent);
                }

                sent += 1;
                stats.discovered.fetch_add(1, Ordering::SeqCst);
                if let Some(progress) = &progress {
                    progress.item_discovered();
                }
            }

            match batch.next {
                Some(next) => cursor = next,
                None => break,
            }
        }

        info!(count = sent, "Listing complete");
        Ok(sent)
    }

    /// Collect every listed item without a channel
    pub async fn collect(&self, cancel: &CancellationToken) -> Result<Vec<Item>> {
        let mut cursor = Cursor::START;
        let mut items = Vec::new();

        while let Some(batch) = self.fetch(cursor, cancel).await? {
            items.extend(batch.items);
            match batch.next {
                Some(next) => cursor = next,
                None => break,
            }
        }

        Ok(items)
    }
}
