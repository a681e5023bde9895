//! Collaborator capabilities consumed by the pipeline

use crate::error::Result;
use crate::remote::{Cursor, ItemId, ListPage, TransferJob};
use async_trait::async_trait;
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Paginated listing of remote items
#[async_trait]
pub trait ItemLister: Send + Sync {
    /// Fetch the page starting at `cursor`
    async fn list_items(&self, cursor: Cursor, cancel: &CancellationToken) -> Result<ListPage>;
}

/// Moves the bytes of one job.
///
/// Implementations do not check whether the job was already done; the
/// worker pool asks a [`Presence`] first.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Perform the transfer, returning the number of bytes moved
    async fn transfer(&self, job: &TransferJob, cancel: &CancellationToken) -> Result<u64>;
}

/// Idempotency check: has this job already been completed?
#[async_trait]
pub trait Presence: Send + Sync {
    async fn is_present(&self, job: &TransferJob) -> bool;
}

/// Downloads are done when a file exists at the job's path
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFiles;

#[async_trait]
impl Presence for LocalFiles {
    async fn is_present(&self, job: &TransferJob) -> bool {
        // Metadata errors count as absent; the transfer will surface real problems
        tokio::fs::try_exists(&job.path).await.unwrap_or(false)
    }
}

/// Uploads are done when the item's id is already known to the remote
#[derive(Debug, Clone, Default)]
pub struct KnownRemote {
    ids: HashSet<ItemId>,
}

impl KnownRemote {
    pub fn new(ids: impl IntoIterator<Item = ItemId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[async_trait]
impl Presence for KnownRemote {
    async fn is_present(&self, job: &TransferJob) -> bool {
        self.ids.contains(&job.item.id)
    }
}
