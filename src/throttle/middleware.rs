//! Rate-limiting middleware for collaborators
//!
//! [`RateLimited`] puts an [`RpcLimiter`] in front of every remote call a
//! collaborator makes: one token per listing page, per transfer, and per
//! step of the upload sequence.

use crate::error::Result;
use crate::remote::{Cursor, Item, ItemLister, ListPage, Transfer, TransferJob};
use crate::throttle::RpcLimiter;
use crate::upload::{SentUpdate, Uploader};
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// A collaborator whose remote calls draw from a shared rate budget
#[derive(Debug, Clone)]
pub struct RateLimited<C> {
    inner: C,
    limiter: RpcLimiter,
}

impl<C> RateLimited<C> {
    pub fn new(inner: C, limiter: RpcLimiter) -> Self {
        Self { inner, limiter }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn limiter(&self) -> &RpcLimiter {
        &self.limiter
    }
}

#[async_trait]
impl<C: ItemLister> ItemLister for RateLimited<C> {
    async fn list_items(&self, cursor: Cursor, cancel: &CancellationToken) -> Result<ListPage> {
        self.limiter.acquire(cancel).await?;
        self.inner.list_items(cursor, cancel).await
    }
}

#[async_trait]
impl<C: Transfer> Transfer for RateLimited<C> {
    async fn transfer(&self, job: &TransferJob, cancel: &CancellationToken) -> Result<u64> {
        self.limiter.acquire(cancel).await?;
        self.inner.transfer(job, cancel).await
    }
}

#[async_trait]
impl<C: Uploader> Uploader for RateLimited<C> {
    async fn send_to_self(&self, path: &Path, cancel: &CancellationToken) -> Result<SentUpdate> {
        self.limiter.acquire(cancel).await?;
        self.inner.send_to_self(path, cancel).await
    }

    async fn save(&self, item: &Item, cancel: &CancellationToken) -> Result<()> {
        self.limiter.acquire(cancel).await?;
        self.inner.save(item, cancel).await
    }

    async fn revoke(&self, message_id: i32, cancel: &CancellationToken) -> Result<()> {
        self.limiter.acquire(cancel).await?;
        self.inner.revoke(message_id, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GifSyncError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    struct CountingLister {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ItemLister for CountingLister {
        async fn list_items(&self, _cursor: Cursor, _cancel: &CancellationToken) -> Result<ListPage> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ListPage::NotModified)
        }
    }

    #[tokio::test]
    async fn test_calls_draw_tokens() {
        let limiter = RpcLimiter::new(Duration::from_secs(3600), 2).unwrap();
        let lister = RateLimited::new(CountingLister::default(), limiter);
        let cancel = CancellationToken::new();

        lister.list_items(Cursor::START, &cancel).await.unwrap();
        lister.list_items(Cursor::START, &cancel).await.unwrap();
        assert!(!lister.limiter().try_acquire());
        assert_eq!(lister.inner().calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cancelled_call_never_reaches_inner() {
        let limiter = RpcLimiter::new(Duration::from_secs(3600), 1).unwrap();
        let lister = Arc::new(RateLimited::new(CountingLister::default(), limiter));
        let cancel = CancellationToken::new();
        lister.list_items(Cursor::START, &cancel).await.unwrap();

        let handle = {
            let lister = Arc::clone(&lister);
            let cancel = cancel.clone();
            tokio::spawn(async move { lister.list_items(Cursor::START, &cancel).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert!(matches!(result, Err(GifSyncError::Cancelled)));
        assert_eq!(lister.inner().calls.load(Ordering::SeqCst), 1);
    }
}
