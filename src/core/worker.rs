//! Worker pool members
//!
//! Each worker pulls items off the shared channel, maps them to a local path,
//! skips the ones already present and transfers the rest. The first failure
//! is returned to the coordinator, which cancels everyone else.

use crate::core::PipelineStats;
use crate::error::{GifSyncError, Result};
use crate::progress::ProgressReporter;
use crate::remote::{Direction, Item, PathLayout, Presence, Transfer, TransferJob};
use async_channel::Receiver;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Maximum delay between two attempts
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Bounded retry for recoverable transfer errors.
///
/// The default makes a single attempt. Cancellation is never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per item, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles after that
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// A single attempt
    pub fn none() -> Self {
        Self::new(1, Duration::from_millis(500))
    }

    /// Delay after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.base_delay
            .checked_mul(1 << shift)
            .unwrap_or(MAX_RETRY_DELAY)
            .min(MAX_RETRY_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// State shared by every worker of one run
pub(crate) struct WorkerContext {
    pub direction: Direction,
    pub layout: PathLayout,
    pub transfer: Arc<dyn Transfer>,
    pub presence: Arc<dyn Presence>,
    pub retry: RetryPolicy,
    pub stats: Arc<PipelineStats>,
    pub progress: Option<Arc<ProgressReporter>>,
}

/// One consumer of the work channel
pub(crate) struct Worker {
    id: usize,
    ctx: Arc<WorkerContext>,
}

impl Worker {
    pub fn new(id: usize, ctx: Arc<WorkerContext>) -> Self {
        Self { id, ctx }
    }

    /// Process items until the channel is closed and drained.
    ///
    /// Cancellation is checked before every receive, so a cancelled worker
    /// leaves queued items in the channel.
    pub async fn run(self, rx: Receiver<Item>, cancel: CancellationToken) -> Result<()> {
        let mut handled = 0u64;

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GifSyncError::Cancelled),
                item = rx.recv() => match item {
                    Ok(item) => item,
                    Err(_) => break,
                },
            };

            self.process(item, &cancel).await?;
            handled += 1;
        }

        debug!(worker = self.id, handled, "Worker finished");
        Ok(())
    }

    async fn process(&self, item: Item, cancel: &CancellationToken) -> Result<()> {
        let ctx = &self.ctx;
        let path = ctx.layout.path_for(&item);
        let date = item
            .created_at()
            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        info!(worker = self.id, id = %item.id, date = %date, path = %path.display(), "Got gif");

        let job = TransferJob::new(item, path, ctx.direction);

        let present = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(GifSyncError::Cancelled),
            present = ctx.presence.is_present(&job) => present,
        };
        if present {
            debug!(worker = self.id, id = %job.item.id, "Already present, skipping");
            ctx.stats.skipped.fetch_add(1, Ordering::SeqCst);
            if let Some(progress) = &ctx.progress {
                progress.item_skipped();
            }
            return Ok(());
        }

        if let Some(progress) = &ctx.progress {
            progress.set_status(&format!("{} {}", job.direction, job.path.display()));
        }

        let bytes = self
            .transfer_with_retry(&job, cancel)
            .await
            .map_err(|e| GifSyncError::transfer(&job, e))?;

        ctx.stats.transferred.fetch_add(1, Ordering::SeqCst);
        ctx.stats.bytes.fetch_add(bytes, Ordering::SeqCst);
        if let Some(progress) = &ctx.progress {
            progress.item_transferred(bytes);
        }
        Ok(())
    }

    async fn transfer_with_retry(&self, job: &TransferJob, cancel: &CancellationToken) -> Result<u64> {
        let retry = self.ctx.retry;
        let mut attempt = 1;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(GifSyncError::Cancelled),
                result = self.ctx.transfer.transfer(job, cancel) => result,
            };

            match result {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.is_recoverable() && attempt < retry.max_attempts => {
                    let delay = retry.delay_for(attempt);
                    warn!(
                        worker = self.id,
                        id = %job.item.id,
                        attempt,
                        delay = %humantime::format_duration(delay),
                        error = %e,
                        "Transfer failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(GifSyncError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
