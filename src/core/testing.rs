//! In-memory collaborators for pipeline tests

use crate::error::{GifSyncError, Result};
use crate::remote::{Cursor, Item, ItemId, ItemLister, ListPage, Location, RemoteEntry, Transfer, TransferJob};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Remote item with a three byte payload
pub fn item(id: i64) -> Item {
    Item {
        id: ItemId(id),
        date: 1_600_000_000 + id,
        size: 3,
        location: Location::Remote {
            key: format!("{}.mp4", id),
        },
    }
}

/// Lister replaying a fixed sequence of responses.
///
/// Once the script runs out it answers with an empty final page.
pub struct ScriptedLister {
    script: Mutex<VecDeque<Result<ListPage>>>,
    cursors: Arc<Mutex<Vec<Cursor>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedLister {
    pub fn new(script: Vec<Result<ListPage>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            cursors: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Split `items` into pages of `page_size`, chained by offset cursors
    pub fn paged(items: Vec<Item>, page_size: usize) -> Self {
        let chunks: Vec<Vec<Item>> = items.chunks(page_size.max(1)).map(|c| c.to_vec()).collect();
        let count = chunks.len();
        let mut offset = 0u64;
        let script = chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                offset += chunk.len() as u64;
                let next = (i + 1 < count).then(|| Cursor::new(offset));
                Ok(ListPage::Page {
                    entries: chunk.into_iter().map(RemoteEntry::Item).collect(),
                    next,
                })
            })
            .collect();
        Self::new(script)
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn cursors(&self) -> Arc<Mutex<Vec<Cursor>>> {
        self.cursors.clone()
    }
}

#[async_trait]
impl ItemLister for ScriptedLister {
    async fn list_items(&self, cursor: Cursor, _cancel: &CancellationToken) -> Result<ListPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.cursors.lock().unwrap().push(cursor);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(ListPage::last(Vec::new())))
    }
}

/// Transfer fake recording what it was asked to do
#[derive(Default)]
pub struct RecordingTransfer {
    /// Ids in completion order, one entry per successful transfer
    pub done: Mutex<Vec<ItemId>>,
    /// Attempts per id, successful or not
    pub attempts: Mutex<HashMap<ItemId, usize>>,
    in_flight: AtomicUsize,
    /// Highest number of concurrent transfers observed
    pub max_in_flight: AtomicUsize,
    delay: Duration,
    delays: HashMap<ItemId, Duration>,
    failures: HashMap<ItemId, String>,
    flaky: HashMap<ItemId, usize>,
    gate: Option<Arc<Semaphore>>,
    write_files: bool,
}

impl RecordingTransfer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long in every transfer
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail `id` with `message` after `delay`
    pub fn failing(mut self, id: i64, delay: Duration, message: &str) -> Self {
        self.delays.insert(ItemId(id), delay);
        self.failures.insert(ItemId(id), message.to_string());
        self
    }

    /// Fail the first `times` attempts on `id`, then succeed
    pub fn flaky(mut self, id: i64, times: usize) -> Self {
        self.flaky.insert(ItemId(id), times);
        self
    }

    /// Block every transfer until the semaphore hands out a permit
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Write the item id to the job path on success
    pub fn writing_files(mut self) -> Self {
        self.write_files = true;
        self
    }

    pub fn done_ids(&self) -> Vec<ItemId> {
        self.done.lock().unwrap().clone()
    }

    pub fn attempts_for(&self, id: i64) -> usize {
        self.attempts.lock().unwrap().get(&ItemId(id)).copied().unwrap_or(0)
    }

    async fn attempt(&self, job: &TransferJob, cancel: &CancellationToken) -> Result<u64> {
        let id = job.item.id;
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(id).or_insert(0);
            *count += 1;
            *count
        };

        if let Some(gate) = &self.gate {
            tokio::select! {
                _ = cancel.cancelled() => return Err(GifSyncError::Cancelled),
                permit = gate.acquire() => drop(permit),
            }
        }

        let delay = self.delays.get(&id).copied().unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failures.get(&id) {
            return Err(GifSyncError::remote(message.clone()));
        }
        if self.flaky.get(&id).is_some_and(|times| attempt <= *times) {
            return Err(GifSyncError::remote(format!("attempt {} failed", attempt)));
        }

        if self.write_files {
            if let Some(parent) = job.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&job.path, id.to_string()).await?;
        }

        self.done.lock().unwrap().push(id);
        Ok(job.item.size)
    }
}

#[async_trait]
impl Transfer for RecordingTransfer {
    async fn transfer(&self, job: &TransferJob, cancel: &CancellationToken) -> Result<u64> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let result = self.attempt(job, cancel).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
