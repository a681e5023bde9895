//! Run statistics and lifecycle state

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

/// Lifecycle of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Succeeded,
            _ => Self::Failed,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Running => 1,
            Self::Succeeded => 2,
            Self::Failed => 3,
        }
    }

    /// True once the run has ended either way
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Atomic cell holding a [`PipelineState`]
#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn get(&self) -> PipelineState {
        PipelineState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move `from -> to`; false if the cell was not in `from`
    pub(crate) fn transition(&self, from: PipelineState, to: PipelineState) -> bool {
        self.0
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Counters updated concurrently by the producer and the workers
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Items handed to the worker pool
    pub discovered: AtomicU64,
    /// Listing records skipped as empty or tombstoned
    pub empty_entries: AtomicU64,
    /// Items skipped because they were already present
    pub skipped: AtomicU64,
    /// Items transferred
    pub transferred: AtomicU64,
    /// Bytes moved by transfers
    pub bytes: AtomicU64,
    /// Listing pages fetched
    pub pages: AtomicU64,
}

impl PipelineStats {
    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            discovered: self.discovered.load(Ordering::SeqCst),
            empty_entries: self.empty_entries.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            transferred: self.transferred.load(Ordering::SeqCst),
            bytes: self.bytes.load(Ordering::SeqCst),
            pages: self.pages.load(Ordering::SeqCst),
        }
    }
}

/// Plain copy of [`PipelineStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub discovered: u64,
    pub empty_entries: u64,
    pub skipped: u64,
    pub transferred: u64,
    pub bytes: u64,
    pub pages: u64,
}

impl StatsSnapshot {
    /// Items handed to the pool that no worker finished.
    ///
    /// Always zero after a successful run. After a failed or cancelled run,
    /// these items were still queued in the channel (or in a worker's hands)
    /// and were dropped.
    pub fn unfinished(&self) -> u64 {
        self.discovered
            .saturating_sub(self.skipped)
            .saturating_sub(self.transferred)
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub state: PipelineState,
    pub stats: StatsSnapshot,
    pub duration: Duration,
}

impl PipelineReport {
    /// Average throughput in bytes/second
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.stats.bytes as f64 / secs
        } else {
            0.0
        }
    }

    /// Print summary to console
    pub fn print_summary(&self) {
        println!("\n=== Sync Summary ===");
        println!("Items discovered: {}", self.stats.discovered);
        println!("Transferred:      {}", self.stats.transferred);
        println!("Already present:  {}", self.stats.skipped);
        println!("Empty records:    {}", self.stats.empty_entries);
        println!("Bytes moved:      {}", humansize::format_size(self.stats.bytes, humansize::BINARY));
        println!("Duration:         {:.2?}", self.duration);
        println!("Throughput:       {}/s", humansize::format_size(self.throughput() as u64, humansize::BINARY));
    }
}
