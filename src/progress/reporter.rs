//! Progress reporter implementation
//!
//! Uses indicatif for terminal progress bars:
//! - Items discovered vs. handled (skipped or transferred)
//! - Bytes transferred with throughput
//! - A status line for the current item

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, Ordering};

/// Progress reporter for pipeline runs
pub struct ProgressReporter {
    /// Multi-progress container
    multi: MultiProgress,
    /// Handled items out of discovered items
    items_bar: ProgressBar,
    /// Bytes moved
    bytes_bar: ProgressBar,
    /// Current status message
    status: ProgressBar,
    skipped: AtomicU64,
}

impl ProgressReporter {
    /// Create a new progress reporter
    pub fn new() -> Self {
        let multi = MultiProgress::new();

        let status = multi.add(ProgressBar::new_spinner());
        status.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        let items_bar = multi.add(ProgressBar::new(0));
        items_bar.set_style(
            ProgressStyle::default_bar()
                .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} items ({msg})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        items_bar.set_prefix("Items");

        let bytes_bar = multi.add(ProgressBar::new_spinner());
        bytes_bar.set_style(
            ProgressStyle::default_spinner()
                .template("{prefix:.bold.dim} {bytes} ({bytes_per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bytes_bar.set_prefix("Data ");

        Self {
            multi,
            items_bar,
            bytes_bar,
            status,
            skipped: AtomicU64::new(0),
        }
    }

    /// An item was handed to the worker pool
    pub fn item_discovered(&self) {
        self.items_bar.inc_length(1);
    }

    /// An item was already present and skipped
    pub fn item_skipped(&self) {
        let skipped = self.skipped.fetch_add(1, Ordering::Relaxed) + 1;
        self.items_bar.inc(1);
        self.items_bar.set_message(format!("{} skipped", skipped));
    }

    /// An item was transferred
    pub fn item_transferred(&self, bytes: u64) {
        self.items_bar.inc(1);
        self.bytes_bar.inc(bytes);
    }

    /// Set current status message
    pub fn set_status(&self, msg: &str) {
        self.status.set_message(msg.to_string());
    }

    /// Finish progress with success message
    pub fn finish_success(&self, message: &str) {
        self.status.finish_with_message(format!("✓ {}", message));
        self.items_bar.finish();
        self.bytes_bar.finish();
    }

    /// Finish progress with error message
    pub fn finish_error(&self, message: &str) {
        self.status.finish_with_message(format!("✗ {}", message));
        self.items_bar.abandon();
        self.bytes_bar.abandon();
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
