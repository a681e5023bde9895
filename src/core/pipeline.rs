//! Pipeline coordinator
//!
//! Wires one [`ItemSource`] and `N` workers around a bounded channel, runs
//! them as a task group under a child cancellation token and reports the
//! first failure, if any.

use crate::core::source::ItemSource;
use crate::core::stats::StateCell;
use crate::core::worker::{RetryPolicy, Worker, WorkerContext};
use crate::core::{PipelineReport, PipelineState, PipelineStats};
use crate::error::{GifSyncError, Result};
use crate::progress::ProgressReporter;
use crate::remote::{Direction, ItemLister, PathLayout, Presence, Transfer};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tuning and wiring of one pipeline
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Number of concurrent workers
    pub workers: usize,
    /// Channel capacity per worker
    pub channel_factor: usize,
    pub direction: Direction,
    pub layout: PathLayout,
    pub retry: RetryPolicy,
}

impl PipelineOptions {
    pub const DEFAULT_WORKERS: usize = 3;

    pub fn new(direction: Direction, layout: PathLayout) -> Self {
        Self {
            workers: Self::DEFAULT_WORKERS,
            channel_factor: 1,
            direction,
            layout,
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_channel_factor(mut self, factor: usize) -> Self {
        self.channel_factor = factor;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(GifSyncError::config("worker count must be at least 1"));
        }
        if self.channel_factor == 0 {
            return Err(GifSyncError::config("channel factor must be at least 1"));
        }
        Ok(())
    }
}

/// The three capabilities a pipeline consumes
#[derive(Clone)]
pub struct Collaborators {
    pub lister: Arc<dyn ItemLister>,
    pub transfer: Arc<dyn Transfer>,
    pub presence: Arc<dyn Presence>,
}

impl Collaborators {
    pub fn new(lister: Arc<dyn ItemLister>, transfer: Arc<dyn Transfer>, presence: Arc<dyn Presence>) -> Self {
        Self {
            lister,
            transfer,
            presence,
        }
    }
}

/// Set-once slot for the error that ends a run.
///
/// Recording the first error cancels the run token; later errors are
/// dropped.
struct FirstError {
    slot: Mutex<Option<GifSyncError>>,
    cancel: CancellationToken,
}

impl FirstError {
    fn new(cancel: CancellationToken) -> Self {
        Self {
            slot: Mutex::new(None),
            cancel,
        }
    }

    fn record(&self, err: GifSyncError) {
        let mut slot = self.slot.lock().unwrap_or_else(|p| p.into_inner());
        if slot.is_some() {
            debug!(error = %err, "Ignoring error after first failure");
            return;
        }
        if !err.is_cancelled() {
            error!(error = %err, "Pipeline task failed, cancelling run");
        }
        *slot = Some(err);
        drop(slot);
        self.cancel.cancel();
    }

    fn take(&self) -> Option<GifSyncError> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner()).take()
    }
}

/// A bounded, cancellable fan-out/fan-in run.
///
/// A pipeline runs once: `Idle -> Running -> Succeeded | Failed`.
pub struct Pipeline {
    options: PipelineOptions,
    collaborators: Collaborators,
    stats: Arc<PipelineStats>,
    state: StateCell,
    progress: Option<Arc<ProgressReporter>>,
}

impl Pipeline {
    pub fn new(options: PipelineOptions, collaborators: Collaborators) -> Self {
        Self {
            options,
            collaborators,
            stats: Arc::new(PipelineStats::default()),
            state: StateCell::default(),
            progress: None,
        }
    }

    /// Report progress through `reporter`
    pub fn with_progress(mut self, reporter: Arc<ProgressReporter>) -> Self {
        self.progress = Some(reporter);
        self
    }

    /// Items the channel holds before the producer blocks
    pub fn channel_capacity(&self) -> usize {
        self.options.workers.saturating_mul(self.options.channel_factor).max(1)
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Run the pipeline to completion.
    ///
    /// Returns the first error raised by the producer or any worker. An
    /// already-cancelled `cancel` (or one cancelled mid-run) yields
    /// [`GifSyncError::Cancelled`] unless a real failure came first.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<PipelineReport> {
        self.options.validate()?;
        if !self.state.transition(PipelineState::Idle, PipelineState::Running) {
            return Err(GifSyncError::Internal(format!(
                "pipeline cannot be started from state {:?}",
                self.state.get()
            )));
        }

        let start = Instant::now();
        let token = cancel.child_token();
        let first_error = Arc::new(FirstError::new(token.clone()));
        let (tx, rx) = async_channel::bounded(self.channel_capacity());

        info!(
            direction = %self.options.direction,
            workers = self.options.workers,
            capacity = self.channel_capacity(),
            root = %self.options.layout.root().display(),
            "Starting pipeline"
        );

        let mut tasks = JoinSet::new();

        let source = ItemSource::new(self.collaborators.lister.clone());
        Self::spawn(
            &mut tasks,
            &first_error,
            source.run(tx, token.clone(), self.stats.clone(), self.progress.clone()),
        );

        let ctx = Arc::new(WorkerContext {
            direction: self.options.direction,
            layout: self.options.layout.clone(),
            transfer: self.collaborators.transfer.clone(),
            presence: self.collaborators.presence.clone(),
            retry: self.options.retry,
            stats: self.stats.clone(),
            progress: self.progress.clone(),
        });
        for id in 0..self.options.workers {
            let worker = Worker::new(id, ctx.clone());
            Self::spawn(&mut tasks, &first_error, worker.run(rx.clone(), token.clone()));
        }
        drop(rx);

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                first_error.record(GifSyncError::Internal(format!("pipeline task died: {}", e)));
            }
        }

        let snapshot = self.stats.snapshot();
        let duration = start.elapsed();

        if let Some(err) = first_error.take() {
            self.state.transition(PipelineState::Running, PipelineState::Failed);
            let dropped = snapshot.unfinished();
            if dropped > 0 {
                warn!(dropped, "Items left unprocessed");
            }
            if let Some(progress) = &self.progress {
                progress.finish_error(&err.to_string());
            }
            return Err(err);
        }

        self.state.transition(PipelineState::Running, PipelineState::Succeeded);
        info!(
            discovered = snapshot.discovered,
            transferred = snapshot.transferred,
            skipped = snapshot.skipped,
            duration = %humantime::format_duration(duration),
            "Pipeline finished"
        );
        if let Some(progress) = &self.progress {
            progress.finish_success(&format!("{} items", snapshot.discovered));
        }

        Ok(PipelineReport {
            state: PipelineState::Succeeded,
            stats: snapshot,
            duration,
        })
    }

    /// Spawn a member task whose error lands in `first_error`
    fn spawn<F, T>(tasks: &mut JoinSet<()>, first_error: &Arc<FirstError>, task: F)
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let first_error = first_error.clone();
        tasks.spawn(async move {
            if let Err(e) = task.await {
                first_error.record(e);
            }
        });
    }
}
