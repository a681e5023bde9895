//! # GifSync - Rate-Limited Sync for Saved GIFs
//!
//! GifSync mirrors a remote collection of saved GIFs into a local directory,
//! or uploads a local directory into that collection. Both directions run
//! the same bounded fan-out/fan-in pipeline:
//!
//! - **Rate limiting**: every remote call draws from one shared token bucket
//! - **Bounded concurrency**: a fixed pool of workers behind a bounded channel
//! - **Backpressure**: listing pauses while the workers are busy
//! - **First error wins**: any failure cancels every other task
//! - **Idempotent**: items already present are skipped, so re-runs are cheap
//!
//! ## Quick Start
//!
//! ```no_run
//! use gifsync::core::{Collaborators, Pipeline, PipelineOptions};
//! use gifsync::remote::{Direction, DirectoryRemote, LocalFiles, PathLayout};
//! use gifsync::throttle::{RateLimited, RpcLimiter};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> gifsync::Result<()> {
//! let limiter = RpcLimiter::new(Duration::from_millis(100), 3)?;
//! let remote = RateLimited::new(DirectoryRemote::open("/srv/gifs", 100).await?, limiter);
//! let remote = Arc::new(remote);
//!
//! let options = PipelineOptions::new(Direction::Download, PathLayout::new("/home/me/gifs"));
//! let pipeline = Pipeline::new(options, Collaborators::new(remote.clone(), remote, Arc::new(LocalFiles)));
//!
//! let report = pipeline.run(&CancellationToken::new()).await?;
//! report.print_summary();
//! # Ok(())
//! # }
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod core;
pub mod error;
pub mod progress;
pub mod remote;
pub mod sync;
pub mod throttle;
pub mod upload;

// Re-export commonly used types
pub use config::{CliArgs, PipelineConfig};
pub use core::{Pipeline, PipelineOptions, PipelineReport};
pub use error::{GifSyncError, Result};
pub use progress::ProgressReporter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use gifsync::prelude::*;
    //! ```

    pub use crate::config::PipelineConfig;
    pub use crate::core::{Collaborators, ItemSource, Pipeline, PipelineOptions, PipelineReport, RetryPolicy};
    pub use crate::error::{GifSyncError, Result};
    pub use crate::progress::ProgressReporter;
    pub use crate::remote::{
        Direction, DirectoryRemote, Item, ItemId, ItemLister, KnownRemote, LocalDirectory, LocalFiles, PathLayout,
        Presence, Transfer,
    };
    pub use crate::throttle::{RateLimited, RpcLimiter};
    pub use crate::sync::{download_pipeline, upload_pipeline};
    pub use crate::upload::{UploadTransfer, Uploader};
}
