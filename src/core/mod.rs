//! Core pipeline module
//!
//! Provides the producer, the worker pool and the coordinator that ties them
//! together around a bounded channel.

mod pipeline;
mod source;
mod stats;
mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use pipeline::*;
pub use source::*;
pub use stats::{PipelineReport, PipelineState, PipelineStats, StatsSnapshot};
pub use worker::RetryPolicy;
