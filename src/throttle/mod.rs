//! Rate limiting for remote calls
//!
//! A single token bucket is shared by the item source and every worker.

mod limiter;
mod middleware;

pub use limiter::*;
pub use middleware::*;
