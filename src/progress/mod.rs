//! Progress reporting module
//!
//! Terminal progress bars for pipeline runs, hidden unless requested.

mod reporter;

pub use reporter::*;
