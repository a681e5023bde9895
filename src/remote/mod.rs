//! Remote collaborators
//!
//! The pipeline never talks to a remote service directly. It consumes three
//! capabilities: a paginated [`ItemLister`], a per-item [`Transfer`], and a
//! [`Presence`] check for idempotent skips. This module defines those
//! contracts, the data model they exchange, and two concrete sources: a
//! directory-backed remote and a local directory for uploads.

mod directory;
mod local;
mod traits;
mod types;

pub use directory::*;
pub use local::{derived_id, LocalDirectory};
pub use traits::*;
pub use types::*;
