//! Error types for GifSync
//!
//! Every failure in a pipeline run ends up as one [`GifSyncError`]. Listing
//! and transfer failures carry enough context (cursor, item id, local path,
//! direction) to diagnose a run without re-running it with verbose logging.

use crate::remote::{Cursor, Direction, ItemId, TransferJob};
use std::path::PathBuf;
use thiserror::Error;

/// Pipeline phase an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Paginated listing of remote items
    Listing,
    /// Per-item download or upload
    Transfer,
}

/// Main error type for GifSync operations
#[derive(Error, Debug)]
pub enum GifSyncError {
    /// A listing call failed; fatal to the whole run
    #[error("list items at cursor {cursor}: {source}")]
    Listing {
        cursor: Cursor,
        #[source]
        source: Box<GifSyncError>,
    },

    /// A worker's transfer failed; fatal to the whole run
    #[error("{direction} item {id} ('{path}'): {source}")]
    Transfer {
        id: ItemId,
        path: PathBuf,
        direction: Direction,
        #[source]
        source: Box<GifSyncError>,
    },

    /// One step of the send/save/revoke upload sequence failed
    #[error("upload {step}: {source}")]
    Upload {
        step: &'static str,
        #[source]
        source: Box<GifSyncError>,
    },

    /// The remote answered with something this client cannot use
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// The remote collaborator reported a failure
    #[error("remote error: {0}")]
    Remote(String),

    /// I/O error during file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A pipeline task died without returning a result
    #[error("internal error: {0}")]
    Internal(String),

    /// Cancelled externally or because a sibling task failed
    #[error("Operation cancelled")]
    Cancelled,
}

impl GifSyncError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Create a remote collaborator error
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote(message.into())
    }

    /// Attribute a collaborator error to the listing call at `cursor`.
    ///
    /// Cancellation passes through untouched so it stays distinguishable
    /// from a real fault.
    pub fn listing(cursor: Cursor, source: GifSyncError) -> Self {
        match source {
            Self::Cancelled => Self::Cancelled,
            source => Self::Listing {
                cursor,
                source: Box::new(source),
            },
        }
    }

    /// Attribute a collaborator error to the transfer of `job`.
    pub fn transfer(job: &TransferJob, source: GifSyncError) -> Self {
        match source {
            Self::Cancelled => Self::Cancelled,
            source => Self::Transfer {
                id: job.item.id,
                path: job.path.clone(),
                direction: job.direction,
                source: Box::new(source),
            },
        }
    }

    /// Attribute an error to one step of the upload sequence.
    pub fn upload(step: &'static str, source: GifSyncError) -> Self {
        match source {
            Self::Cancelled => Self::Cancelled,
            source => Self::Upload {
                step,
                source: Box::new(source),
            },
        }
    }

    /// True for the clean-abort signal rather than a real fault
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Check if this error is worth another attempt
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io { .. } | Self::Remote(_) => true,
            Self::Transfer { source, .. } | Self::Listing { source, .. } | Self::Upload { source, .. } => {
                source.is_recoverable()
            }
            _ => false,
        }
    }

    /// Phase of the pipeline this error came from, if known
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Listing { .. } => Some(Phase::Listing),
            Self::Transfer { .. } => Some(Phase::Transfer),
            _ => None,
        }
    }

    /// Item the error is about, if any
    pub fn item_id(&self) -> Option<ItemId> {
        match self {
            Self::Transfer { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Process exit code for the CLI
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Cancelled => 130,
            Self::ConfigError(_) => 2,
            _ => 1,
        }
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } | Self::Transfer { path, .. } => Some(path),
            _ => None,
        }
    }
}

/// Result type alias for GifSync operations
pub type Result<T> = std::result::Result<T, GifSyncError>;

impl From<std::io::Error> for GifSyncError {
    fn from(err: std::io::Error) -> Self {
        GifSyncError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for GifSyncError {
    fn from(err: serde_json::Error) -> Self {
        GifSyncError::ConfigError(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| GifSyncError::io(path, e))
    }
}
