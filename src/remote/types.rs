//! Data model shared by the pipeline and its collaborators

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stable numeric identity of a remote item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub i64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque pagination token for the listing collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cursor(u64);

impl Cursor {
    /// Cursor for the first page
    pub const START: Cursor = Cursor(0);

    /// Wrap a raw token
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Raw token value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the bytes of an item live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Location {
    /// Remote handle understood by the transfer collaborator
    Remote { key: String },
    /// A file in the local root, used by upload flows
    Local { file_name: String },
}

/// Immutable descriptor of one remote resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable identity
    pub id: ItemId,
    /// Creation time, epoch seconds
    pub date: i64,
    /// Size in bytes as reported by the source (0 if unknown)
    pub size: u64,
    /// Remote or local location handle
    pub location: Location,
}

impl Item {
    /// Creation time as a UTC timestamp, if representable
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.date, 0)
    }
}

/// A single listing record.
///
/// Remote listings can contain empty or tombstoned records that carry an id
/// but nothing to transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteEntry {
    /// Malformed or deleted record
    Empty { id: ItemId },
    /// A usable item
    Item(Item),
}

impl RemoteEntry {
    /// The item, if this record is not empty
    pub fn as_item(&self) -> Option<&Item> {
        match self {
            Self::Item(item) => Some(item),
            Self::Empty { .. } => None,
        }
    }

    /// Consume the record, keeping only non-empty items
    pub fn into_item(self) -> Option<Item> {
        match self {
            Self::Item(item) => Some(item),
            Self::Empty { .. } => None,
        }
    }

    /// Id of the record, empty or not
    pub fn id(&self) -> ItemId {
        match self {
            Self::Item(item) => item.id,
            Self::Empty { id } => *id,
        }
    }
}

/// One response of the listing collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListPage {
    /// Nothing changed since the cursor was issued
    NotModified,
    /// A page of records and the cursor of the next page, if any
    Page {
        entries: Vec<RemoteEntry>,
        next: Option<Cursor>,
    },
}

impl ListPage {
    /// A final page holding `entries`
    pub fn last(entries: Vec<RemoteEntry>) -> Self {
        Self::Page {
            entries,
            next: None,
        }
    }
}

/// Which way bytes move for a transfer job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Remote item to local path
    Download,
    /// Local path to remote
    Upload,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Download => write!(f, "download"),
            Self::Upload => write!(f, "upload"),
        }
    }
}

/// An item paired with the local path it is transferred to or from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferJob {
    pub item: Item,
    pub path: PathBuf,
    pub direction: Direction,
}

impl TransferJob {
    pub fn new(item: Item, path: PathBuf, direction: Direction) -> Self {
        Self {
            item,
            path,
            direction,
        }
    }
}

/// Deterministic mapping from items to local paths.
///
/// Remote items map to `<root>/<id>.<extension>`; local items keep their
/// file name under the root. The mapping is pure, so repeated runs agree on
/// where every item lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLayout {
    root: PathBuf,
    extension: String,
}

impl PathLayout {
    /// Default extension for saved GIFs (stored as mp4)
    pub const DEFAULT_EXTENSION: &'static str = "mp4";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_extension(root, Self::DEFAULT_EXTENSION)
    }

    pub fn with_extension(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Local path of `item`
    pub fn path_for(&self, item: &Item) -> PathBuf {
        match &item.location {
            Location::Remote { .. } => self.root.join(format!("{}.{}", item.id, self.extension)),
            Location::Local { file_name } => self.root.join(file_name),
        }
    }
}
