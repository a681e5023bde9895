//! Local directory as an item source for uploads

use crate::error::{IoResultExt, Result};
use crate::remote::{Cursor, Item, ItemId, ItemLister, ListPage, Location, PathLayout, RemoteEntry};
use async_trait::async_trait;
use filetime::FileTime;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::info;
use xxhash_rust::xxh3::xxh3_64;

/// Content-addressed id of a document.
///
/// The remote assigns this same id to whatever it receives, so a local file
/// and its uploaded copy always agree regardless of the file's name.
pub fn derived_id(bytes: &[u8]) -> ItemId {
    ItemId((xxh3_64(bytes) & i64::MAX as u64) as i64)
}

/// Modification time in epoch seconds
pub(crate) fn modified_epoch(metadata: &std::fs::Metadata) -> i64 {
    FileTime::from_last_modification_time(metadata).unix_seconds()
}

/// Every `*.<extension>` file in one directory, listed as a single page
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    dir: PathBuf,
    extension: String,
}

impl LocalDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: PathLayout::DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Layout mapping listed items back to their files
    pub fn layout(&self) -> PathLayout {
        PathLayout::with_extension(&self.dir, &self.extension)
    }
}

#[async_trait]
impl ItemLister for LocalDirectory {
    async fn list_items(&self, cursor: Cursor, _cancel: &CancellationToken) -> Result<ListPage> {
        if cursor != Cursor::START {
            return Ok(ListPage::last(Vec::new()));
        }

        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await.with_path(&self.dir)?;
        while let Some(entry) = dir.next_entry().await.with_path(&self.dir)? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(self.extension.as_str()) {
                continue;
            }
            let metadata = entry.metadata().await.with_path(&path)?;
            if !metadata.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let data = tokio::fs::read(&path).await.with_path(&path)?;
            entries.push((file_name.to_string(), Item {
                id: derived_id(&data),
                date: modified_epoch(&metadata),
                size: metadata.len(),
                location: Location::Local {
                    file_name: file_name.to_string(),
                },
            }));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        info!(
            path = %self.dir.display(),
            count = entries.len(),
            "Uploading all gifs from directory"
        );

        Ok(ListPage::last(
            entries.into_iter().map(|(_, item)| RemoteEntry::Item(item)).collect(),
        ))
    }
}
