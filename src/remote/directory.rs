//! Directory-backed remote
//!
//! Stands in for a real remote service so the pipeline can run end to end
//! without a network. Layout of the root directory:
//!
//! ```text
//! <root>/<id>.mp4              saved items (zero-length file = tombstone)
//! <root>/messages/<msg>.mp4    messages sent to self
//! ```

use crate::error::{GifSyncError, IoResultExt, Result};
use crate::remote::local::{derived_id, modified_epoch};
use crate::remote::{
    Cursor, Direction, Item, ItemId, ItemLister, ListPage, Location, RemoteEntry, Transfer,
    TransferJob,
};
use crate::upload::{Media, SentUpdate, Uploader};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Subdirectory holding messages sent to self
pub const MESSAGES_DIR: &str = "messages";

/// Default number of records per listing page
pub const DEFAULT_PAGE_SIZE: usize = 100;

const EXTENSION: &str = "mp4";

/// A remote whose saved collection is a local directory
#[derive(Debug, Clone)]
pub struct DirectoryRemote {
    root: PathBuf,
    page_size: usize,
    next_message: Arc<AtomicI32>,
}

impl DirectoryRemote {
    /// Open (creating if needed) a remote rooted at `root`
    pub async fn open(root: impl Into<PathBuf>, page_size: usize) -> Result<Self> {
        if page_size == 0 {
            return Err(GifSyncError::config("page size must be at least 1"));
        }

        let root = root.into();
        let messages = root.join(MESSAGES_DIR);
        tokio::fs::create_dir_all(&messages).await.with_path(&messages)?;

        let last_message = numbered_files(&messages)
            .await?
            .into_iter()
            .map(|(id, _)| id)
            .max()
            .unwrap_or(0);
        let next_message = i32::try_from(last_message.saturating_add(1))
            .map_err(|_| GifSyncError::remote("message ids exhausted"))?;

        Ok(Self {
            root,
            page_size,
            next_message: Arc::new(AtomicI32::new(next_message)),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Path of the saved copy of `id`
    pub fn saved_path(&self, id: ItemId) -> PathBuf {
        self.root.join(format!("{}.{}", id, EXTENSION))
    }

    fn message_key(message_id: i32) -> String {
        format!("{}/{}.{}", MESSAGES_DIR, message_id, EXTENSION)
    }

    fn remote_key(item: &Item) -> Result<&str> {
        match &item.location {
            Location::Remote { key } => Ok(key),
            Location::Local { .. } => Err(GifSyncError::Internal(format!(
                "item {} has no remote location",
                item.id
            ))),
        }
    }
}

/// `<number>.mp4` files in `dir`, sorted by number
async fn numbered_files(dir: &Path) -> Result<Vec<(i64, String)>> {
    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await.with_path(dir)?;
    while let Some(entry) = entries.next_entry().await.with_path(dir)? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
            continue;
        }
        let (Some(stem), Some(name)) = (
            path.file_stem().and_then(|s| s.to_str()),
            path.file_name().and_then(|n| n.to_str()),
        ) else {
            continue;
        };
        if let Ok(id) = stem.parse::<i64>() {
            files.push((id, name.to_string()));
        }
    }
    files.sort_unstable();
    Ok(files)
}

/// `<path>.part`, where downloads and saves land before being renamed into place
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    path.with_file_name(name)
}

#[async_trait]
impl ItemLister for DirectoryRemote {
    async fn list_items(&self, cursor: Cursor, _cancel: &CancellationToken) -> Result<ListPage> {
        let saved = numbered_files(&self.root).await?;
        let offset = usize::try_from(cursor.value()).unwrap_or(usize::MAX);
        if offset >= saved.len() {
            return Ok(ListPage::last(Vec::new()));
        }

        let end = offset.saturating_add(self.page_size).min(saved.len());
        let mut entries = Vec::with_capacity(end - offset);
        for (id, name) in &saved[offset..end] {
            let path = self.root.join(name);
            let metadata = tokio::fs::metadata(&path).await.with_path(&path)?;
            if metadata.len() == 0 {
                entries.push(RemoteEntry::Empty { id: ItemId(*id) });
                continue;
            }
            entries.push(RemoteEntry::Item(Item {
                id: ItemId(*id),
                date: modified_epoch(&metadata),
                size: metadata.len(),
                location: Location::Remote { key: name.clone() },
            }));
        }

        let next = (end < saved.len()).then(|| Cursor::new(end as u64));
        Ok(ListPage::Page { entries, next })
    }
}

#[async_trait]
impl Transfer for DirectoryRemote {
    async fn transfer(&self, job: &TransferJob, _cancel: &CancellationToken) -> Result<u64> {
        if job.direction != Direction::Download {
            return Err(GifSyncError::config(
                "directory remote only downloads; wrap it in UploadTransfer for uploads",
            ));
        }

        let source = self.root.join(Self::remote_key(&job.item)?);
        if let Some(parent) = job.path.parent() {
            tokio::fs::create_dir_all(parent).await.with_path(parent)?;
        }

        // An interrupted download must never look like a finished one
        let partial = partial_path(&job.path);
        let bytes = tokio::fs::copy(&source, &partial).await.with_path(&source)?;
        tokio::fs::rename(&partial, &job.path).await.with_path(&job.path)?;

        Ok(bytes)
    }
}

#[async_trait]
impl Uploader for DirectoryRemote {
    async fn send_to_self(&self, path: &Path, _cancel: &CancellationToken) -> Result<SentUpdate> {
        let data = tokio::fs::read(path).await.with_path(path)?;
        let message_id = self.next_message.fetch_add(1, Ordering::SeqCst);
        let key = Self::message_key(message_id);
        let target = self.root.join(&key);
        tokio::fs::write(&target, &data).await.with_path(&target)?;

        debug!(message_id, path = %path.display(), "Sent gif to self");

        Ok(SentUpdate::Short {
            message_id,
            media: Some(Media::Document(RemoteEntry::Item(Item {
                id: derived_id(&data),
                date: chrono::Utc::now().timestamp(),
                size: data.len() as u64,
                location: Location::Remote { key },
            }))),
        })
    }

    async fn save(&self, item: &Item, _cancel: &CancellationToken) -> Result<()> {
        let source = self.root.join(Self::remote_key(item)?);
        let target = self.saved_path(item.id);

        // Staged beside the message: one partial file per send
        let partial = partial_path(&source);
        tokio::fs::copy(&source, &partial).await.with_path(&source)?;
        tokio::fs::rename(&partial, &target).await.with_path(&target)?;
        Ok(())
    }

    async fn revoke(&self, message_id: i32, _cancel: &CancellationToken) -> Result<()> {
        let path = self.root.join(Self::message_key(message_id));
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(GifSyncError::remote(format!("message {} not found", message_id)))
            }
            Err(e) => Err(GifSyncError::io(path, e)),
        }
    }
}
