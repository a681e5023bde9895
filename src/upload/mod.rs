//! Upload flow
//!
//! Uploading an item is a three-step exchange with the remote:
//!
//! 1. upload the local file and send it as a message to self,
//! 2. locate the sent message and its document, then save the document,
//! 3. revoke the buffer message.
//!
//! The sequence is not atomic. If the process dies between step 1 and
//! step 3, the buffer message stays visible and the document may or may not
//! be saved; a rerun uploads it again. Uploads are at-least-once.

use crate::error::{GifSyncError, IoResultExt, Result};
use crate::remote::{Item, RemoteEntry, Transfer, TransferJob};
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Media attached to a sent message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Media {
    /// A document, possibly empty
    Document(RemoteEntry),
    /// Anything else (photo, web page, ...)
    Other(String),
}

/// One entry of a batched update response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    NewMessage { message_id: i32, media: Option<Media> },
    Other(String),
}

/// Response of a send-to-self call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentUpdate {
    /// Compact confirmation carrying the new message directly
    Short { message_id: i32, media: Option<Media> },
    /// Batch of updates that includes the new message
    Batch(Vec<Update>),
    /// Response shape this client does not understand
    Other(String),
}

/// The buffer message created by a send-to-self and the document it holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub message_id: i32,
    pub item: Item,
}

/// Find the sent message and its document in a send-to-self response
pub fn locate_sent(update: SentUpdate) -> Result<SentMessage> {
    let (message_id, media) = match update {
        SentUpdate::Short { message_id, media } => (message_id, media),
        SentUpdate::Batch(updates) => {
            let mut found = None;
            for update in updates {
                if let Update::NewMessage { message_id, media } = update {
                    found = Some((message_id, media));
                }
            }
            found.ok_or_else(|| locate_error("unable to find sent message".to_string()))?
        }
        SentUpdate::Other(kind) => {
            return Err(locate_error(format!("unexpected update type {}", kind)))
        }
    };

    match media {
        Some(Media::Document(RemoteEntry::Item(item))) => Ok(SentMessage { message_id, item }),
        _ => Err(locate_error(format!("message {} does not carry a document", message_id))),
    }
}

fn locate_error(message: String) -> GifSyncError {
    GifSyncError::upload("locate", GifSyncError::UnexpectedResponse(message))
}

/// Remote calls making up the upload sequence
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload the file at `path` and send it as a message to self
    async fn send_to_self(&self, path: &Path, cancel: &CancellationToken) -> Result<SentUpdate>;

    /// Add a document to the saved collection
    async fn save(&self, item: &Item, cancel: &CancellationToken) -> Result<()>;

    /// Delete a message for everyone
    async fn revoke(&self, message_id: i32, cancel: &CancellationToken) -> Result<()>;
}

/// Adapts an [`Uploader`] into a [`Transfer`] for upload jobs
pub struct UploadTransfer<U> {
    uploader: U,
}

impl<U: Uploader> UploadTransfer<U> {
    pub fn new(uploader: U) -> Self {
        Self { uploader }
    }
}

#[async_trait]
impl<U: Uploader> Transfer for UploadTransfer<U> {
    async fn transfer(&self, job: &TransferJob, cancel: &CancellationToken) -> Result<u64> {
        let size = tokio::fs::metadata(&job.path).await.with_path(&job.path)?.len();

        let update = self
            .uploader
            .send_to_self(&job.path, cancel)
            .await
            .map_err(|e| GifSyncError::upload("send", e))?;
        let sent = locate_sent(update)?;

        let saved = self.uploader.save(&sent.item, cancel).await;

        // The buffer message goes away whether or not the save worked
        self.uploader
            .revoke(sent.message_id, cancel)
            .await
            .map_err(|e| GifSyncError::upload("revoke", e))?;
        saved.map_err(|e| GifSyncError::upload("save", e))?;

        info!(
            path = %job.path.display(),
            id = %sent.item.id,
            message_id = sent.message_id,
            "Uploaded gif"
        );

        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{Direction, ItemId, Location};
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn document(id: i64) -> Item {
        Item {
            id: ItemId(id),
            date: 0,
            size: 3,
            location: Location::Remote {
                key: format!("messages/{}.mp4", id),
            },
        }
    }

    #[test]
    fn test_locate_short_update() {
        let sent = locate_sent(SentUpdate::Short {
            message_id: 11,
            media: Some(Media::Document(RemoteEntry::Item(document(5)))),
        })
        .unwrap();
        assert_eq!(sent.message_id, 11);
        assert_eq!(sent.item.id, ItemId(5));
    }

    #[test]
    fn test_locate_batch_takes_new_message() {
        let sent = locate_sent(SentUpdate::Batch(vec![
            Update::Other("read history".to_string()),
            Update::NewMessage {
                message_id: 21,
                media: Some(Media::Document(RemoteEntry::Item(document(6)))),
            },
        ]))
        .unwrap();
        assert_eq!(sent.message_id, 21);
    }

    #[test]
    fn test_locate_failures() {
        let err = locate_sent(SentUpdate::Batch(vec![Update::Other("x".to_string())])).unwrap_err();
        assert!(err.to_string().contains("unable to find sent message"));

        let err = locate_sent(SentUpdate::Other("updatesTooLong".to_string())).unwrap_err();
        assert!(err.to_string().contains("unexpected update type"));
        assert!(!err.is_recoverable());

        let err = locate_sent(SentUpdate::Short {
            message_id: 1,
            media: Some(Media::Document(RemoteEntry::Empty { id: ItemId(1) })),
        })
        .unwrap_err();
        assert!(err.to_string().contains("does not carry a document"));

        assert!(locate_sent(SentUpdate::Short {
            message_id: 1,
            media: Some(Media::Other("photo".to_string())),
        })
        .is_err());
    }

    /// Records the call sequence; optionally fails save or revoke
    #[derive(Default)]
    struct ScriptedUploader {
        calls: Mutex<Vec<String>>,
        fail_save: bool,
        fail_revoke: bool,
    }

    #[async_trait]
    impl Uploader for ScriptedUploader {
        async fn send_to_self(&self, path: &Path, _cancel: &CancellationToken) -> Result<SentUpdate> {
            self.calls.lock().unwrap().push(format!("send {}", path.display()));
            Ok(SentUpdate::Short {
                message_id: 7,
                media: Some(Media::Document(RemoteEntry::Item(document(99)))),
            })
        }

        async fn save(&self, item: &Item, _cancel: &CancellationToken) -> Result<()> {
            self.calls.lock().unwrap().push(format!("save {}", item.id));
            if self.fail_save {
                return Err(GifSyncError::remote("save rejected"));
            }
            Ok(())
        }

        async fn revoke(&self, message_id: i32, _cancel: &CancellationToken) -> Result<()> {
            self.calls.lock().unwrap().push(format!("revoke {}", message_id));
            if self.fail_revoke {
                return Err(GifSyncError::remote("revoke rejected"));
            }
            Ok(())
        }
    }

    fn upload_job(dir: &TempDir) -> TransferJob {
        let path = dir.path().join("cat.mp4");
        std::fs::write(&path, b"gif").unwrap();
        let item = Item {
            id: ItemId(1),
            date: 0,
            size: 3,
            location: Location::Local {
                file_name: "cat.mp4".to_string(),
            },
        };
        TransferJob::new(item, path, Direction::Upload)
    }

    #[tokio::test]
    async fn test_upload_sequence_order() {
        let dir = TempDir::new().unwrap();
        let job = upload_job(&dir);
        let transfer = UploadTransfer::new(ScriptedUploader::default());

        let bytes = transfer.transfer(&job, &CancellationToken::new()).await.unwrap();
        assert_eq!(bytes, 3);

        let calls = transfer.uploader.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![format!("send {}", job.path.display()), "save 99".to_string(), "revoke 7".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_save_still_revokes() {
        let dir = TempDir::new().unwrap();
        let job = upload_job(&dir);
        let transfer = UploadTransfer::new(ScriptedUploader {
            fail_save: true,
            ..Default::default()
        });

        let err = transfer.transfer(&job, &CancellationToken::new()).await.unwrap_err();
        let GifSyncError::Upload { step: "save", source } = &err else {
            panic!("expected a save error, got {err}");
        };
        assert!(matches!(**source, GifSyncError::Remote(_)));
        assert!(transfer.uploader.calls.lock().unwrap().contains(&"revoke 7".to_string()));
    }

    #[tokio::test]
    async fn test_revoke_error_reported_before_save_error() {
        let dir = TempDir::new().unwrap();
        let job = upload_job(&dir);
        let transfer = UploadTransfer::new(ScriptedUploader {
            fail_save: true,
            fail_revoke: true,
            ..Default::default()
        });

        let err = transfer.transfer(&job, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, GifSyncError::Upload { step: "revoke", .. }));
    }

    #[tokio::test]
    async fn test_missing_local_file() {
        let job = TransferJob::new(
            document(1),
            PathBuf::from("/definitely/not/here.mp4"),
            Direction::Upload,
        );
        let transfer = UploadTransfer::new(ScriptedUploader::default());
        let err = transfer.transfer(&job, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, GifSyncError::Io { .. }));
        assert!(transfer.uploader.calls.lock().unwrap().is_empty());
    }
}
