//! Download and upload runs against a directory-backed remote
//!
//! Both builders route every remote call through one shared [`RpcLimiter`].
//! Re-running either with the same inputs transfers nothing new.

use crate::config::PipelineConfig;
use crate::core::{Collaborators, ItemSource, Pipeline};
use crate::error::Result;
use crate::remote::{Direction, DirectoryRemote, KnownRemote, LocalDirectory, LocalFiles, PathLayout};
use crate::throttle::{RateLimited, RpcLimiter};
use crate::upload::UploadTransfer;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Pipeline mirroring every saved item of `remote` into `layout`.
///
/// Files already on disk are skipped.
pub fn download_pipeline(
    config: &PipelineConfig,
    remote: DirectoryRemote,
    limiter: RpcLimiter,
    layout: PathLayout,
) -> Pipeline {
    let remote = Arc::new(RateLimited::new(remote, limiter));
    let options = config.pipeline_options(Direction::Download, layout);
    Pipeline::new(options, Collaborators::new(remote.clone(), remote, Arc::new(LocalFiles)))
}

/// Pipeline uploading every file of `input` that `remote` does not hold yet.
///
/// Lists the remote once up front; local files are matched against that
/// snapshot by content id.
pub async fn upload_pipeline(
    config: &PipelineConfig,
    remote: DirectoryRemote,
    limiter: RpcLimiter,
    input: &Path,
    cancel: &CancellationToken,
) -> Result<Pipeline> {
    let remote = RateLimited::new(remote, limiter);

    let known = ItemSource::new(Arc::new(remote.clone()))
        .collect(cancel)
        .await?
        .into_iter()
        .map(|item| item.id);
    let known = KnownRemote::new(known);
    info!(count = known.len(), "Remote items already saved");

    let local = LocalDirectory::new(input);
    let options = config.pipeline_options(Direction::Upload, local.layout());
    Ok(Pipeline::new(
        options,
        Collaborators::new(
            Arc::new(local),
            Arc::new(UploadTransfer::new(remote)),
            Arc::new(known),
        ),
    ))
}
