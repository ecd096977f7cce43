//! Writing uploaded files onto an experiment.
//!
//! Each upload is first stored as a fresh blob and then offered to the
//! record store, which atomically either attaches it or reports the
//! attachment already holding that filename. In the second case the
//! content is written over the existing identity and the fresh blob is
//! unlinked. All writes run concurrently; if any fails, attachments that
//! were newly added are detached, their blobs unlinked, and the first
//! error is returned.

use futures::future::join_all;
use labcoord_core::attachments::{collapse_by_name, BlobTarget, FileDescriptor};
use labcoord_core::error::CoreError;
use labcoord_core::types::DbId;
use labcoord_db::{BlobStore, RecordStore};

use crate::error::{AppError, AppResult};

/// Fallback content type for uploads that declare none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// An uploaded file waiting to be stored.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Store `uploads` and record their descriptors on the experiment.
///
/// Returns the descriptors now attached, in upload order.
pub async fn attach_files(
    store: &dyn RecordStore,
    blobs: &dyn BlobStore,
    experiment_id: DbId,
    uploads: Vec<Upload>,
) -> AppResult<Vec<FileDescriptor>> {
    if uploads.is_empty() {
        return Ok(Vec::new());
    }

    let uploads = collapse_by_name(uploads, |u| u.filename.as_str());
    let writes = uploads
        .into_iter()
        .map(|upload| write_one(store, blobs, experiment_id, upload));
    let results = join_all(writes).await;

    let mut written = Vec::with_capacity(results.len());
    let mut first_error = None;
    for result in results {
        match result {
            Ok(entry) => written.push(entry),
            Err(e) if first_error.is_none() => first_error = Some(e),
            Err(_) => {}
        }
    }

    if let Some(e) = first_error {
        for (target, descriptor) in &written {
            if *target == BlobTarget::Fresh {
                if let Err(detach_err) = store.detach_experiment_file(experiment_id, descriptor.id).await {
                    tracing::error!(
                        experiment_id,
                        file_id = descriptor.id,
                        error = %detach_err,
                        "Failed to detach file after attachment failure"
                    );
                }
                unlink_logged(blobs, experiment_id, descriptor.id).await;
            }
        }
        return Err(e);
    }

    tracing::debug!(experiment_id, count = written.len(), "Files attached");
    Ok(written.into_iter().map(|(_, d)| d).collect())
}

async fn write_one(
    store: &dyn RecordStore,
    blobs: &dyn BlobStore,
    experiment_id: DbId,
    upload: Upload,
) -> AppResult<(BlobTarget, FileDescriptor)> {
    let offered = blobs
        .create(&upload.filename, &upload.content_type, &upload.data)
        .await?;

    let claimed = match store.claim_experiment_file(experiment_id, &offered).await {
        Ok(Some(claimed)) => claimed,
        Ok(None) => {
            unlink_logged(blobs, experiment_id, offered.id).await;
            return Err(AppError::Core(CoreError::NotFound {
                entity: "Experiment",
                id: experiment_id,
            }));
        }
        Err(e) => {
            unlink_logged(blobs, experiment_id, offered.id).await;
            return Err(e.into());
        }
    };

    match BlobTarget::resolve(&offered, &claimed) {
        BlobTarget::Fresh => Ok((BlobTarget::Fresh, claimed)),
        BlobTarget::Replace(id) => {
            let written = blobs
                .overwrite(id, &upload.filename, &upload.content_type, &upload.data)
                .await;
            unlink_logged(blobs, experiment_id, offered.id).await;
            Ok((BlobTarget::Replace(id), written?))
        }
    }
}

/// Unlink a blob during cleanup, logging instead of failing.
pub(crate) async fn unlink_logged(blobs: &dyn BlobStore, experiment_id: DbId, file_id: DbId) {
    if let Err(e) = blobs.unlink(file_id).await {
        tracing::error!(experiment_id, file_id, error = %e, "Failed to unlink blob");
    }
}
