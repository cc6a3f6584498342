use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::document::collect_image_file_paths;
use crate::error::StorageError;
use crate::kind::{ContentKind, FolderPrefix};
use crate::lock::{RecordGuard, RecordLocks};
use crate::store::{ListOptions, ObjectEntry, ObjectStore};

/// Entries requested per list call.
pub const PAGE_SIZE: usize = 1000;

/// Maximum number of paths per bulk-delete request.
pub const DELETE_BATCH_SIZE: usize = 1000;

/// Result of reconciling a record folder against its document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub deleted: usize,
}

/// An image stored under a record folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    /// Value to store in the image node's `filePath`.
    pub file_path: String,
    pub public_url: Option<String>,
}

/// Keeps record image folders in line with the documents that reference them.
///
/// Storage layout:
/// ```text
/// {bucket}/
///   newsletters/{record_id}/{uuid}-{name}
///   blogs/{record_id}/{uuid}-{name}
///   case-studies/{record_id}/{uuid}-{name}
/// ```
///
/// By default every call runs its own list/diff/delete sequence with no
/// coordination between calls. Two concurrent edits of the same record can
/// race: one may list and delete an object the other has just uploaded.
/// [`Reconciler::with_record_serialization`] and
/// [`Reconciler::with_orphan_grace_period`] narrow that window.
pub struct Reconciler {
    store: Arc<dyn ObjectStore>,
    locks: Option<RecordLocks>,
    grace_period: Option<Duration>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("backend", &self.store.backend_name())
            .field("locks", &self.locks)
            .field("grace_period", &self.grace_period)
            .finish()
    }
}

impl Reconciler {
    /// Create a reconciler over an object store.
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            locks: None,
            grace_period: None,
        }
    }

    /// Serialize syncs, purges and uploads of the same record within this
    /// process.
    pub fn with_record_serialization(mut self) -> Self {
        self.locks = Some(RecordLocks::new());
        self
    }

    /// Never delete orphans modified more recently than `grace_period`.
    /// Objects without a modification time are not protected.
    pub fn with_orphan_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = Some(grace_period);
        self
    }

    async fn lock(&self, prefix: &FolderPrefix) -> Option<RecordGuard<'_>> {
        match &self.locks {
            Some(locks) => Some(locks.acquire(prefix).await),
            None => None,
        }
    }

    /// List every object under `prefix`, page by page, as `(path, entry)`.
    ///
    /// Folder entries count towards the page length, then are dropped.
    async fn list_entries(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, ObjectEntry)>, StorageError> {
        let mut entries = Vec::new();
        let mut offset = 0;

        loop {
            let page = self
                .store
                .list(
                    prefix,
                    ListOptions {
                        limit: PAGE_SIZE,
                        offset,
                    },
                )
                .await
                .map_err(|e| match e {
                    StorageError::List(msg) => StorageError::List(msg),
                    other => StorageError::List(other.to_string()),
                })?;

            let page_len = page.len();
            entries.extend(
                page.into_iter()
                    .filter(|entry| !entry.is_folder)
                    .map(|entry| (format!("{}/{}", prefix, entry.name), entry)),
            );

            if page_len < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }

        Ok(entries)
    }

    /// Full paths of every object under `prefix`.
    ///
    /// Fails as a whole if any page request fails.
    #[instrument(skip(self), level = "debug")]
    pub async fn list_folder(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let paths: Vec<String> = self
            .list_entries(prefix)
            .await?
            .into_iter()
            .map(|(path, _)| path)
            .collect();

        debug!("Listed {} objects under {}", paths.len(), prefix);
        Ok(paths)
    }

    /// Delete `paths` in sequential batches of at most [`DELETE_BATCH_SIZE`].
    ///
    /// Stops at the first failed batch. Earlier batches stay deleted.
    async fn delete_in_batches(&self, paths: &[String]) -> Result<usize, StorageError> {
        let mut deleted = 0;

        for (index, batch) in paths.chunks(DELETE_BATCH_SIZE).enumerate() {
            self.store
                .remove(batch)
                .await
                .map_err(|e| StorageError::Delete {
                    batch: index + 1,
                    deleted,
                    message: e.to_string(),
                })?;

            deleted += batch.len();
            debug!("Deleted batch {} ({} objects)", index + 1, batch.len());
        }

        Ok(deleted)
    }

    fn is_within_grace_period(&self, entry: &ObjectEntry) -> bool {
        let (Some(grace_period), Some(updated_at)) = (self.grace_period, entry.updated_at) else {
            return false;
        };
        let Ok(grace_period) = chrono::Duration::from_std(grace_period) else {
            return true;
        };

        chrono::Utc::now() - updated_at < grace_period
    }

    /// Delete the objects of a record folder that `document` no longer
    /// references.
    ///
    /// Only image `filePath` attributes count as references. Referenced paths
    /// are never deleted.
    #[instrument(skip(self, document), level = "debug")]
    pub async fn sync_storage_with_content(
        &self,
        kind: ContentKind,
        record_id: &str,
        document: &Value,
    ) -> Result<SyncReport, StorageError> {
        let prefix = FolderPrefix::new(kind, record_id)?;
        let _guard = self.lock(&prefix).await;

        let referenced = collect_image_file_paths(document);
        let existing = self.list_entries(prefix.as_str()).await?;

        let mut seen = HashSet::new();
        let mut spared = 0;
        let orphans: Vec<String> = existing
            .into_iter()
            .filter(|(path, _)| !referenced.contains(path))
            .filter(|(_, entry)| {
                let fresh = self.is_within_grace_period(entry);
                if fresh {
                    spared += 1;
                }
                !fresh
            })
            .filter_map(|(path, _)| seen.insert(path.clone()).then_some(path))
            .collect();

        if spared > 0 {
            debug!("Kept {} recent unreferenced objects under {}", spared, prefix);
        }

        if orphans.is_empty() {
            debug!(
                "No orphaned objects under {} ({} referenced)",
                prefix,
                referenced.len()
            );
            return Ok(SyncReport::default());
        }

        let deleted = self.delete_in_batches(&orphans).await?;
        info!("Removed {} orphaned objects under {}", deleted, prefix);

        Ok(SyncReport { deleted })
    }

    /// Delete every object in a record folder, referenced or not.
    ///
    /// Only for records that are being permanently deleted.
    #[instrument(skip(self), level = "debug")]
    pub async fn delete_all_content_images(
        &self,
        kind: ContentKind,
        record_id: &str,
    ) -> Result<usize, StorageError> {
        let prefix = FolderPrefix::new(kind, record_id)?;
        let _guard = self.lock(&prefix).await;

        let paths = self.list_folder(prefix.as_str()).await?;
        if paths.is_empty() {
            debug!("Nothing to purge under {}", prefix);
            return Ok(0);
        }

        let deleted = self.delete_in_batches(&paths).await?;
        info!("Purged {} objects under {}", deleted, prefix);
        Ok(deleted)
    }

    /// Sync after a record write has been committed. Failures are logged
    /// and swallowed.
    pub async fn sync_after_write(
        &self,
        kind: ContentKind,
        record_id: &str,
        document: &Value,
    ) -> Option<SyncReport> {
        match self
            .sync_storage_with_content(kind, record_id, document)
            .await
        {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(
                    "Image storage sync failed for {} {}: {}",
                    kind, record_id, e
                );
                None
            }
        }
    }

    /// Purge after a record delete has been committed. Failures are logged
    /// and swallowed.
    pub async fn purge_after_delete(&self, kind: ContentKind, record_id: &str) -> Option<usize> {
        match self.delete_all_content_images(kind, record_id).await {
            Ok(deleted) => Some(deleted),
            Err(e) => {
                warn!(
                    "Image storage purge failed for {} {}: {}",
                    kind, record_id, e
                );
                None
            }
        }
    }

    /// Upload an image into a record folder under a unique name.
    #[instrument(skip(self, data), level = "debug", fields(data_len = data.len()))]
    pub async fn upload_content_image(
        &self,
        kind: ContentKind,
        record_id: &str,
        file_name: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<UploadedImage, StorageError> {
        let prefix = FolderPrefix::new(kind, record_id)?;
        let _guard = self.lock(&prefix).await;

        let object_name = format!(
            "{}-{}",
            uuid::Uuid::new_v4().simple(),
            sanitize_file_name(file_name)
        );
        let file_path = self
            .store
            .upload(&prefix.join(&object_name), data, content_type)
            .await?;
        let public_url = self.store.public_url(&file_path);

        debug!("Uploaded {} ({} bytes)", file_path, data.len());
        Ok(UploadedImage {
            file_path,
            public_url,
        })
    }
}

const MAX_FILE_NAME_LEN: usize = 100;

/// Reduce an uploaded file name to a safe object name component.
pub fn sanitize_file_name(file_name: &str) -> String {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or_default();

    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_FILE_NAME_LEN)
        .collect();

    let sanitized = sanitized.trim_start_matches('.');
    if sanitized.is_empty() {
        "image".to_string()
    } else {
        sanitized.to_string()
    }
}
