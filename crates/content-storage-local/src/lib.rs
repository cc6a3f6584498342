use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use content_storage_core::{ListOptions, ObjectEntry, ObjectStore, StorageError};
use tokio::fs;
use tracing::{debug, instrument, warn};

const TEMP_SUFFIX: &str = ".upload.tmp";

/// Local filesystem object store.
///
/// Each object is a file under the base directory:
/// ```text
/// {base_dir}/
///   blogs/
///     {record_id}/
///       {uuid}-{name}
/// ```
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_dir: PathBuf,
    base_url: Option<String>,
}

impl LocalStorage {
    /// Create a new LocalStorage with the given base directory.
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            base_url: None,
        }
    }

    /// Serve public URLs as `{base_url}/{path}`.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Resolve a bucket-relative path below the base directory.
    ///
    /// Only plain components are accepted, so no path can escape the base
    /// directory.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(StorageError::InvalidArgument(format!(
                "Invalid object path: {}",
                path
            )));
        }
        Ok(self.base_dir.join(relative))
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(
        &self,
        prefix: &str,
        options: ListOptions,
    ) -> Result<Vec<ObjectEntry>, StorageError> {
        let dir = self.resolve(prefix)?;

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => {
                return Err(StorageError::Io(format!(
                    "Failed to read dir {}: {}",
                    dir.display(),
                    e
                )))
            }
        };

        let mut objects = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StorageError::Io(format!("Failed to read dir entry: {}", e)))?
        {
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| StorageError::Io(format!("Failed to get metadata: {}", e)))?;
            if !metadata.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            if name.ends_with(TEMP_SUFFIX) {
                continue;
            }

            objects.push(ObjectEntry {
                name,
                size_bytes: Some(metadata.len()),
                updated_at: metadata.modified().ok().map(chrono::DateTime::from),
                is_folder: false,
            });
        }

        objects.sort_by(|a, b| a.name.cmp(&b.name));
        let page: Vec<ObjectEntry> = objects
            .into_iter()
            .skip(options.offset)
            .take(options.limit)
            .collect();

        debug!("Listed {} objects under {}", page.len(), prefix);
        Ok(page)
    }

    #[instrument(skip(self, paths), level = "debug", fields(count = paths.len()))]
    async fn remove(&self, paths: &[String]) -> Result<(), StorageError> {
        for path in paths {
            let file = self.resolve(path)?;
            match fs::remove_file(&file).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!("Object not found for deletion: {}", path);
                }
                Err(e) => {
                    return Err(StorageError::Io(format!(
                        "Failed to delete {}: {}",
                        file.display(),
                        e
                    )))
                }
            }
        }

        debug!("Removed {} objects", paths.len());
        Ok(())
    }

    #[instrument(skip(self, data), level = "debug", fields(data_len = data.len()))]
    async fn upload(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        let file = self.resolve(path)?;

        let exists = fs::try_exists(&file).await.map_err(|e| {
            StorageError::Io(format!("Failed to check {}: {}", file.display(), e))
        })?;
        if exists {
            return Err(StorageError::Upload(format!(
                "Object already exists: {}",
                path
            )));
        }

        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::Io(format!("Failed to create dir {}: {}", parent.display(), e))
            })?;
        }

        // Write atomically via temp file
        let mut temp_name = file.as_os_str().to_owned();
        temp_name.push(TEMP_SUFFIX);
        let temp_path = PathBuf::from(temp_name);
        fs::write(&temp_path, data).await.map_err(|e| {
            StorageError::Upload(format!("Failed to write {}: {}", temp_path.display(), e))
        })?;
        fs::rename(&temp_path, &file).await.map_err(|e| {
            StorageError::Upload(format!("Failed to rename to {}: {}", file.display(), e))
        })?;

        debug!("Stored {} ({} bytes, {})", path, data.len(), content_type);
        Ok(path.to_string())
    }

    fn public_url(&self, path: &str) -> Option<String> {
        self.base_url
            .as_ref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_storage_core::{ContentKind, Reconciler};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn setup() -> (LocalStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(temp_dir.path());
        (storage, temp_dir)
    }

    fn page(limit: usize, offset: usize) -> ListOptions {
        ListOptions { limit, offset }
    }

    #[tokio::test]
    async fn test_upload_list_remove() {
        let (storage, _temp) = setup().await;

        for name in ["c.png", "a.png", "b.png"] {
            let path = format!("blogs/1/{}", name);
            let stored = storage.upload(&path, b"png", "image/png").await.unwrap();
            assert_eq!(stored, path);
        }

        let listed = storage.list("blogs/1", page(100, 0)).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
        assert_eq!(listed[0].size_bytes, Some(3));
        assert!(listed[0].updated_at.is_some());

        storage
            .remove(&["blogs/1/a.png".to_string(), "blogs/1/missing.png".to_string()])
            .await
            .unwrap();

        let listed = storage.list("blogs/1", page(100, 0)).await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn test_list_paging_and_missing_folder() {
        let (storage, _temp) = setup().await;

        for i in 0..5 {
            storage
                .upload(&format!("newsletters/4/img-{}.png", i), b"x", "image/png")
                .await
                .unwrap();
        }
        // Nested folders are not objects of this folder
        storage
            .upload("newsletters/4/nested/deep.png", b"x", "image/png")
            .await
            .unwrap();

        let first = storage.list("newsletters/4", page(2, 0)).await.unwrap();
        let last = storage.list("newsletters/4", page(2, 4)).await.unwrap();
        let past_end = storage.list("newsletters/4", page(2, 10)).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first[0].name, "img-0.png");
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].name, "img-4.png");
        assert!(past_end.is_empty());

        assert!(storage.list("newsletters/99", page(2, 0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_duplicates() {
        let (storage, _temp) = setup().await;

        storage.upload("blogs/1/a.png", b"one", "image/png").await.unwrap();
        let result = storage.upload("blogs/1/a.png", b"two", "image/png").await;

        assert!(matches!(result, Err(StorageError::Upload(_))));
        let content = tokio::fs::read(storage.base_dir().join("blogs/1/a.png"))
            .await
            .unwrap();
        assert_eq!(content, b"one");
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let (storage, _temp) = setup().await;

        for path in ["../outside.png", "/etc/passwd", "blogs/../../x", "./blogs/a.png"] {
            let result = storage.upload(path, b"x", "image/png").await;
            assert!(
                matches!(result, Err(StorageError::InvalidArgument(_))),
                "{} should be rejected",
                path
            );
        }
        assert!(storage.list("..", page(10, 0)).await.is_err());
    }

    #[tokio::test]
    async fn test_public_url() {
        let (storage, _temp) = setup().await;
        assert_eq!(storage.public_url("blogs/1/a.png"), None);

        let storage = storage.with_base_url("http://localhost:3000/media/");
        assert_eq!(
            storage.public_url("blogs/1/a.png").as_deref(),
            Some("http://localhost:3000/media/blogs/1/a.png")
        );
    }

    #[tokio::test]
    async fn test_reconcile_on_disk() {
        let (storage, temp) = setup().await;
        let storage = Arc::new(storage);
        let reconciler = Reconciler::new(storage.clone());

        let kept = reconciler
            .upload_content_image(ContentKind::Blog, "12", "kept.png", b"k", "image/png")
            .await
            .unwrap();
        reconciler
            .upload_content_image(ContentKind::Blog, "12", "dropped.png", b"d", "image/png")
            .await
            .unwrap();

        let doc = json!({
            "type": "doc",
            "content": [{
                "type": "image",
                "attrs": { "src": "ignored", "filePath": kept.file_path }
            }]
        });
        let report = reconciler
            .sync_storage_with_content(ContentKind::Blog, "12", &doc)
            .await
            .unwrap();
        assert_eq!(report.deleted, 1);
        assert!(temp.path().join(&kept.file_path).exists());

        let purged = reconciler
            .delete_all_content_images(ContentKind::Blog, "12")
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(!temp.path().join(&kept.file_path).exists());
    }
}
