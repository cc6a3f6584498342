use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

/// Paging window for a single list request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: usize,
    pub offset: usize,
}

/// One entry returned by a list request.
///
/// Listing is one level deep, so a provider may return nested folders next
/// to objects. Folders count towards the page length but are never objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Name relative to the listed prefix.
    pub name: String,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    pub is_folder: bool,
}

/// Object storage client abstraction.
///
/// Paths are bucket-relative and use `/` as separator
/// (e.g. `blogs/12/3f2c-hero.png`).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the backend identifier (e.g., "supabase", "local").
    fn backend_name(&self) -> &'static str;

    /// List one page of the entries directly under `prefix`.
    async fn list(
        &self,
        prefix: &str,
        options: ListOptions,
    ) -> Result<Vec<ObjectEntry>, StorageError>;

    /// Remove objects in a single request.
    async fn remove(&self, paths: &[String]) -> Result<(), StorageError>;

    /// Store an object and return its path.
    async fn upload(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError>;

    /// Public URL for an object, if the backend serves one.
    fn public_url(&self, path: &str) -> Option<String>;
}
