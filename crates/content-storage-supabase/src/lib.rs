//! Supabase Storage backend.
//!
//! Talks to the Storage REST API of a Supabase project with a service-role
//! key. Objects live in a single bucket; paths are bucket-relative.

use async_trait::async_trait;
use content_storage_core::{ListOptions, ObjectEntry, ObjectStore, StorageError};
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// List request body.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: usize,
    offset: usize,
    sort_by: SortBy,
}

#[derive(Serialize)]
struct SortBy {
    column: &'static str,
    order: &'static str,
}

/// Bulk delete request body.
#[derive(Serialize)]
struct RemoveRequest<'a> {
    prefixes: &'a [String],
}

/// One entry of a list response. Folders come back with a null `id`.
#[derive(Deserialize)]
struct ListedObject {
    name: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    updated_at: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    metadata: Option<ListedMetadata>,
}

#[derive(Deserialize)]
struct ListedMetadata {
    #[serde(default)]
    size: Option<u64>,
}

impl From<ListedObject> for ObjectEntry {
    fn from(object: ListedObject) -> Self {
        Self {
            name: object.name,
            size_bytes: object.metadata.and_then(|m| m.size),
            updated_at: object.updated_at,
            is_folder: object.id.is_none(),
        }
    }
}

/// Supabase Storage REST API client.
pub struct SupabaseStorage {
    http_client: HttpClient,
    project_url: String,
    service_key: String,
    bucket: String,
}

impl std::fmt::Debug for SupabaseStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseStorage")
            .field("project_url", &self.project_url)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl SupabaseStorage {
    /// Create a new client for `bucket` in the project at `project_url`.
    pub fn new(
        project_url: impl Into<String>,
        service_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            http_client: HttpClient::new(),
            project_url: project_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            bucket: bucket.into(),
        }
    }

    /// Base URL for object endpoints.
    fn object_api(&self) -> String {
        format!("{}/storage/v1/object", self.project_url)
    }

    /// Percent-encode each path segment, keeping the separators.
    fn encode_path(path: &str) -> String {
        path.split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("apikey", &self.service_key)
    }

    /// Turn a non-success response into a provider error carrying the body.
    async fn check(response: Response, operation: &str) -> Result<Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        Err(StorageError::Provider(format!(
            "{} failed with status {}: {}",
            operation, status, text
        )))
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    fn backend_name(&self) -> &'static str {
        "supabase"
    }

    #[instrument(skip(self), level = "debug")]
    async fn list(
        &self,
        prefix: &str,
        options: ListOptions,
    ) -> Result<Vec<ObjectEntry>, StorageError> {
        let url = format!("{}/list/{}", self.object_api(), self.bucket);
        let body = ListRequest {
            prefix,
            limit: options.limit,
            offset: options.offset,
            sort_by: SortBy {
                column: "name",
                order: "asc",
            },
        };

        let response = self
            .authorized(self.http_client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::Provider(format!("Storage list request failed: {}", e)))?;
        let response = Self::check(response, "Storage list").await?;

        let objects: Vec<ListedObject> = response.json().await.map_err(|e| {
            StorageError::Serialization(format!("Failed to parse list response: {}", e))
        })?;

        debug!("Listed {} objects under {}", objects.len(), prefix);
        Ok(objects.into_iter().map(ObjectEntry::from).collect())
    }

    #[instrument(skip(self, paths), level = "debug", fields(count = paths.len()))]
    async fn remove(&self, paths: &[String]) -> Result<(), StorageError> {
        let url = format!("{}/{}", self.object_api(), self.bucket);

        let response = self
            .authorized(self.http_client.delete(&url))
            .json(&RemoveRequest { prefixes: paths })
            .send()
            .await
            .map_err(|e| StorageError::Provider(format!("Storage remove request failed: {}", e)))?;
        Self::check(response, "Storage remove").await?;

        debug!("Removed {} objects from {}", paths.len(), self.bucket);
        Ok(())
    }

    #[instrument(skip(self, data), level = "debug", fields(data_len = data.len()))]
    async fn upload(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        let url = format!(
            "{}/{}/{}",
            self.object_api(),
            self.bucket,
            Self::encode_path(path)
        );

        let response = self
            .authorized(self.http_client.post(&url))
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(data.to_vec())
            .send()
            .await
            .map_err(|e| StorageError::Upload(format!("Storage upload request failed: {}", e)))?;
        Self::check(response, "Storage upload")
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;

        debug!("Uploaded {} ({} bytes)", path, data.len());
        Ok(path.to_string())
    }

    fn public_url(&self, path: &str) -> Option<String> {
        Some(format!(
            "{}/public/{}/{}",
            self.object_api(),
            self.bucket,
            Self::encode_path(path)
        ))
    }
}
