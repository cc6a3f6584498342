use std::path::Path;

use anyhow::Context;
use content_storage_core::{
    collect_image_file_paths, extract_plain_text, find_first_image_attrs, is_empty_document,
    ContentRecord, FolderPrefix, Reconciler,
};
use serde_json::{json, Value};
use tracing::info;

use crate::config::Command;

/// Run one command and return its JSON output.
pub async fn execute(reconciler: &Reconciler, command: Command) -> anyhow::Result<Value> {
    match command {
        Command::Sync { record } => {
            let record: ContentRecord = serde_json::from_value(read_json(&record).await?)
                .context("File is not a content record")?;

            let report = reconciler
                .sync_storage_with_content(record.kind, &record.id, &record.content)
                .await?;
            info!(
                "Synced {} {}: {} orphaned images removed",
                record.kind, record.id, report.deleted
            );
            Ok(json!({
                "deleted": report.deleted,
                "draft": record.is_draft(),
            }))
        }

        Command::Purge { kind, id } => {
            let deleted = reconciler.delete_all_content_images(kind, &id).await?;
            info!("Purged {} {}: {} images removed", kind, id, deleted);
            Ok(json!({ "deleted": deleted }))
        }

        Command::List { kind, id } => {
            let prefix = FolderPrefix::new(kind, &id)?;
            let mut paths = reconciler.list_folder(prefix.as_str()).await?;
            paths.sort();
            Ok(json!(paths))
        }

        Command::Upload {
            kind,
            id,
            file,
            content_type,
        } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .map(|name| name.to_string_lossy().to_string())
                .unwrap_or_default();
            let content_type =
                content_type.unwrap_or_else(|| guess_content_type(&file).to_string());

            let uploaded = reconciler
                .upload_content_image(kind, &id, &file_name, &data, &content_type)
                .await?;
            Ok(serde_json::to_value(uploaded)?)
        }

        Command::Text { file } => {
            let value = read_json(&file).await?;
            let document = document_of(&value);

            let mut file_paths: Vec<String> =
                collect_image_file_paths(document).into_iter().collect();
            file_paths.sort();

            Ok(json!({
                "text": extract_plain_text(document),
                "firstImage": find_first_image_attrs(document),
                "filePaths": file_paths,
                "empty": is_empty_document(document),
            }))
        }
    }
}

async fn read_json(path: &Path) -> anyhow::Result<Value> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// A record's document, or the value itself when it is a bare document.
fn document_of(value: &Value) -> &Value {
    match (value.get("kind"), value.get("content")) {
        (Some(_), Some(content)) if content.is_object() => content,
        _ => value,
    }
}

fn guess_content_type(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}
