use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StorageError;

/// The content types editors manage. Each kind owns one top-level storage
/// folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentKind {
    Newsletter,
    Blog,
    CaseStudy,
}

impl ContentKind {
    pub const ALL: [ContentKind; 3] = [
        ContentKind::Newsletter,
        ContentKind::Blog,
        ContentKind::CaseStudy,
    ];

    /// Top-level folder holding the images of every record of this kind.
    pub fn folder_name(self) -> &'static str {
        match self {
            ContentKind::Newsletter => "newsletters",
            ContentKind::Blog => "blogs",
            ContentKind::CaseStudy => "case-studies",
        }
    }

    /// Name used in records and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            ContentKind::Newsletter => "newsletter",
            ContentKind::Blog => "blog",
            ContentKind::CaseStudy => "caseStudy",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| StorageError::InvalidArgument(format!("Unknown content kind: {}", s)))
    }
}

/// The storage folder that holds one record's images: `<kindFolder>/<recordId>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FolderPrefix(String);

impl FolderPrefix {
    /// Build the prefix for a record.
    ///
    /// Rejects blank ids and ids containing `/`, which would address the
    /// whole kind folder or another record's folder.
    pub fn new(kind: ContentKind, record_id: &str) -> Result<Self, StorageError> {
        let id = record_id.trim();
        if id.is_empty() {
            return Err(StorageError::InvalidArgument(
                "Record id must not be empty".to_string(),
            ));
        }
        if id.contains('/') {
            return Err(StorageError::InvalidArgument(format!(
                "Record id must not contain '/': {}",
                record_id
            )));
        }

        Ok(Self(format!("{}/{}", kind.folder_name(), id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Full object path for an entry name listed under this prefix.
    pub fn join(&self, name: &str) -> String {
        format!("{}/{}", self.0, name)
    }
}

impl fmt::Display for FolderPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Publication status of a content record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Draft,
    Published,
}

/// A content record as handed over by the content-mutation layer.
///
/// Only `kind`, `id` and `content` matter for storage reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub kind: ContentKind,
    #[serde(default)]
    pub status: ContentStatus,
    #[serde(default)]
    pub content: Value,
}

impl ContentRecord {
    /// Drafts are identified by their status only, never by inspecting the
    /// document body.
    pub fn is_draft(&self) -> bool {
        self.status == ContentStatus::Draft
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_folder_mapping() {
        assert_eq!(ContentKind::Newsletter.folder_name(), "newsletters");
        assert_eq!(ContentKind::Blog.folder_name(), "blogs");
        assert_eq!(ContentKind::CaseStudy.folder_name(), "case-studies");
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("caseStudy".parse::<ContentKind>().unwrap(), ContentKind::CaseStudy);
        assert_eq!("blog".parse::<ContentKind>().unwrap(), ContentKind::Blog);

        let err = "case-study".parse::<ContentKind>().unwrap_err();
        assert!(err.to_string().contains("Unknown content kind"));
    }

    #[test]
    fn test_folder_prefix() {
        let prefix = FolderPrefix::new(ContentKind::CaseStudy, "42").unwrap();
        assert_eq!(prefix.as_str(), "case-studies/42");
        assert_eq!(prefix.join("hero.png"), "case-studies/42/hero.png");

        assert!(matches!(
            FolderPrefix::new(ContentKind::Blog, "  "),
            Err(StorageError::InvalidArgument(_))
        ));
        assert!(matches!(
            FolderPrefix::new(ContentKind::Blog, "1/../2"),
            Err(StorageError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_record_deserialize() {
        let record: ContentRecord = serde_json::from_value(json!({
            "id": "7",
            "kind": "caseStudy",
            "status": "published",
            "content": { "type": "doc", "content": [] }
        }))
        .unwrap();

        assert_eq!(record.kind, ContentKind::CaseStudy);
        assert!(!record.is_draft());

        let draft: ContentRecord =
            serde_json::from_value(json!({ "id": "8", "kind": "newsletter" })).unwrap();
        assert!(draft.is_draft());
        assert!(draft.content.is_null());
    }
}
