use std::path::PathBuf;

use clap::{Parser, Subcommand};
use content_storage_core::ContentKind;

/// Configuration for the content-storage tool.
#[derive(Parser, Debug, Clone)]
#[command(name = "content-storage")]
#[command(about = "Keep content image folders in object storage in line with their documents")]
pub struct Config {
    /// Object storage backend
    #[arg(long, default_value = "supabase", env = "STORAGE_BACKEND")]
    pub backend: StorageBackend,

    /// Supabase project URL (e.g. https://xyz.supabase.co)
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase service-role key
    #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
    pub supabase_service_key: Option<String>,

    /// Bucket holding content images
    #[arg(long, default_value = "content-images", env = "STORAGE_BUCKET")]
    pub bucket: String,

    /// Base directory for local storage
    #[arg(long, env = "LOCAL_STORAGE_DIR")]
    pub local_storage_dir: Option<PathBuf>,

    /// Base URL serving local storage files
    #[arg(long, env = "PUBLIC_BASE_URL")]
    pub public_base_url: Option<String>,

    /// Keep unreferenced objects modified within this many seconds
    #[arg(long, env = "ORPHAN_GRACE_PERIOD_SECS")]
    pub orphan_grace_period_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Get the effective local storage directory.
    pub fn effective_local_storage_dir(&self) -> PathBuf {
        self.local_storage_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("content-storage")
                .join(&self.bucket)
        })
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Delete images no longer referenced by a record's document
    Sync {
        /// JSON file holding the record (`id`, `kind`, `status`, `content`)
        #[arg(long)]
        record: PathBuf,
    },

    /// Delete every image of a record
    Purge {
        #[arg(long)]
        kind: ContentKind,
        #[arg(long)]
        id: String,
    },

    /// List the stored images of a record
    List {
        #[arg(long)]
        kind: ContentKind,
        #[arg(long)]
        id: String,
    },

    /// Upload an image into a record folder
    Upload {
        #[arg(long)]
        kind: ContentKind,
        #[arg(long)]
        id: String,
        /// Image file to upload
        file: PathBuf,
        /// Content type (guessed from the extension when omitted)
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Print the plain text and image references of a document or record
    Text {
        /// JSON file holding a document tree or a record
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageBackend {
    Supabase,
    Local,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Supabase => write!(f, "supabase"),
            StorageBackend::Local => write!(f, "local"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_purge() {
        let config = Config::try_parse_from([
            "content-storage",
            "--backend",
            "local",
            "--local-storage-dir",
            "/tmp/images",
            "purge",
            "--kind",
            "caseStudy",
            "--id",
            "42",
        ])
        .unwrap();

        assert_eq!(config.backend, StorageBackend::Local);
        assert_eq!(config.effective_local_storage_dir(), PathBuf::from("/tmp/images"));
        match config.command {
            Command::Purge { kind, id } => {
                assert_eq!(kind, ContentKind::CaseStudy);
                assert_eq!(id, "42");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_record_serialization_is_not_a_flag() {
        let result = Config::try_parse_from([
            "content-storage",
            "--serialize-per-record",
            "list",
            "--kind",
            "blog",
            "--id",
            "1",
        ]);
        assert!(result.is_err());

        let config = Config::try_parse_from([
            "content-storage",
            "--orphan-grace-period-secs",
            "600",
            "list",
            "--kind",
            "blog",
            "--id",
            "1",
        ])
        .unwrap();
        assert_eq!(config.orphan_grace_period_secs, Some(600));
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let result = Config::try_parse_from([
            "content-storage",
            "list",
            "--kind",
            "podcast",
            "--id",
            "1",
        ]);
        assert!(result.is_err());
    }
}
