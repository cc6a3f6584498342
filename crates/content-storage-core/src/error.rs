use thiserror::Error;

/// Errors that can occur in the storage layer.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A list page request failed. The whole listing is aborted.
    #[error("Storage list error: {0}")]
    List(String),

    /// A bulk-delete batch failed. Batches before it are not rolled back.
    #[error("Storage delete error on batch {batch}: {message} ({deleted} objects already removed)")]
    Delete {
        batch: usize,
        deleted: usize,
        message: String,
    },

    #[error("Storage upload error: {0}")]
    Upload(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}
