//! Core types for marketing-site content image storage.
//!
//! This crate holds everything that does not depend on a particular storage
//! provider:
//! - `document`: plain-text and image-reference extraction from rich-text trees
//! - `ContentKind` / `FolderPrefix`: where each record's images live
//! - `ObjectStore`: the storage client abstraction implemented by backends
//! - `Reconciler`: orphaned-image cleanup, full-folder purge and uploads

pub mod document;
mod error;
mod kind;
mod lock;
mod reconcile;
mod store;

pub use document::{
    collect_image_file_paths, extract_plain_text, find_first_image_attrs, is_empty_document,
    ImageAttrs,
};
pub use error::StorageError;
pub use kind::{ContentKind, ContentRecord, ContentStatus, FolderPrefix};
pub use lock::{RecordGuard, RecordLocks};
pub use reconcile::{
    sanitize_file_name, Reconciler, SyncReport, UploadedImage, DELETE_BATCH_SIZE, PAGE_SIZE,
};
pub use store::{ListOptions, ObjectEntry, ObjectStore};
