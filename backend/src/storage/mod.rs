//! Storage seams used by the certificate core.
//!
//! Two independent stores back the service:
//! - a key/value [`MetadataStore`] holding template and participant records
//!   plus the current-batch pointer, with optional per-key expiry;
//! - a binary [`ObjectStore`] holding rendered PDFs under `{batch_id}/{file}`.
//!
//! The typed repositories in [`records`] sit on top of the metadata store and
//! own the key layout.

pub mod fs_objects;
pub mod records;
pub mod sqlite_kv;

use async_trait::async_trait;
use std::time::Duration;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
    #[error("invalid object key: {0:?}")]
    InvalidKey(String),
    #[error("join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value. With a `ttl`
    /// the entry disappears once it has elapsed.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StorageResult<()>;

    /// Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> StorageResult<bool>;

    /// Live keys starting with `prefix`, sorted.
    async fn list_by_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> StorageResult<()>;

    async fn get(&self, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Keys starting with `prefix`, sorted. An empty prefix lists the whole bucket.
    async fn list_by_prefix(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Deletes the given keys, returning how many existed.
    async fn delete_many(&self, keys: &[String]) -> StorageResult<usize>;
}
