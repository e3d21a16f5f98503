//! Object storage abstraction
//!
//! The admin service treats its media bucket as a key-value blob store.
//! Keys are `/`-separated paths; entity images live under a per-kind
//! prefix, with soft-deleted images staged under `images/deleted/` until
//! the owning backup record is restored or discarded.

pub mod fs_store;

pub use fs_store::FsObjectStore;

use async_trait::async_trait;
use lectary_common::Result;

use crate::models::EntityKind;

/// Key-value blob store operations used by the admin service
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool>;
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()>;
    async fn copy(&self, src_key: &str, dest_key: &str) -> Result<()>;
    /// Remove a key; removing an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;
    /// All keys under a prefix
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
    /// Immediate sub-prefixes under a prefix (delimiter listing)
    async fn list_prefixes(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Live image key for an entity
pub fn entity_image_key(kind: EntityKind, id: i64) -> String {
    format!("images/{}/{}.jpg", kind, id)
}

/// Staging key for a soft-deleted entity's image, addressed by original id
pub fn deleted_image_key(kind: EntityKind, original_id: i64) -> String {
    format!("images/deleted/{}/{}.jpg", kind, original_id)
}
