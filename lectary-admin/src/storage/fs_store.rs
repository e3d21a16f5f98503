//! Filesystem-backed object store
//!
//! Maps keys onto files under a root directory inside the data folder.
//! Good enough for a single-host deployment; the trait keeps the door open
//! for a remote bucket implementation.

use async_trait::async_trait;
use lectary_common::{Error, Result};
use std::path::{Component, Path, PathBuf};

use super::ObjectStore;

/// Object store rooted at a local directory
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Resolve a key to a path under the root, rejecting traversal
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Err(Error::Storage("Empty object key".to_string()));
        }
        let relative = Path::new(key);
        let traversal = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if traversal {
            return Err(Error::Storage(format!("Invalid object key: {}", key)));
        }
        Ok(self.root.join(relative))
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let key = relative
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .collect::<Vec<_>>()
            .join("/");
        Some(key)
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        Ok(tokio::fs::try_exists(&path)
            .await
            .map_err(|e| Error::Storage(format!("exists {}: {}", key, e)))?)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.resolve(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::Storage(format!("get {}: {}", key, e)))
    }

    async fn put(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(format!("put {}: {}", key, e)))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| Error::Storage(format!("put {}: {}", key, e)))
    }

    async fn copy(&self, src_key: &str, dest_key: &str) -> Result<()> {
        let src = self.resolve(src_key)?;
        let dest = self.resolve(dest_key)?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(format!("copy {}: {}", dest_key, e)))?;
        }
        tokio::fs::copy(&src, &dest)
            .await
            .map_err(|e| Error::Storage(format!("copy {} -> {}: {}", src_key, dest_key, e)))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Storage(format!("delete {}: {}", key, e))),
        }
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let base = self.resolve(prefix)?;
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in walkdir::WalkDir::new(&base).into_iter() {
            let entry = entry.map_err(|e| Error::Storage(format!("list {}: {}", prefix, e)))?;
            if entry.file_type().is_file() {
                if let Some(key) = self.key_for(entry.path()) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn list_prefixes(&self, prefix: &str) -> Result<Vec<String>> {
        let base = self.resolve(prefix)?;
        if !base.is_dir() {
            return Ok(Vec::new());
        }

        let mut prefixes = Vec::new();
        let mut entries = tokio::fs::read_dir(&base)
            .await
            .map_err(|e| Error::Storage(format!("list {}: {}", prefix, e)))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::Storage(format!("list {}: {}", prefix, e)))?
        {
            if entry
                .file_type()
                .await
                .map_err(|e| Error::Storage(format!("list {}: {}", prefix, e)))?
                .is_dir()
            {
                if let Some(key) = self.key_for(&entry.path()) {
                    prefixes.push(format!("{}/", key));
                }
            }
        }
        prefixes.sort();
        Ok(prefixes)
    }
}
