//! Object storage interface and filesystem implementation
//!
//! Transient pipeline state (pending message metadata, attachment bytes,
//! pair claims, processing results) and the permanent title-document
//! archive both live behind this trait. `put_if_absent` is the claim
//! primitive used to guard against double-dispatch of a pair.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use titlecheck_common::{Error, Result};

/// Generic key-path byte store
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write bytes at a path, overwriting any existing object
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Write bytes only if no object exists at the path. Returns true when
    /// this call created the object. Atomic per path.
    async fn put_if_absent(&self, path: &str, bytes: &[u8]) -> Result<bool>;

    /// Read all bytes at a path; `Error::NotFound` when absent
    async fn get(&self, path: &str) -> Result<Vec<u8>>;

    async fn exists(&self, path: &str) -> Result<bool>;

    /// Delete the object at a path; deleting an absent object is not an error
    async fn delete(&self, path: &str) -> Result<()>;

    /// List object paths under a prefix
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Time-limited read URL for an object
    async fn read_url(&self, path: &str, ttl: Duration) -> Result<String>;
}

/// Delete every object under a prefix. Idempotent; absent prefixes are fine.
pub async fn delete_prefix(store: &dyn ObjectStore, prefix: &str) -> Result<()> {
    for path in store.list_prefix(prefix).await? {
        store.delete(&path).await?;
    }
    Ok(())
}

/// Object store rooted at a local directory
///
/// Stand-in for a cloud blob container; `read_url` returns a `file://` URL
/// rather than a signed one.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Resolve a store path to a filesystem path, rejecting traversal
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let rel = Path::new(path);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(Error::Storage(format!("invalid object path: {}", path)));
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, bytes).await?;
        Ok(())
    }

    async fn put_if_absent(&self, path: &str, bytes: &[u8]) -> Result<bool> {
        let full = self.resolve(path)?;
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // create_new gives the atomic claim semantics
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
        {
            Ok(mut file) => {
                use tokio::io::AsyncWriteExt;
                file.write_all(bytes).await?;
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::NotFound(format!("object not found: {}", path)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        let full = self.resolve(path)?;
        Ok(tokio::fs::try_exists(&full).await?)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        let full = self.resolve(path)?;
        match tokio::fs::remove_file(&full).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let full = self.resolve(prefix)?;
        let mut paths = Vec::new();
        let mut stack = vec![full];

        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    paths.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }

        paths.sort();
        Ok(paths)
    }

    async fn read_url(&self, path: &str, _ttl: Duration) -> Result<String> {
        let full = self.resolve(path)?;
        if !tokio::fs::try_exists(&full).await? {
            return Err(Error::NotFound(format!("object not found: {}", path)));
        }
        Ok(format!("file://{}", full.display()))
    }
}
