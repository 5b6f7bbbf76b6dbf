//! Local filesystem backend.
//!
//! Keys map directly to paths under a base directory, so folders are
//! real here. Object metadata lives in a parallel tree under
//! `<root>/.meta/<key>`, outside the key namespace entirely, so an
//! object key can never collide with another object's sidecar (keys
//! ending in any particular suffix included). The `.meta` name is
//! reserved as a first key segment for that reason. The facade still
//! drives folder emulation through the common primitive sequence,
//! never through filesystem renames, so the backend swap stays
//! transparent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{ObjectMetadata, StorageBackend, StoredObject};
use crate::body::ObjectBody;
use crate::error::{Result, StorageError};

/// Directory under the root holding metadata sidecars, mirroring the
/// object tree. Reserved: no object key may start with this segment.
const META_DIR: &str = ".meta";

/// Storage backend over a local directory tree.
pub struct LocalBackend {
    root: PathBuf,
    meta_root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let meta_root = root.join(META_DIR);
        Self { root, meta_root }
    }

    /// Map a key to a path under `base`.
    ///
    /// Rejects empty, `.` and `..` segments so a key can never escape
    /// the base directory, and rejects the reserved `.meta` first
    /// segment so payloads never land inside the sidecar tree.
    fn resolve_in(&self, base: &Path, key: &str) -> Result<PathBuf> {
        let key = key.trim_matches('/');
        let invalid = || {
            StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid object key: {key}"),
            ))
        };

        let mut path = base.to_path_buf();
        for (i, part) in key.split('/').enumerate() {
            if part.is_empty() || part == "." || part == ".." {
                return Err(invalid());
            }
            if i == 0 && part == META_DIR {
                return Err(invalid());
            }
            path.push(part);
        }
        Ok(path)
    }

    fn resolve(&self, key: &str) -> Result<PathBuf> {
        self.resolve_in(&self.root, key)
    }

    /// Sidecar path for a key, in the parallel metadata tree.
    fn sidecar(&self, key: &str) -> Result<PathBuf> {
        self.resolve_in(&self.meta_root, key)
    }

    /// Like `resolve`, but an empty key addresses the root itself
    /// (legitimate for listings over the whole namespace).
    fn resolve_prefix(&self, prefix: &str) -> Result<PathBuf> {
        if prefix.trim_matches('/').is_empty() {
            Ok(self.root.clone())
        } else {
            self.resolve(prefix)
        }
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let parts: Vec<&str> = rel.iter().map(|c| c.to_str().unwrap_or_default()).collect();
        Some(parts.join("/"))
    }

    /// Remove now-empty parent directories up to `stop`, so deleting
    /// every object under a prefix also drops the directory subtree.
    async fn prune_empty_parents(path: &Path, stop: &Path) {
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == stop || fs::remove_dir(d).await.is_err() {
                break;
            }
            dir = d.parent();
        }
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        _content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;

        let sidecar = self.sidecar(key)?;
        if let Some(parent) = sidecar.parent() {
            fs::create_dir_all(parent).await?;
        }
        let meta_json = serde_json::to_vec(metadata)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        fs::write(&sidecar, meta_json).await?;

        debug!(key, bytes = data.len(), "Stored object on local filesystem");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<StoredObject> {
        let path = self.resolve(key)?;
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let metadata = self.stat(key).await?;
        Ok(StoredObject {
            body: ObjectBody::from(data),
            metadata,
        })
    }

    async fn stat(&self, key: &str) -> Result<ObjectMetadata> {
        let path = self.resolve(key)?;
        let file_meta = match fs::metadata(&path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        // Objects written out-of-band have no sidecar; treat them as
        // plaintext with unknown content type.
        match fs::read(self.sidecar(key)?).await {
            Ok(json) => serde_json::from_slice(&json)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ObjectMetadata {
                size: file_meta.len(),
                ..Default::default()
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        Self::prune_empty_parents(&path, &self.root).await;

        let sidecar = self.sidecar(key)?;
        let _ = fs::remove_file(&sidecar).await;
        Self::prune_empty_parents(&sidecar, &self.meta_root).await;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        // A directory at the key path is a folder, not an object.
        match fs::metadata(self.resolve(key)?).await {
            Ok(m) => Ok(m.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let base = self.resolve_prefix(prefix)?;
        match fs::metadata(&base).await {
            Ok(m) if m.is_dir() => {}
            _ => return Ok(vec![]),
        }

        // Iterative walk; recursion and async don't mix well.
        let mut keys = Vec::new();
        let mut pending = vec![base];
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    if path != self.meta_root {
                        pending.push(path);
                    }
                } else if let Some(key) = self.key_for(&path) {
                    keys.push(key);
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>> {
        let base = self.resolve_prefix(prefix)?;
        match fs::metadata(&base).await {
            Ok(m) if m.is_dir() => {}
            _ => return Ok(vec![]),
        }

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&base).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() && entry.path() != self.meta_root {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<()> {
        let src = self.resolve(src_key)?;
        let dst = self.resolve(dst_key)?;
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent).await?;
        }
        match fs::copy(&src, &dst).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(src_key.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        let src_sidecar = self.sidecar(src_key)?;
        if fs::try_exists(&src_sidecar).await? {
            let dst_sidecar = self.sidecar(dst_key)?;
            if let Some(parent) = dst_sidecar.parent() {
                fs::create_dir_all(parent).await?;
            }
            fs::copy(&src_sidecar, &dst_sidecar).await?;
        }
        Ok(())
    }

    async fn create_dir(&self, prefix: &str) -> Result<()> {
        let path = self.resolve_prefix(prefix)?;
        fs::create_dir_all(&path).await?;
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("/storage/{key}")
    }

    async fn presign_get(&self, _key: &str, _ttl: Duration) -> Result<String> {
        Err(StorageError::Unsupported {
            backend: "local",
            operation: "presign_get",
        })
    }
}
