//! Pluggable storage backend abstraction.
//!
//! Every backend implements the same narrow operation set over its own
//! primitives: the local backend over a real directory tree, the S3
//! backend over a flat, prefix-addressed namespace with no native folder
//! or rename. The facade composes these primitives identically for all
//! backends, so swapping providers is transparent to callers.

pub mod local;
pub mod s3;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::body::ObjectBody;
use crate::error::Result;

pub use local::LocalBackend;
pub use s3::S3Backend;

/// Side-channel metadata attached to a stored object.
///
/// Written at put time, read back at get time to decide whether the
/// envelope codec must run. An object without metadata is plaintext.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Content type of the stored payload as the backend sees it.
    pub content_type: Option<String>,
    /// Stored payload size in bytes (ciphertext size when encrypted).
    pub size: u64,
    /// Whether the payload is an encryption envelope.
    #[serde(default)]
    pub encrypted: bool,
    /// Content type of the plaintext, preserved across encryption.
    pub original_content_type: Option<String>,
    /// Plaintext size in bytes, preserved across encryption.
    pub original_size: Option<u64>,
}

impl ObjectMetadata {
    /// Encryption flags as S3 user metadata. Plaintext objects carry
    /// no flags at all, so their absence means "not encrypted".
    pub fn to_user_metadata(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        if self.encrypted {
            map.insert("encrypted".to_string(), "true".to_string());
            if let Some(ct) = &self.original_content_type {
                map.insert("original-content-type".to_string(), ct.clone());
            }
            if let Some(size) = self.original_size {
                map.insert("original-size".to_string(), size.to_string());
            }
        }
        map
    }

    /// Rebuild metadata from S3 response fields.
    pub fn from_user_metadata(
        user: Option<&HashMap<String, String>>,
        content_type: Option<&str>,
        size: u64,
    ) -> Self {
        let user = user.cloned().unwrap_or_default();
        Self {
            content_type: content_type.map(String::from),
            size,
            encrypted: user.get("encrypted").map(|v| v == "true").unwrap_or(false),
            original_content_type: user.get("original-content-type").cloned(),
            original_size: user
                .get("original-size")
                .and_then(|v| v.parse().ok()),
        }
    }
}

/// Raw body plus metadata, as returned by [`StorageBackend::get`].
pub struct StoredObject {
    pub body: ObjectBody,
    pub metadata: ObjectMetadata,
}

/// Operation set every storage backend must provide.
///
/// Failure semantics are uniform: a missing object on `get`/`stat` is
/// `NotFound`, a missing object on `delete` is `Ok` (idempotent), and
/// `list` of an absent prefix is an empty vec, never an error.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Human-readable backend name (e.g. "local", "s3").
    fn name(&self) -> &'static str;

    /// Store an object, overwriting any previous payload at the key.
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> Result<()>;

    /// Fetch body and metadata for an object.
    async fn get(&self, key: &str) -> Result<StoredObject>;

    /// Metadata-only lookup; never downloads the body.
    async fn stat(&self, key: &str) -> Result<ObjectMetadata>;

    /// Delete an object. Returns `Ok` even if the object doesn't exist.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check presence without fetching the body.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// List all object keys under a prefix, across the whole subtree.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// List immediate "subfolder" names one level under a prefix.
    async fn list_dirs(&self, prefix: &str) -> Result<Vec<String>>;

    /// Byte-for-byte duplicate of an object, metadata included.
    async fn copy(&self, src_key: &str, dst_key: &str) -> Result<()>;

    /// Materialize an empty folder where the backend has real folders;
    /// a no-op on flat namespaces, which grow folders implicitly on the
    /// first write under a prefix.
    async fn create_dir(&self, prefix: &str) -> Result<()>;

    /// Stable public URL for an object. Shape is backend-specific.
    fn public_url(&self, key: &str) -> String;

    /// Time-limited pre-authorized GET URL for one object.
    ///
    /// Backends without a signing capability return
    /// [`crate::StorageError::Unsupported`].
    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String>;
}
