//! Storage facade: the single entry point for all callers.
//!
//! Selects one backend from configuration, applies envelope encryption
//! around put/get when asked to, and emulates folder semantics on flat
//! namespaces by composing primitive backend operations. Holds no
//! cross-request mutable state: immutable config, resolved key
//! material, and one long-lived backend handle. Every operation takes
//! `&self` and is safe to call concurrently for different keys;
//! concurrent writes to the same key are last-write-wins at the
//! backend.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::backend::{LocalBackend, ObjectMetadata, S3Backend, StorageBackend};
use crate::body::ObjectBody;
use crate::config::{BackendKind, StorageConfig};
use crate::crypto::{envelope, SensitiveBytes32};
use crate::error::{Result, StorageError};
use crate::paths;

/// Default lifetime for signed URLs.
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;

/// Content type stored for encrypted payloads; the original type is
/// preserved in metadata and restored on read.
const ENVELOPE_CONTENT_TYPE: &str = "application/octet-stream";

/// Returned by every write. `size` is always the plaintext size the
/// caller supplied, never the larger ciphertext size.
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub key: String,
    pub public_url: String,
    pub size: u64,
}

/// Returned by [`StorageService::get_object`]. For encrypted objects
/// the body is already-decrypted plaintext and `content_type` is the
/// original one, never the opaque envelope type.
pub struct ObjectDownload {
    pub body: ObjectBody,
    pub content_type: Option<String>,
    pub size: u64,
}

/// Resolved encryption key state for the process lifetime.
enum KeyMaterial {
    /// 32 bytes supplied through configuration.
    Configured(SensitiveBytes32),
    /// Random per-process key, explicitly opted into. Development only.
    Ephemeral(SensitiveBytes32),
    /// No key; encrypted puts and gets fail with a configuration error.
    Disabled,
}

/// Facade over the active storage backend.
pub struct StorageService {
    backend: Arc<dyn StorageBackend>,
    keys: KeyMaterial,
}

impl StorageService {
    /// Build the service from configuration. Backend selection and key
    /// material are resolved here, once; placeholder backends and
    /// malformed configuration fail eagerly.
    pub fn new(config: StorageConfig) -> Result<Self> {
        config.validate()?;

        let backend: Arc<dyn StorageBackend> = match &config.backend {
            BackendKind::Local { root } => Arc::new(LocalBackend::new(root.clone())),
            BackendKind::S3(s3) => Arc::new(S3Backend::new(s3)),
            // validate() already rejected these.
            BackendKind::Gcs | BackendKind::Azure => {
                return Err(StorageError::Configuration(
                    "backend is not implemented".into(),
                ));
            }
        };

        let keys = match (&config.encryption_key, config.allow_ephemeral_key) {
            (Some(key), _) => KeyMaterial::Configured(key.clone()),
            (None, true) => {
                warn!(
                    "No encryption key configured; generated an ephemeral key. \
                     Objects encrypted with it become unreadable after restart."
                );
                KeyMaterial::Ephemeral(SensitiveBytes32::generate())
            }
            (None, false) => KeyMaterial::Disabled,
        };

        info!(backend = backend.name(), "Storage service initialized");
        Ok(Self { backend, keys })
    }

    /// Build the service over an already-constructed backend, for
    /// embedding and tests that need a custom backend.
    pub fn with_backend(
        backend: Arc<dyn StorageBackend>,
        encryption_key: Option<SensitiveBytes32>,
    ) -> Self {
        let keys = match encryption_key {
            Some(key) => KeyMaterial::Configured(key),
            None => KeyMaterial::Disabled,
        };
        Self { backend, keys }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn encryption_key(&self) -> Result<&SensitiveBytes32> {
        match &self.keys {
            KeyMaterial::Configured(key) | KeyMaterial::Ephemeral(key) => Ok(key),
            KeyMaterial::Disabled => Err(StorageError::Configuration(
                "no encryption key configured; supply one or explicitly allow \
                 an ephemeral development key"
                    .into(),
            )),
        }
    }

    // ── Object operations ──

    /// Store an object, optionally sealing it into an encryption
    /// envelope. Metadata records the original content type and size
    /// so reads can restore them.
    pub async fn put_object(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        encrypt: bool,
    ) -> Result<UploadResult> {
        let plaintext_size = data.len() as u64;

        if encrypt {
            let sealed = envelope::encode(data, self.encryption_key()?)?;
            let metadata = ObjectMetadata {
                content_type: Some(ENVELOPE_CONTENT_TYPE.to_string()),
                size: sealed.len() as u64,
                encrypted: true,
                original_content_type: Some(content_type.to_string()),
                original_size: Some(plaintext_size),
            };
            self.backend
                .put(key, &sealed, ENVELOPE_CONTENT_TYPE, &metadata)
                .await?;
        } else {
            let metadata = ObjectMetadata {
                content_type: Some(content_type.to_string()),
                size: plaintext_size,
                ..Default::default()
            };
            self.backend.put(key, data, content_type, &metadata).await?;
        }

        Ok(UploadResult {
            key: key.to_string(),
            public_url: self.backend.public_url(key),
            size: plaintext_size,
        })
    }

    /// Fetch an object. Runs the envelope codec only when metadata says
    /// the payload is encrypted; plaintext bodies stay streamable.
    pub async fn get_object(&self, key: &str) -> Result<ObjectDownload> {
        let stored = self.backend.get(key).await?;

        if stored.metadata.encrypted {
            // Decryption needs the whole envelope in memory.
            let sealed = stored.body.into_bytes().await?;
            let plaintext = envelope::decode(&sealed, self.encryption_key()?)?;
            let size = plaintext.len() as u64;
            Ok(ObjectDownload {
                body: ObjectBody::from(plaintext),
                content_type: stored.metadata.original_content_type,
                size,
            })
        } else {
            let size = stored
                .body
                .len_hint()
                .unwrap_or(stored.metadata.size);
            Ok(ObjectDownload {
                body: stored.body,
                content_type: stored.metadata.content_type,
                size,
            })
        }
    }

    /// Idempotent delete: removing a missing object is success.
    pub async fn delete_object(&self, key: &str) -> Result<()> {
        self.backend.delete(key).await
    }

    pub async fn object_exists(&self, key: &str) -> Result<bool> {
        self.backend.exists(key).await
    }

    /// Stable public URL for an object; shape is backend-specific.
    pub fn resolve_public_url(&self, key: &str) -> String {
        self.backend.public_url(key)
    }

    /// Time-limited signed GET URL. Fails with
    /// [`StorageError::Unsupported`] on backends without signing.
    pub async fn issue_signed_url(&self, key: &str, ttl_secs: u64) -> Result<String> {
        self.backend
            .presign_get(key, Duration::from_secs(ttl_secs))
            .await
    }

    // ── Folder emulation ──

    /// Create a folder. Real directory on the local backend; a no-op on
    /// flat namespaces, where folders materialize with the first write.
    pub async fn create_folder(&self, prefix: &str) -> Result<()> {
        self.backend.create_dir(prefix).await
    }

    /// List immediate subfolder names under a prefix.
    pub async fn list_subfolders(&self, prefix: &str) -> Result<Vec<String>> {
        self.backend.list_dirs(prefix).await
    }

    /// Move every object under `old_prefix` to the corresponding key
    /// under `new_prefix`.
    ///
    /// The full listing is materialized before any mutation, then all
    /// copies run, then all deletes. On a copy failure the rename stops:
    /// already-copied objects stay at the new prefix, nothing has been
    /// deleted, and the error reports how far the rename got. There is
    /// deliberately no automatic rollback; a compensating cleanup could
    /// itself fail and mask the original error.
    pub async fn rename_folder(&self, old_prefix: &str, new_prefix: &str) -> Result<()> {
        let old_base = normalize_prefix(old_prefix);
        let new_base = normalize_prefix(new_prefix);

        let keys = self.backend.list(&old_base).await?;
        let moves: Vec<(String, String)> = keys
            .iter()
            .filter_map(|key| {
                paths::relative_to_prefix(key, &old_base)
                    .map(|suffix| (key.clone(), format!("{new_base}{suffix}")))
            })
            .collect();
        let total = moves.len();

        for (copied, (src, dst)) in moves.iter().enumerate() {
            if let Err(e) = self.backend.copy(src, dst).await {
                warn!(
                    old_prefix,
                    new_prefix,
                    copied,
                    total,
                    "Folder rename aborted mid-copy"
                );
                return Err(StorageError::RenameIncomplete {
                    copied,
                    total,
                    source: Box::new(e),
                });
            }
        }

        for (src, _) in &moves {
            self.backend.delete(src).await?;
        }

        info!(old_prefix, new_prefix, objects = total, "Renamed folder");
        Ok(())
    }

    /// Delete every object under a prefix. An empty listing is a no-op,
    /// not an error.
    pub async fn delete_folder_recursively(&self, prefix: &str) -> Result<()> {
        let keys = self.backend.list(&normalize_prefix(prefix)).await?;
        let count = keys.len();
        for key in &keys {
            self.backend.delete(key).await?;
        }
        info!(prefix, objects = count, "Deleted folder recursively");
        Ok(())
    }
}

/// Folder prefixes always address a whole subtree: a trailing `/` keeps
/// `old/a` from also matching `old/ab.txt` on prefix-listing backends.
fn normalize_prefix(prefix: &str) -> String {
    format!("{}/", prefix.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn local_service(dir: &TempDir, key: Option<SensitiveBytes32>) -> StorageService {
        let mut config = StorageConfig::new(BackendKind::Local {
            root: dir.path().to_path_buf(),
        });
        config.encryption_key = key;
        StorageService::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_encrypted_put_without_key_fails() {
        let dir = TempDir::new().unwrap();
        let service = local_service(&dir, None);

        let err = service
            .put_object("k", b"secret", "text/plain", true)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));

        // Plaintext writes are unaffected.
        service
            .put_object("k", b"public", "text/plain", false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_ephemeral_key_opt_in_roundtrip() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig::new(BackendKind::Local {
            root: dir.path().to_path_buf(),
        })
        .with_ephemeral_key_allowed();
        let service = StorageService::new(config).unwrap();

        let result = service
            .put_object("k", b"secret", "text/plain", true)
            .await
            .unwrap();
        assert_eq!(result.size, 6);

        let download = service.get_object("k").await.unwrap();
        assert_eq!(download.body.into_bytes().await.unwrap().as_ref(), b"secret");
    }

    #[tokio::test]
    async fn test_upload_result_reports_plaintext_size() {
        let dir = TempDir::new().unwrap();
        let service = local_service(&dir, Some(SensitiveBytes32::new([7; 32])));

        let result = service
            .put_object("a/b.txt", b"hello world", "text/plain", true)
            .await
            .unwrap();
        assert_eq!(result.size, 11);
        assert_eq!(result.public_url, "/storage/a/b.txt");

        // The stored payload is the larger, opaque envelope.
        let raw = std::fs::read(dir.path().join("a/b.txt")).unwrap();
        assert_eq!(raw.len(), 11 + envelope::HEADER_LEN);
        assert_ne!(&raw[..], b"hello world");
    }

    #[test]
    fn test_normalize_prefix() {
        assert_eq!(normalize_prefix("old/a"), "old/a/");
        assert_eq!(normalize_prefix("old/a/"), "old/a/");
    }
}
