//! Storage configuration.
//!
//! Built once at process start and never mutated; switching backends
//! means building a new configuration, not flipping state at runtime.
//! Validation is eager: malformed key material or missing credentials
//! fail here, not at first use.

use std::path::PathBuf;

use crate::backend::s3::S3Config;
use crate::crypto::sensitive::SensitiveBytes32;
use crate::error::{Result, StorageError};

/// Which backend a process runs against. Exactly one is active.
#[derive(Clone)]
pub enum BackendKind {
    /// Local directory tree, for development and single-node setups.
    Local { root: PathBuf },
    /// S3-compatible object store (AWS, MinIO, any gateway).
    S3(S3Config),
    /// Placeholder; selecting it fails at construction.
    Gcs,
    /// Placeholder; selecting it fails at construction.
    Azure,
}

/// Immutable storage-layer configuration.
pub struct StorageConfig {
    pub backend: BackendKind,
    /// 32-byte AES-256-GCM key for payload encryption, if configured.
    pub encryption_key: Option<SensitiveBytes32>,
    /// Explicit opt-in to a process-lifetime random key when no key is
    /// configured. Development only: a restart makes every object
    /// encrypted under the ephemeral key undecryptable.
    pub allow_ephemeral_key: bool,
}

impl StorageConfig {
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            encryption_key: None,
            allow_ephemeral_key: false,
        }
    }

    pub fn with_encryption_key(mut self, key: SensitiveBytes32) -> Self {
        self.encryption_key = Some(key);
        self
    }

    pub fn with_ephemeral_key_allowed(mut self) -> Self {
        self.allow_ephemeral_key = true;
        self
    }

    /// Read configuration from `STORAGE_*` environment variables.
    ///
    /// `STORAGE_BACKEND` selects `local` (default), `s3`, `gcs` or
    /// `azure`. The S3 backend additionally reads `STORAGE_BUCKET`,
    /// `STORAGE_REGION`, `STORAGE_ENDPOINT`, `STORAGE_ACCESS_KEY`,
    /// `STORAGE_SECRET_KEY` and `STORAGE_PUBLIC_URL`. Key material
    /// comes from `STORAGE_ENCRYPTION_KEY` (64 hex chars), and
    /// `STORAGE_ALLOW_EPHEMERAL_KEY=true` opts into the development
    /// fallback.
    pub fn from_env() -> Result<Self> {
        let kind = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".to_string());

        let backend = match kind.as_str() {
            "local" => BackendKind::Local {
                root: std::env::var("STORAGE_LOCAL_ROOT")
                    .unwrap_or_else(|_| "./storage".to_string())
                    .into(),
            },
            "s3" => {
                let endpoint = std::env::var("STORAGE_ENDPOINT").ok();
                // Path-style addressing is what MinIO-style gateways
                // need; AWS proper uses virtual-hosted buckets.
                let force_path_style = match std::env::var("STORAGE_FORCE_PATH_STYLE") {
                    Ok(v) => v == "true" || v == "1",
                    Err(_) => endpoint.is_some(),
                };
                BackendKind::S3(S3Config {
                    endpoint,
                    region: std::env::var("STORAGE_REGION")
                        .unwrap_or_else(|_| "us-east-1".to_string()),
                    bucket: std::env::var("STORAGE_BUCKET").unwrap_or_default(),
                    access_key_id: std::env::var("STORAGE_ACCESS_KEY").unwrap_or_default(),
                    secret_access_key: std::env::var("STORAGE_SECRET_KEY").unwrap_or_default(),
                    public_base_url: std::env::var("STORAGE_PUBLIC_URL").ok(),
                    force_path_style,
                })
            }
            "gcs" => BackendKind::Gcs,
            "azure" => BackendKind::Azure,
            other => {
                return Err(StorageError::Configuration(format!(
                    "unknown storage backend `{other}`"
                )))
            }
        };

        let encryption_key = match std::env::var("STORAGE_ENCRYPTION_KEY") {
            Ok(hex_key) => Some(parse_encryption_key(&hex_key)?),
            Err(_) => None,
        };
        let allow_ephemeral_key = std::env::var("STORAGE_ALLOW_EPHEMERAL_KEY")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let config = Self {
            backend,
            encryption_key,
            allow_ephemeral_key,
        };
        config.validate()?;
        Ok(config)
    }

    /// Eager validation, run at startup.
    pub fn validate(&self) -> Result<()> {
        match &self.backend {
            BackendKind::Local { root } => {
                if root.as_os_str().is_empty() {
                    return Err(StorageError::Configuration(
                        "local backend requires a base directory".into(),
                    ));
                }
            }
            BackendKind::S3(s3) => {
                if s3.bucket.is_empty() {
                    return Err(StorageError::Configuration(
                        "s3 backend requires a bucket name".into(),
                    ));
                }
                if s3.access_key_id.is_empty() || s3.secret_access_key.is_empty() {
                    return Err(StorageError::Configuration(
                        "s3 backend requires access credentials".into(),
                    ));
                }
            }
            BackendKind::Gcs => {
                return Err(StorageError::Configuration(
                    "the gcs backend is not implemented".into(),
                ));
            }
            BackendKind::Azure => {
                return Err(StorageError::Configuration(
                    "the azure backend is not implemented".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Parse hex-encoded 32-byte key material.
pub fn parse_encryption_key(hex_key: &str) -> Result<SensitiveBytes32> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| StorageError::Configuration(format!("encryption key is not valid hex: {e}")))?;
    SensitiveBytes32::from_slice(&bytes).ok_or_else(|| {
        StorageError::Configuration(format!(
            "encryption key must be 32 bytes (64 hex chars), got {} bytes",
            bytes.len()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_encryption_key() {
        let key = parse_encryption_key(&"ab".repeat(32)).unwrap();
        assert_eq!(key.as_bytes(), &[0xAB; 32]);

        assert!(matches!(
            parse_encryption_key("not hex at all"),
            Err(StorageError::Configuration(_))
        ));
        assert!(matches!(
            parse_encryption_key(&"ab".repeat(16)),
            Err(StorageError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_rejects_placeholder_backends() {
        assert!(StorageConfig::new(BackendKind::Gcs).validate().is_err());
        assert!(StorageConfig::new(BackendKind::Azure).validate().is_err());
    }

    #[test]
    fn test_validate_requires_s3_credentials() {
        let config = StorageConfig::new(BackendKind::S3(crate::backend::s3::S3Config {
            endpoint: None,
            region: "us-east-1".into(),
            bucket: "b".into(),
            access_key_id: String::new(),
            secret_access_key: String::new(),
            public_base_url: None,
            force_path_style: false,
        }));
        assert!(matches!(
            config.validate(),
            Err(StorageError::Configuration(_))
        ));
    }

    #[test]
    fn test_validate_accepts_local() {
        let config = StorageConfig::new(BackendKind::Local {
            root: "./storage".into(),
        });
        assert!(config.validate().is_ok());
    }
}
