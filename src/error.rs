use thiserror::Error;

/// Error taxonomy for the storage layer.
///
/// Callers always receive the specific kind, never a collapsed generic
/// failure, so they can decide how to react (`NotFound` on delete is
/// success, `NotFound` on get is not).
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("Decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("Operation `{operation}` is not supported by the {backend} backend")]
    Unsupported {
        backend: &'static str,
        operation: &'static str,
    },

    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Folder rename aborted mid-copy. Already-copied objects remain at the
    /// new prefix, nothing has been deleted, and the counts tell the caller
    /// how far the rename got. No rollback is attempted.
    #[error("Folder rename incomplete: copied {copied} of {total} objects: {source}")]
    RenameIncomplete {
        copied: usize,
        total: usize,
        #[source]
        source: Box<StorageError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;
