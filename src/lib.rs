//! Encrypted, multi-provider object storage.
//!
//! One facade ([`StorageService`]) over backends with fundamentally
//! different primitives: a real hierarchical filesystem and a flat,
//! prefix-addressed S3-compatible object namespace. The facade applies
//! authenticated encryption around put/get when asked to, and emulates
//! folder semantics (create, rename, recursive delete) on backends that
//! have none by composing list/copy/delete over the flat key space.
//!
//! Backends never interpret object contents; whether a stored payload is
//! an encryption envelope or plaintext is carried in object metadata.

pub mod backend;
pub mod body;
pub mod config;
pub mod crypto;
pub mod error;
pub mod paths;
pub mod service;

pub use backend::{ObjectMetadata, StorageBackend, StoredObject};
pub use body::ObjectBody;
pub use config::{BackendKind, StorageConfig};
pub use error::{Result, StorageError};
pub use service::{ObjectDownload, StorageService, UploadResult};
