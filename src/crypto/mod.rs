//! Envelope encryption for stored objects.
//!
//! Sensitive payloads are sealed with AES-256-GCM into a fixed-layout,
//! self-describing envelope before they reach any storage backend.
//! Key material is opaque 32 bytes supplied by the facade; no key
//! derivation happens in this layer.

pub mod envelope;
pub mod sensitive;

pub use envelope::{decode, encode, HEADER_LEN, IV_LEN, KEY_LEN, TAG_LEN};
pub use sensitive::SensitiveBytes32;
