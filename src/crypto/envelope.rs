//! AES-256-GCM envelope codec.
//!
//! Wire format, fixed order: `IV(12) || AUTH_TAG(16) || CIPHERTEXT(N)`.
//! The envelope is self-describing: decoding needs nothing beyond the
//! buffer and the 32-byte key. Decoding fails closed on truncated input
//! or tag mismatch; corrupted data is never passed through.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;

use crate::crypto::sensitive::SensitiveBytes32;
use crate::error::{Result, StorageError};

pub const IV_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const KEY_LEN: usize = 32;
/// Minimum envelope length: IV plus tag, with empty ciphertext.
pub const HEADER_LEN: usize = IV_LEN + TAG_LEN;

/// Seal plaintext into an envelope.
///
/// A fresh random IV is generated per call, so sealing identical
/// plaintext twice yields different envelopes that both decode back
/// to the same bytes.
pub fn encode(plaintext: &[u8], key: &SensitiveBytes32) -> Result<Vec<u8>> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| StorageError::Encryption(e.to_string()))?;

    let mut iv = [0u8; IV_LEN];
    rand::rngs::OsRng.fill_bytes(&mut iv);
    let nonce = Nonce::from_slice(&iv);

    // RustCrypto appends the tag to the ciphertext; the envelope wants
    // it up front, right after the IV.
    let sealed = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| StorageError::Encryption(e.to_string()))?;
    let split = sealed.len() - TAG_LEN;

    let mut envelope = Vec::with_capacity(HEADER_LEN + split);
    envelope.extend_from_slice(&iv);
    envelope.extend_from_slice(&sealed[split..]);
    envelope.extend_from_slice(&sealed[..split]);
    Ok(envelope)
}

/// Open an envelope, recovering the plaintext.
///
/// Fails with [`StorageError::DecryptionFailed`] if the buffer is
/// shorter than [`HEADER_LEN`] or the authentication tag does not
/// verify.
pub fn decode(envelope: &[u8], key: &SensitiveBytes32) -> Result<Vec<u8>> {
    if envelope.len() < HEADER_LEN {
        return Err(StorageError::DecryptionFailed(format!(
            "envelope too short: {} bytes, need at least {HEADER_LEN}",
            envelope.len()
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| StorageError::DecryptionFailed(e.to_string()))?;

    let iv = &envelope[..IV_LEN];
    let tag = &envelope[IV_LEN..HEADER_LEN];
    let ciphertext = &envelope[HEADER_LEN..];

    let mut sealed = Vec::with_capacity(ciphertext.len() + TAG_LEN);
    sealed.extend_from_slice(ciphertext);
    sealed.extend_from_slice(tag);

    cipher
        .decrypt(Nonce::from_slice(iv), sealed.as_slice())
        .map_err(|_| StorageError::DecryptionFailed("authentication tag mismatch".into()))
}
