//! Object-key convention.
//!
//! Keys are the sole addressing mechanism in the storage layer: plain
//! `/`-delimited strings built deterministically from logical
//! identifiers, so repeated writes for the same (entity, category) pair
//! overwrite instead of duplicating. All builders are pure functions.

use uuid::Uuid;

/// Category a note-attached file is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    Notes,
    Typing,
    Audio,
    Pdf,
}

impl FileCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FileCategory::Notes => "notes",
            FileCategory::Typing => "typing",
            FileCategory::Audio => "audio",
            FileCategory::Pdf => "pdf",
        }
    }
}

/// Sanitize a single path segment.
///
/// Keeps ASCII alphanumerics plus `.`, `-`, `_` and `@` (user segments
/// are email addresses); everything else becomes `_`. Never produces a
/// `/`, so a sanitized segment cannot add key depth.
pub fn sanitize_segment(segment: &str) -> String {
    segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '@') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Key for a file attached to a note:
/// `users/<user>/notes/<note_id>/<category>/<file_name>`.
pub fn note_file_key(user: &str, note_id: &str, category: FileCategory, file_name: &str) -> String {
    format!(
        "users/{}/notes/{}/{}/{}",
        sanitize_segment(user),
        sanitize_segment(note_id),
        category.as_str(),
        sanitize_segment(file_name),
    )
}

/// Key for one page of typing data:
/// `users/<user>/notes/<note_id>/typing/<file_id>_<page>.json`.
pub fn typing_page_key(user: &str, note_id: &str, file_id: &str, page: u32) -> String {
    format!(
        "users/{}/notes/{}/typing/{}_{}.json",
        sanitize_segment(user),
        sanitize_segment(note_id),
        sanitize_segment(file_id),
        page,
    )
}

/// Key for one recorded audio chunk of a transcription session:
/// `users/<user>/transcription/<session_id>/audio/chunk_NNNN.<ext>`.
pub fn audio_chunk_key(user: &str, session_id: &str, chunk_index: u32, extension: &str) -> String {
    format!(
        "users/{}/transcription/{}/audio/chunk_{:04}.{}",
        sanitize_segment(user),
        sanitize_segment(session_id),
        chunk_index,
        sanitize_segment(extension),
    )
}

/// Random file name that keeps the original extension, for uploads
/// whose caller-supplied name must not collide.
pub fn unique_file_name(original: &str) -> String {
    match original.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => {
            format!("{}.{}", Uuid::new_v4(), sanitize_segment(ext))
        }
        _ => Uuid::new_v4().to_string(),
    }
}

/// Suffix of `key` relative to `prefix`, or `None` if the key does not
/// live under it. Used when copying a subtree to a new prefix during a
/// folder rename. A trailing `/` on the prefix is tolerated.
pub fn relative_to_prefix<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    let prefix = prefix.trim_end_matches('/');
    key.strip_prefix(prefix)?.strip_prefix('/')
}
