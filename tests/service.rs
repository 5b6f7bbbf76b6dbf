//! End-to-end facade behavior over the local backend: encryption
//! round-trips, folder emulation, and partial-failure semantics.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use objvault::backend::{LocalBackend, ObjectMetadata, StorageBackend, StoredObject};
use objvault::config::{BackendKind, StorageConfig};
use objvault::crypto::sensitive::SensitiveBytes32;
use objvault::{StorageError, StorageService};

fn service(dir: &TempDir) -> StorageService {
    let config = StorageConfig::new(BackendKind::Local {
        root: dir.path().to_path_buf(),
    })
    .with_encryption_key(SensitiveBytes32::new([0x11; 32]));
    StorageService::new(config).unwrap()
}

#[tokio::test]
async fn plaintext_put_get_roundtrip() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);

    let result = svc
        .put_object("docs/readme.md", b"# hello", "text/markdown", false)
        .await
        .unwrap();
    assert_eq!(result.size, 7);
    assert_eq!(result.key, "docs/readme.md");

    let download = svc.get_object("docs/readme.md").await.unwrap();
    assert_eq!(download.content_type.as_deref(), Some("text/markdown"));
    assert_eq!(download.size, 7);
    assert_eq!(download.body.into_bytes().await.unwrap().as_ref(), b"# hello");
}

#[tokio::test]
async fn encrypted_roundtrip_restores_content_type() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);

    svc.put_object("k", b"hello world", "text/plain", true)
        .await
        .unwrap();

    // Physical payload is the opaque envelope, larger than the input.
    let raw = std::fs::read(dir.path().join("k")).unwrap();
    assert_eq!(raw.len(), 11 + 28);
    assert_ne!(&raw[..], b"hello world");

    let download = svc.get_object("k").await.unwrap();
    assert_eq!(download.content_type.as_deref(), Some("text/plain"));
    assert_eq!(download.size, 11);
    assert_eq!(
        download.body.into_bytes().await.unwrap().as_ref(),
        b"hello world"
    );
}

#[tokio::test]
async fn get_missing_object_is_not_found() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);

    // `matches!` on the whole Result: ObjectDownload carries a stream
    // body and has no Debug, so unwrap_err() is unavailable here.
    assert!(matches!(
        svc.get_object("nope/missing.txt").await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn delete_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);

    svc.delete_object("never/existed.txt").await.unwrap();

    svc.put_object("twice.txt", b"x", "text/plain", false)
        .await
        .unwrap();
    svc.delete_object("twice.txt").await.unwrap();
    svc.delete_object("twice.txt").await.unwrap();
    assert!(!svc.object_exists("twice.txt").await.unwrap());
}

#[tokio::test]
async fn rename_folder_moves_whole_subtree() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);

    svc.put_object("old/a/x.txt", b"abcd", "text/plain", false)
        .await
        .unwrap();
    svc.put_object("old/a/sub/y.txt", b"wxyz", "text/plain", false)
        .await
        .unwrap();

    svc.rename_folder("old/a", "new/a").await.unwrap();

    assert!(!svc.object_exists("old/a/x.txt").await.unwrap());
    assert!(!svc.object_exists("old/a/sub/y.txt").await.unwrap());
    assert!(svc.object_exists("new/a/x.txt").await.unwrap());
    assert!(svc.object_exists("new/a/sub/y.txt").await.unwrap());

    let x = svc.get_object("new/a/x.txt").await.unwrap();
    assert_eq!(x.body.into_bytes().await.unwrap().as_ref(), b"abcd");
    let y = svc.get_object("new/a/sub/y.txt").await.unwrap();
    assert_eq!(y.body.into_bytes().await.unwrap().as_ref(), b"wxyz");
}

#[tokio::test]
async fn rename_folder_leaves_prefix_siblings_alone() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);

    svc.put_object("old/a/x.txt", b"move me", "text/plain", false)
        .await
        .unwrap();
    svc.put_object("old/ab.txt", b"sibling", "text/plain", false)
        .await
        .unwrap();

    svc.rename_folder("old/a", "new/a").await.unwrap();

    assert!(svc.object_exists("old/ab.txt").await.unwrap());
    assert!(!svc.object_exists("new/ab.txt").await.unwrap());
}

#[tokio::test]
async fn rename_folder_keeps_encrypted_objects_decryptable() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);

    svc.put_object("old/s/secret.txt", b"classified", "text/plain", true)
        .await
        .unwrap();
    svc.rename_folder("old/s", "new/s").await.unwrap();

    let download = svc.get_object("new/s/secret.txt").await.unwrap();
    assert_eq!(download.content_type.as_deref(), Some("text/plain"));
    assert_eq!(
        download.body.into_bytes().await.unwrap().as_ref(),
        b"classified"
    );
}

#[tokio::test]
async fn delete_folder_recursively_removes_everything() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);

    svc.put_object("recursive/file1.txt", b"1", "text/plain", false)
        .await
        .unwrap();
    svc.put_object("recursive/sub/file2.txt", b"2", "text/plain", false)
        .await
        .unwrap();

    svc.delete_folder_recursively("recursive").await.unwrap();

    assert!(!svc.object_exists("recursive/file1.txt").await.unwrap());
    assert!(!svc.object_exists("recursive/sub/file2.txt").await.unwrap());
}

#[tokio::test]
async fn delete_folder_on_empty_prefix_is_a_noop() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);
    svc.delete_folder_recursively("nonexistent").await.unwrap();
}

#[tokio::test]
async fn list_by_prefix_on_missing_prefix_is_empty() {
    let dir = TempDir::new().unwrap();
    let backend = LocalBackend::new(dir.path());
    assert!(backend.list("nonexistent/").await.unwrap().is_empty());
}

#[tokio::test]
async fn list_subfolders_one_level() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);

    svc.create_folder("users/u1/notes").await.unwrap();
    svc.put_object("users/u1/notes/n1/pdf/a.pdf", b"p", "application/pdf", false)
        .await
        .unwrap();
    svc.put_object("users/u1/notes/n2/pdf/b.pdf", b"p", "application/pdf", false)
        .await
        .unwrap();

    let subfolders = svc.list_subfolders("users/u1/notes").await.unwrap();
    assert_eq!(subfolders, vec!["n1", "n2"]);
}

#[tokio::test]
async fn local_public_url_shape() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);
    assert_eq!(svc.resolve_public_url("a/b.txt"), "/storage/a/b.txt");
}

#[tokio::test]
async fn signed_urls_unsupported_on_local() {
    let dir = TempDir::new().unwrap();
    let svc = service(&dir);

    let err = svc.issue_signed_url("a/b.txt", 3600).await.unwrap_err();
    assert!(matches!(
        err,
        StorageError::Unsupported {
            backend: "local",
            operation: "presign_get"
        }
    ));
}

// ── Partial-failure semantics ──

/// Wraps the local backend and fails `copy` for one destination key,
/// to exercise the mid-rename abort path.
struct FailingCopyBackend {
    inner: LocalBackend,
    fail_on_dst: String,
}

#[async_trait]
impl StorageBackend for FailingCopyBackend {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
        metadata: &ObjectMetadata,
    ) -> objvault::Result<()> {
        self.inner.put(key, data, content_type, metadata).await
    }

    async fn get(&self, key: &str) -> objvault::Result<StoredObject> {
        self.inner.get(key).await
    }

    async fn stat(&self, key: &str) -> objvault::Result<ObjectMetadata> {
        self.inner.stat(key).await
    }

    async fn delete(&self, key: &str) -> objvault::Result<()> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> objvault::Result<bool> {
        self.inner.exists(key).await
    }

    async fn list(&self, prefix: &str) -> objvault::Result<Vec<String>> {
        self.inner.list(prefix).await
    }

    async fn list_dirs(&self, prefix: &str) -> objvault::Result<Vec<String>> {
        self.inner.list_dirs(prefix).await
    }

    async fn copy(&self, src_key: &str, dst_key: &str) -> objvault::Result<()> {
        if dst_key == self.fail_on_dst {
            return Err(StorageError::Unavailable("injected copy failure".into()));
        }
        self.inner.copy(src_key, dst_key).await
    }

    async fn create_dir(&self, prefix: &str) -> objvault::Result<()> {
        self.inner.create_dir(prefix).await
    }

    fn public_url(&self, key: &str) -> String {
        self.inner.public_url(key)
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> objvault::Result<String> {
        self.inner.presign_get(key, ttl).await
    }
}

#[tokio::test]
async fn rename_aborts_mid_copy_without_deleting_sources() {
    let dir = TempDir::new().unwrap();
    let backend = Arc::new(FailingCopyBackend {
        inner: LocalBackend::new(dir.path()),
        fail_on_dst: "new/a/b.txt".to_string(),
    });
    let svc = StorageService::with_backend(backend, None);

    // Local listings are sorted, so the copy order is a, b, c.
    svc.put_object("old/a/a.txt", b"1", "text/plain", false)
        .await
        .unwrap();
    svc.put_object("old/a/b.txt", b"2", "text/plain", false)
        .await
        .unwrap();
    svc.put_object("old/a/c.txt", b"3", "text/plain", false)
        .await
        .unwrap();

    let err = svc.rename_folder("old/a", "new/a").await.unwrap_err();
    match err {
        StorageError::RenameIncomplete { copied, total, .. } => {
            assert_eq!(copied, 1);
            assert_eq!(total, 3);
        }
        other => panic!("expected RenameIncomplete, got {other}"),
    }

    // All sources intact, the one successful copy remains, and the
    // never-attempted object was not copied.
    for key in ["old/a/a.txt", "old/a/b.txt", "old/a/c.txt"] {
        assert!(svc.object_exists(key).await.unwrap(), "{key} must remain");
    }
    assert!(svc.object_exists("new/a/a.txt").await.unwrap());
    assert!(!svc.object_exists("new/a/c.txt").await.unwrap());
}
