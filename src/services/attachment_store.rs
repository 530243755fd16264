//! Attachment store backends.
//!
//! An attachment store persists a file under a category and hands back an
//! opaque public reference. The reference is the only thing recorded in the
//! attachment row; `delete` accepts it back.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::models::FileCategory;
use crate::{Error, Result};

/// Directory (and URL segment) under which attachments live.
const ATTACHMENTS_DIR: &str = "attachments";

/// Capability interface for attachment file storage.
#[async_trait]
pub trait AttachmentStore: Send + Sync {
    /// Store `data` as `name` under `category`; returns the public reference.
    async fn save(&self, data: &[u8], name: &str, category: FileCategory) -> Result<String>;

    /// Remove a previously stored file by its reference.
    async fn delete(&self, reference: &str) -> Result<()>;
}

/// Reject anything that is not a single plain path component.
fn validate_name(name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if invalid {
        return Err(Error::Storage(format!("Invalid attachment name: {:?}", name)));
    }
    Ok(())
}

// ============================================================================
// Local filesystem
// ============================================================================

/// Filesystem-backed store.
///
/// Layout: `{base_path}/attachments/{category}/{name}`, published as
/// `{public_url}/attachments/{category}/{name}`.
pub struct LocalAttachmentStore {
    base_path: PathBuf,
    public_url: String,
}

impl LocalAttachmentStore {
    pub fn new(base_path: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        let public_url: String = public_url.into();
        Self {
            base_path: base_path.into(),
            public_url: public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Root directory served at `/attachments`.
    pub fn attachments_root(&self) -> PathBuf {
        self.base_path.join(ATTACHMENTS_DIR)
    }

    fn file_path(&self, category: FileCategory, name: &str) -> PathBuf {
        self.attachments_root().join(category.as_str()).join(name)
    }

    /// Resolve a public reference back to a file path inside the store.
    fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let prefix = format!("{}/{}/", self.public_url, ATTACHMENTS_DIR);
        let rest = reference
            .strip_prefix(&prefix)
            .ok_or_else(|| Error::Storage(format!("Reference outside attachment store: {}", reference)))?;

        let (category, name) = rest
            .split_once('/')
            .ok_or_else(|| Error::Storage(format!("Malformed attachment reference: {}", reference)))?;
        let category: FileCategory = category.parse().map_err(Error::Storage)?;
        validate_name(name)?;

        Ok(self.file_path(category, name))
    }
}

#[async_trait]
impl AttachmentStore for LocalAttachmentStore {
    async fn save(&self, data: &[u8], name: &str, category: FileCategory) -> Result<String> {
        validate_name(name)?;
        let full_path = self.file_path(category, name);
        debug!(path = %full_path.display(), size = data.len(), "attachment_store: write");

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to a temp file and rename so readers never see partial files
        let temp_path = full_path.with_extension("part");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = fs::rename(&temp_path, &full_path).await {
            warn!(from = %temp_path.display(), error = %e, "attachment_store: rename failed");
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(format!(
            "{}/{}/{}/{}",
            self.public_url, ATTACHMENTS_DIR, category, name
        ))
    }

    async fn delete(&self, reference: &str) -> Result<()> {
        let full_path = self.resolve(reference)?;
        debug!(path = %full_path.display(), "attachment_store: delete");

        if fs::try_exists(&full_path).await? {
            fs::remove_file(full_path).await?;
        }
        Ok(())
    }
}

// ============================================================================
// In-memory
// ============================================================================

/// In-process store keyed by reference, with switchable failures.
#[derive(Default)]
pub struct MemoryAttachmentStore {
    files: RwLock<HashMap<String, Vec<u8>>>,
    fail_saves: AtomicBool,
    fail_deletes: AtomicBool,
    save_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryAttachmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `save` fail.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `delete` fail.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    pub async fn contains(&self, reference: &str) -> bool {
        self.files.read().await.contains_key(reference)
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }
}

#[async_trait]
impl AttachmentStore for MemoryAttachmentStore {
    async fn save(&self, data: &[u8], name: &str, category: FileCategory) -> Result<String> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        validate_name(name)?;
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Storage("injected save failure".into()));
        }

        let reference = format!("memory://{}/{}/{}", ATTACHMENTS_DIR, category, name);
        self.files
            .write()
            .await
            .insert(reference.clone(), data.to_vec());
        Ok(reference)
    }

    async fn delete(&self, reference: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(Error::Storage("injected delete failure".into()));
        }

        self.files.write().await.remove(reference);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn local_store() -> (TempDir, LocalAttachmentStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalAttachmentStore::new(dir.path(), "http://localhost:8080/");
        (dir, store)
    }

    #[tokio::test]
    async fn test_local_save_and_delete() {
        let (dir, store) = local_store();

        let reference = store
            .save(b"png bytes", "1_abc.png", FileCategory::Image)
            .await
            .unwrap();
        assert_eq!(
            reference,
            "http://localhost:8080/attachments/image/1_abc.png"
        );

        let path = dir.path().join("attachments/image/1_abc.png");
        assert_eq!(std::fs::read(&path).unwrap(), b"png bytes");

        store.delete(&reference).await.unwrap();
        assert!(!path.exists());

        // Deleting again is a no-op
        store.delete(&reference).await.unwrap();
    }

    #[tokio::test]
    async fn test_local_rejects_foreign_references() {
        let (_dir, store) = local_store();

        for reference in [
            "http://elsewhere/attachments/image/x.png",
            "http://localhost:8080/attachments/image/../../etc/passwd",
            "http://localhost:8080/attachments/secrets/x.png",
            "http://localhost:8080/attachments/x.png",
        ] {
            let err = store.delete(reference).await.unwrap_err();
            assert!(matches!(err, Error::Storage(_)), "{}", reference);
        }
    }

    #[tokio::test]
    async fn test_local_rejects_path_names() {
        let (_dir, store) = local_store();
        let err = store
            .save(b"x", "../escape.pdf", FileCategory::Document)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[tokio::test]
    async fn test_memory_store_failures() {
        let store = MemoryAttachmentStore::new();
        let reference = store
            .save(b"ogg", "2_x.ogg", FileCategory::Audio)
            .await
            .unwrap();
        assert!(store.contains(&reference).await);

        store.fail_deletes(true);
        assert!(store.delete(&reference).await.is_err());
        assert!(store.contains(&reference).await);

        store.fail_saves(true);
        assert!(store.save(b"x", "3_y.pdf", FileCategory::Document).await.is_err());
        assert_eq!(store.save_calls(), 2);
        assert_eq!(store.delete_calls(), 1);
        assert_eq!(store.len().await, 1);
    }
}
