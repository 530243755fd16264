//! Note lifecycle service.
//!
//! Orchestrates the note aggregate across the repository, the attachment
//! store, and the augmentation provider:
//!
//! - create: embed, then insert the note row and its tag links in one
//!   transaction, then ingest attachments best-effort.
//! - summarize: content below the size threshold is its own summary.
//! - archive: monotonic, archiving twice is a no-op.
//! - delete: one transaction over links, attachment rows, and the note row;
//!   physical files are removed after commit, best-effort.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{self, CreateAttachment, CreateNote, DbPool, NoteField};
use crate::models::{
    dotted_extension, ArchiveOutcome, CreatedNote, DeletedNote, FileCategory, FileUpload, NewNote,
    NoteDetails,
};
use crate::{Error, Result};

use super::{AttachmentStore, Augmentation, ProviderError};

/// Content shorter than this many characters is not sent for summarization.
pub const SUMMARY_MIN_CHARS: usize = 200;

/// Content with fewer words than this is not sent for summarization.
pub const SUMMARY_MIN_WORDS: usize = 50;

/// Whether `content` is large enough to be worth summarizing.
pub fn needs_summary(content: &str) -> bool {
    content.chars().count() >= SUMMARY_MIN_CHARS
        && content.split_whitespace().count() >= SUMMARY_MIN_WORDS
}

/// Limits applied by the note service.
#[derive(Debug, Clone)]
pub struct NoteSettings {
    /// Uploads larger than this are skipped.
    pub max_attachment_size: usize,
    /// Bound on each augmentation provider call.
    pub provider_timeout: Duration,
}

impl Default for NoteSettings {
    fn default() -> Self {
        Self {
            max_attachment_size: 10 * 1024 * 1024,
            provider_timeout: Duration::from_secs(30),
        }
    }
}

/// Service for the note aggregate lifecycle.
#[derive(Clone)]
pub struct NoteService {
    db: DbPool,
    augmentation: Arc<dyn Augmentation>,
    store: Arc<dyn AttachmentStore>,
    settings: NoteSettings,
}

impl NoteService {
    pub fn new(
        db: DbPool,
        augmentation: Arc<dyn Augmentation>,
        store: Arc<dyn AttachmentStore>,
        settings: NoteSettings,
    ) -> Self {
        Self {
            db,
            augmentation,
            store,
            settings,
        }
    }

    /// Create a note with its tag links and attachments.
    pub async fn create(&self, owner_id: i64, input: NewNote) -> Result<CreatedNote> {
        let NewNote {
            title,
            content,
            tag_ids,
            related_ids,
            files,
        } = input;

        if owner_id <= 0 {
            return Err(Error::Validation("owner id must be positive".into()));
        }
        let title = title.trim().to_string();
        if title.is_empty() {
            return Err(Error::Validation("title is required".into()));
        }
        if content.trim().is_empty() {
            return Err(Error::Validation("content is required".into()));
        }

        let tag_ids = dedup(tag_ids);
        let related_ids = dedup(related_ids);

        let foreign = db::find_foreign_tag_ids(&self.db, owner_id, &tag_ids).await?;
        if !foreign.is_empty() {
            return Err(Error::Validation(format!("unknown tag ids: {:?}", foreign)));
        }

        let embedding = self
            .bounded(self.augmentation.embed(&content))
            .await
            .map_err(|e| Error::Augmentation(e.to_string()))?;
        if embedding.is_empty() {
            return Err(Error::Augmentation("provider returned an empty embedding".into()));
        }
        let embedding = encode_embedding(&embedding)?;

        let mut tx = self.db.begin().await?;
        let note = db::create_note_tx(
            &mut tx,
            CreateNote {
                user_id: owner_id,
                title,
                content,
                embedding,
                related_ids,
            },
        )
        .await?;
        for tag_id in &tag_ids {
            db::create_association_tx(&mut tx, note.id, *tag_id).await?;
        }
        tx.commit().await?;

        info!(note_id = note.id, owner_id, tags = tag_ids.len(), "Note created");

        let mut attachments = 0;
        for file in files {
            if self.ingest_attachment(owner_id, note.id, file).await {
                attachments += 1;
            }
        }

        Ok(CreatedNote {
            id: note.id,
            attachments,
        })
    }

    /// Store one upload and record its row. Returns whether it was kept.
    async fn ingest_attachment(&self, owner_id: i64, note_id: i64, file: FileUpload) -> bool {
        let Some(category) = FileCategory::from_filename(&file.filename) else {
            debug!(note_id, filename = %file.filename, "Skipping unsupported attachment type");
            return false;
        };

        if file.size() > self.settings.max_attachment_size {
            warn!(
                note_id,
                filename = %file.filename,
                size = file.size(),
                max_size = self.settings.max_attachment_size,
                "Skipping oversized attachment"
            );
            return false;
        }

        let name = format!(
            "{}_{}{}",
            owner_id,
            Uuid::new_v4().simple(),
            dotted_extension(&file.filename)
        );

        let reference = match self.store.save(&file.data, &name, category).await {
            Ok(reference) => reference,
            Err(e) => {
                warn!(note_id, filename = %file.filename, error = %e, "Failed to save attachment");
                return false;
            }
        };

        let row = CreateAttachment {
            note_id,
            file_url: reference.clone(),
            category,
            file_size: file.size() as i64,
        };
        if let Err(e) = db::create_attachment(&self.db, row).await {
            warn!(note_id, reference = %reference, error = %e, "Failed to record attachment");
            if let Err(e) = self.store.delete(&reference).await {
                warn!(reference = %reference, error = %e, "Failed to remove unrecorded attachment");
            }
            return false;
        }

        debug!(note_id, reference = %reference, category = %category, "Attachment stored");
        true
    }

    /// Fetch one note with tags and attachments.
    pub async fn get(&self, owner_id: i64, note_id: i64) -> Result<NoteDetails> {
        db::get_note_details(&self.db, owner_id, note_id).await
    }

    /// List every note of an owner with tags and attachments.
    pub async fn list(&self, owner_id: i64) -> Result<Vec<NoteDetails>> {
        db::list_note_details(&self.db, owner_id).await
    }

    /// Compute, persist, and return the note's summary.
    pub async fn summarize(&self, owner_id: i64, note_id: i64) -> Result<String> {
        let note = db::find_note(&self.db, owner_id, note_id).await?;

        let summary = if needs_summary(&note.content) {
            self.bounded(self.augmentation.summarize(&note.content))
                .await
                .map_err(|e| Error::Summarization(e.to_string()))?
        } else {
            debug!(note_id, "Content below summary threshold, using it verbatim");
            note.content.clone()
        };

        db::update_note_field(&self.db, note.id, NoteField::Summary(summary.clone())).await?;
        info!(note_id, owner_id, "Note summarized");

        Ok(summary)
    }

    /// Archive a note. Archiving an archived note changes nothing.
    pub async fn archive(&self, owner_id: i64, note_id: i64) -> Result<ArchiveOutcome> {
        let note = db::find_note(&self.db, owner_id, note_id).await?;
        if note.is_archived {
            return Ok(ArchiveOutcome::AlreadyArchived);
        }

        db::update_note_field(&self.db, note.id, NoteField::Archived(true)).await?;
        info!(note_id, owner_id, "Note archived");

        Ok(ArchiveOutcome::Archived)
    }

    /// Delete a note and everything it owns.
    pub async fn delete(&self, owner_id: i64, note_id: i64) -> Result<DeletedNote> {
        let mut tx = self.db.begin().await?;

        db::lock_note_tx(&mut tx, owner_id, note_id).await?;
        let attachments = db::list_note_attachments_tx(&mut tx, note_id).await?;

        let associations = db::delete_associations_by_note_tx(&mut tx, note_id).await?;
        let attachment_rows = db::delete_note_attachments_tx(&mut tx, note_id).await?;
        db::delete_note_tx(&mut tx, note_id).await?;
        tx.commit().await?;

        let mut orphaned_files = 0;
        for attachment in &attachments {
            if let Err(e) = self.store.delete(&attachment.file_url).await {
                warn!(
                    note_id,
                    reference = %attachment.file_url,
                    error = %e,
                    "Failed to remove attachment file"
                );
                orphaned_files += 1;
            }
        }

        info!(
            note_id,
            owner_id,
            associations,
            attachments = attachment_rows,
            "Note deleted"
        );

        Ok(DeletedNote {
            associations,
            attachments: attachment_rows,
            orphaned_files,
        })
    }

    /// Bound a provider call by the configured timeout.
    async fn bounded<T, F>(&self, call: F) -> std::result::Result<T, ProviderError>
    where
        F: Future<Output = std::result::Result<T, ProviderError>>,
    {
        let limit = self.settings.provider_timeout;
        tokio::time::timeout(limit, call)
            .await
            .unwrap_or(Err(ProviderError::Timeout(limit)))
    }
}

/// Serialize an embedding to its stored form, a JSON array of floats.
pub(crate) fn encode_embedding(embedding: &[f32]) -> Result<Vec<u8>> {
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(Error::Serialization("embedding contains non-finite values".into()));
    }
    serde_json::to_vec(embedding).map_err(|e| Error::Serialization(e.to_string()))
}

/// Remove duplicates, keeping first occurrences in order.
fn dedup(ids: Vec<i64>) -> Vec<i64> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}
