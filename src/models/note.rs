//! Note aggregate records.

use serde::Serialize;

use crate::db::{Attachment, Note, Tag};

use super::FileUpload;

/// Input for the create-note workflow.
#[derive(Debug, Clone, Default)]
pub struct NewNote {
    pub title: String,
    pub content: String,
    pub tag_ids: Vec<i64>,
    pub related_ids: Vec<i64>,
    pub files: Vec<FileUpload>,
}

/// Confirmation returned by the create-note workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreatedNote {
    pub id: i64,
    /// Number of uploads that were stored as attachments.
    pub attachments: usize,
}

/// A note together with its tags and attachments.
#[derive(Debug, Clone)]
pub struct NoteDetails {
    pub note: Note,
    pub tags: Vec<Tag>,
    pub attachments: Vec<Attachment>,
}

/// Outcome of the archive workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived,
    AlreadyArchived,
}

/// Counts of rows removed by the delete-note workflow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletedNote {
    pub associations: u64,
    pub attachments: u64,
    /// Files whose removal from the attachment store failed.
    pub orphaned_files: usize,
}
