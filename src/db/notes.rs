//! Note database queries.
//!
//! Every lookup that starts from a caller-supplied id is scoped by
//! `(id, user_id)`; a note owned by someone else is reported exactly like
//! a missing one.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::NoteDetails;
use crate::{Error, Result};

use super::{
    list_note_attachments, list_note_tags, list_owner_attachments, list_owner_note_tags,
    parse_json_list, DbPool, DbTransaction,
};

// ============================================================================
// Types
// ============================================================================

/// Note record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Note {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    /// Serialized embedding vector (JSON array of floats).
    #[serde(skip)]
    pub embedding: Option<Vec<u8>>,
    pub is_archived: bool,
    /// JSON array of related note ids. Not enforced as foreign keys.
    pub related_ids: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Parse the related note ids.
    pub fn related_ids_vec(&self) -> Vec<i64> {
        parse_json_list(&self.related_ids)
    }
}

/// Input for creating a new note row.
#[derive(Debug, Clone)]
pub struct CreateNote {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub embedding: Vec<u8>,
    pub related_ids: Vec<i64>,
}

/// A single-field update applied to a note.
#[derive(Debug, Clone)]
pub enum NoteField {
    Summary(String),
    Archived(bool),
}

// ============================================================================
// Queries
// ============================================================================

/// Insert a note row inside an open transaction.
pub async fn create_note_tx(tx: &mut DbTransaction<'_>, input: CreateNote) -> Result<Note> {
    let now = Utc::now();
    let related_ids = serde_json::to_string(&input.related_ids)
        .map_err(|e| Error::Serialization(e.to_string()))?;

    sqlx::query_as::<_, Note>(
        r#"
        INSERT INTO notes (user_id, title, content, embedding, related_ids, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(input.user_id)
    .bind(&input.title)
    .bind(&input.content)
    .bind(&input.embedding)
    .bind(&related_ids)
    .bind(now)
    .bind(now)
    .fetch_one(&mut **tx)
    .await
    .map_err(Error::Database)
}

/// Find a note by ID, scoped to its owner.
pub async fn find_note(pool: &DbPool, user_id: i64, id: i64) -> Result<Note> {
    sqlx::query_as::<_, Note>("SELECT * FROM notes WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| Error::NotFound("Note".into()))
}

/// Claim a note for writing inside an open transaction, scoped to its owner.
///
/// Must be the first statement of the transaction. It is a no-op `UPDATE`,
/// so the transaction holds the write lock before it reads anything and
/// waits on `busy_timeout` behind other writers instead of failing later
/// on a stale WAL snapshot.
pub async fn lock_note_tx(tx: &mut DbTransaction<'_>, user_id: i64, id: i64) -> Result<()> {
    let result = sqlx::query("UPDATE notes SET id = id WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("Note".into()));
    }
    Ok(())
}

/// List all notes for a user, newest first.
pub async fn list_notes_by_owner(pool: &DbPool, user_id: i64) -> Result<Vec<Note>> {
    sqlx::query_as::<_, Note>(
        r#"
        SELECT * FROM notes
        WHERE user_id = ?
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Update a single field of a note and bump `updated_at`.
///
/// No ownership check: callers scope the note first.
pub async fn update_note_field(pool: &DbPool, id: i64, field: NoteField) -> Result<()> {
    let now = Utc::now();
    let result = match field {
        NoteField::Summary(summary) => {
            sqlx::query("UPDATE notes SET summary = ?, updated_at = ? WHERE id = ?")
                .bind(summary)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await?
        }
        NoteField::Archived(archived) => {
            sqlx::query("UPDATE notes SET is_archived = ?, updated_at = ? WHERE id = ?")
                .bind(archived)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await?
        }
    };

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("Note".into()));
    }
    Ok(())
}

/// Delete the note row inside an open transaction.
///
/// Dependents (associations, attachment rows) must already be gone;
/// the foreign keys reject the delete otherwise.
pub async fn delete_note_tx(tx: &mut DbTransaction<'_>, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM notes WHERE id = ?")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Count notes owned by a user.
pub async fn count_notes_by_owner(pool: &DbPool, user_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notes WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

// ============================================================================
// Aggregate loading
// ============================================================================

/// Load one note with its tags and attachments, scoped to its owner.
pub async fn get_note_details(pool: &DbPool, user_id: i64, id: i64) -> Result<NoteDetails> {
    let note = find_note(pool, user_id, id).await?;
    let tags = list_note_tags(pool, note.id).await?;
    let attachments = list_note_attachments(pool, note.id).await?;

    Ok(NoteDetails {
        note,
        tags,
        attachments,
    })
}

/// Load all notes for a user with tags and attachments eagerly.
///
/// Runs three queries regardless of how many notes the user has.
pub async fn list_note_details(pool: &DbPool, user_id: i64) -> Result<Vec<NoteDetails>> {
    let notes = list_notes_by_owner(pool, user_id).await?;
    if notes.is_empty() {
        return Ok(Vec::new());
    }

    let mut tags_by_note: HashMap<i64, Vec<_>> = HashMap::new();
    for (note_id, tag) in list_owner_note_tags(pool, user_id).await? {
        tags_by_note.entry(note_id).or_default().push(tag);
    }

    let mut attachments_by_note: HashMap<i64, Vec<_>> = HashMap::new();
    for attachment in list_owner_attachments(pool, user_id).await? {
        attachments_by_note
            .entry(attachment.note_id)
            .or_default()
            .push(attachment);
    }

    Ok(notes
        .into_iter()
        .map(|note| NoteDetails {
            tags: tags_by_note.remove(&note.id).unwrap_or_default(),
            attachments: attachments_by_note.remove(&note.id).unwrap_or_default(),
            note,
        })
        .collect())
}
