//! Attachment database queries.
//!
//! Attachments are files owned by exactly one note (images, audio,
//! documents). Rows only record where the file lives; the bytes are
//! managed by the attachment store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::FileCategory;
use crate::{Error, Result};

use super::{DbPool, DbTransaction};

// ============================================================================
// Types
// ============================================================================

/// Attachment record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub id: i64,
    pub note_id: i64,
    /// Public reference returned by the attachment store.
    pub file_url: String,
    /// One of `image`, `audio`, `document`.
    pub file_type: String,
    pub file_size: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// Input for creating a new attachment row.
#[derive(Debug, Clone)]
pub struct CreateAttachment {
    pub note_id: i64,
    pub file_url: String,
    pub category: FileCategory,
    pub file_size: i64,
}

// ============================================================================
// Queries
// ============================================================================

/// Create a new attachment row.
pub async fn create_attachment(pool: &DbPool, input: CreateAttachment) -> Result<Attachment> {
    sqlx::query_as::<_, Attachment>(
        r#"
        INSERT INTO attachments (note_id, file_url, file_type, file_size, uploaded_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(input.note_id)
    .bind(&input.file_url)
    .bind(input.category.as_str())
    .bind(input.file_size)
    .bind(Utc::now())
    .fetch_one(pool)
    .await
    .map_err(Error::Database)
}

/// List attachments for a note, oldest first.
/// Uses idx_attachments_note index.
pub async fn list_note_attachments(pool: &DbPool, note_id: i64) -> Result<Vec<Attachment>> {
    sqlx::query_as::<_, Attachment>(
        "SELECT * FROM attachments WHERE note_id = ? ORDER BY uploaded_at, id",
    )
    .bind(note_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// List attachments for a note inside an open transaction.
pub async fn list_note_attachments_tx(
    tx: &mut DbTransaction<'_>,
    note_id: i64,
) -> Result<Vec<Attachment>> {
    sqlx::query_as::<_, Attachment>(
        "SELECT * FROM attachments WHERE note_id = ? ORDER BY uploaded_at, id",
    )
    .bind(note_id)
    .fetch_all(&mut **tx)
    .await
    .map_err(Error::Database)
}

/// List attachments across every note a user owns.
pub async fn list_owner_attachments(pool: &DbPool, user_id: i64) -> Result<Vec<Attachment>> {
    sqlx::query_as::<_, Attachment>(
        r#"
        SELECT a.* FROM attachments a
        JOIN notes n ON n.id = a.note_id
        WHERE n.user_id = ?
        ORDER BY a.uploaded_at, a.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// Delete all attachment rows for a note inside an open transaction.
/// Note: This only deletes the database rows, not the files.
pub async fn delete_note_attachments_tx(tx: &mut DbTransaction<'_>, note_id: i64) -> Result<u64> {
    let result = sqlx::query("DELETE FROM attachments WHERE note_id = ?")
        .bind(note_id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}

/// Count attachments for a note.
#[cfg(test)]
pub(crate) async fn count_note_attachments(pool: &DbPool, note_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attachments WHERE note_id = ?")
        .bind(note_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;
    use crate::db::{create_note_tx, CreateNote};

    async fn setup_with_note(user_id: i64) -> (DbPool, i64) {
        let pool = setup_test_db().await;
        let mut tx = pool.begin().await.unwrap();
        let note = create_note_tx(
            &mut tx,
            CreateNote {
                user_id,
                title: "With files".to_string(),
                content: "Body".to_string(),
                embedding: Vec::new(),
                related_ids: Vec::new(),
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();
        (pool, note.id)
    }

    #[tokio::test]
    async fn test_create_and_list_attachments() {
        let (pool, note_id) = setup_with_note(1).await;

        for (i, category) in [FileCategory::Image, FileCategory::Document]
            .into_iter()
            .enumerate()
        {
            create_attachment(
                &pool,
                CreateAttachment {
                    note_id,
                    file_url: format!("http://localhost/attachments/f{}", i),
                    category,
                    file_size: 100 * (i as i64 + 1),
                },
            )
            .await
            .unwrap();
        }

        let attachments = list_note_attachments(&pool, note_id).await.unwrap();
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].file_type, "image");
        assert_eq!(attachments[1].file_type, "document");

        let owned = list_owner_attachments(&pool, 1).await.unwrap();
        assert_eq!(owned, attachments);
        assert!(list_owner_attachments(&pool, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attachment_requires_existing_note() {
        let pool = setup_test_db().await;
        let err = create_attachment(
            &pool,
            CreateAttachment {
                note_id: 404,
                file_url: "http://localhost/attachments/x".to_string(),
                category: FileCategory::Audio,
                file_size: 1,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }

    #[tokio::test]
    async fn test_delete_note_attachments() {
        let (pool, note_id) = setup_with_note(1).await;
        create_attachment(
            &pool,
            CreateAttachment {
                note_id,
                file_url: "http://localhost/attachments/a".to_string(),
                category: FileCategory::Audio,
                file_size: 10,
            },
        )
        .await
        .unwrap();

        let mut tx = pool.begin().await.unwrap();
        assert_eq!(list_note_attachments_tx(&mut tx, note_id).await.unwrap().len(), 1);
        assert_eq!(delete_note_attachments_tx(&mut tx, note_id).await.unwrap(), 1);
        tx.commit().await.unwrap();

        assert_eq!(count_note_attachments(&pool, note_id).await.unwrap(), 0);
    }
}
