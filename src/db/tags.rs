//! Tag and note-tag association queries.
//!
//! Tags are owner-scoped. Association rows are never cascaded by the
//! schema; the delete workflows remove them explicitly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::{Error, Result};

use super::{DbPool, DbTransaction};

// ============================================================================
// Types
// ============================================================================

/// Tag record from the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new tag.
#[derive(Debug, Clone)]
pub struct CreateTag {
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// Association row joined with its tag, used for eager loading.
#[derive(Debug, FromRow)]
struct NoteTagRow {
    note_id: i64,
    id: i64,
    user_id: i64,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl NoteTagRow {
    fn into_pair(self) -> (i64, Tag) {
        (
            self.note_id,
            Tag {
                id: self.id,
                user_id: self.user_id,
                name: self.name,
                description: self.description,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
        )
    }
}

// ============================================================================
// Tag queries
// ============================================================================

/// Create a new tag. Names are unique per owner.
pub async fn create_tag(pool: &DbPool, input: CreateTag) -> Result<Tag> {
    let now = Utc::now();

    sqlx::query_as::<_, Tag>(
        r#"
        INSERT INTO tags (user_id, name, description, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(input.user_id)
    .bind(&input.name)
    .bind(&input.description)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            Error::AlreadyExists(format!("Tag '{}'", input.name))
        }
        other => Error::Database(other),
    })
}

/// Claim a tag for writing inside an open transaction, scoped to its owner.
///
/// Same contract as [`super::lock_note_tx`]: run it first so the write lock
/// is taken up front.
pub async fn lock_tag_tx(tx: &mut DbTransaction<'_>, user_id: i64, id: i64) -> Result<()> {
    let result = sqlx::query("UPDATE tags SET id = id WHERE id = ? AND user_id = ?")
        .bind(id)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound("Tag".into()));
    }
    Ok(())
}

/// List a user's tags ordered by name.
pub async fn list_tags_by_owner(pool: &DbPool, user_id: i64) -> Result<Vec<Tag>> {
    sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE user_id = ? ORDER BY name, id")
        .bind(user_id)
        .fetch_all(pool)
        .await
        .map_err(Error::Database)
}

/// Return the subset of `ids` that are not tags owned by `user_id`.
pub async fn find_foreign_tag_ids(pool: &DbPool, user_id: i64, ids: &[i64]) -> Result<Vec<i64>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders: Vec<&str> = ids.iter().map(|_| "?").collect();
    let query = format!(
        "SELECT id FROM tags WHERE user_id = ? AND id IN ({})",
        placeholders.join(", ")
    );

    let mut q = sqlx::query_as::<_, (i64,)>(&query).bind(user_id);
    for id in ids {
        q = q.bind(id);
    }
    let owned: Vec<i64> = q.fetch_all(pool).await?.into_iter().map(|(id,)| id).collect();

    Ok(ids.iter().copied().filter(|id| !owned.contains(id)).collect())
}

/// Delete the tag row inside an open transaction.
pub async fn delete_tag_tx(tx: &mut DbTransaction<'_>, id: i64) -> Result<()> {
    sqlx::query("DELETE FROM tags WHERE id = ?")
        .bind(id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

// ============================================================================
// Association queries
// ============================================================================

/// Link a note to a tag inside an open transaction.
pub async fn create_association_tx(
    tx: &mut DbTransaction<'_>,
    note_id: i64,
    tag_id: i64,
) -> Result<()> {
    sqlx::query("INSERT INTO note_tags (note_id, tag_id) VALUES (?, ?)")
        .bind(note_id)
        .bind(tag_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Remove every association of a note. Returns the number of rows removed.
pub async fn delete_associations_by_note_tx(
    tx: &mut DbTransaction<'_>,
    note_id: i64,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM note_tags WHERE note_id = ?")
        .bind(note_id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}

/// Remove every association of a tag. Returns the number of rows removed.
pub async fn delete_associations_by_tag_tx(
    tx: &mut DbTransaction<'_>,
    tag_id: i64,
) -> Result<u64> {
    let result = sqlx::query("DELETE FROM note_tags WHERE tag_id = ?")
        .bind(tag_id)
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}

/// List the tags linked to a note.
pub async fn list_note_tags(pool: &DbPool, note_id: i64) -> Result<Vec<Tag>> {
    sqlx::query_as::<_, Tag>(
        r#"
        SELECT t.* FROM tags t
        JOIN note_tags nt ON nt.tag_id = t.id
        WHERE nt.note_id = ?
        ORDER BY t.name, t.id
        "#,
    )
    .bind(note_id)
    .fetch_all(pool)
    .await
    .map_err(Error::Database)
}

/// List `(note_id, tag)` pairs for every note a user owns.
pub async fn list_owner_note_tags(pool: &DbPool, user_id: i64) -> Result<Vec<(i64, Tag)>> {
    let rows = sqlx::query_as::<_, NoteTagRow>(
        r#"
        SELECT nt.note_id, t.id, t.user_id, t.name, t.description, t.created_at, t.updated_at
        FROM note_tags nt
        JOIN notes n ON n.id = nt.note_id
        JOIN tags t ON t.id = nt.tag_id
        WHERE n.user_id = ?
        ORDER BY t.name, t.id
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(NoteTagRow::into_pair).collect())
}

/// Count association rows for a note.
#[cfg(test)]
pub(crate) async fn count_note_associations(pool: &DbPool, note_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM note_tags WHERE note_id = ?")
        .bind(note_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Count association rows for a tag.
#[cfg(test)]
pub(crate) async fn count_tag_associations(pool: &DbPool, tag_id: i64) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM note_tags WHERE tag_id = ?")
        .bind(tag_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;
    use crate::db::{create_note_tx, CreateNote};

    async fn new_tag(pool: &DbPool, user_id: i64, name: &str) -> Tag {
        create_tag(
            pool,
            CreateTag {
                user_id,
                name: name.to_string(),
                description: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_list_tags() {
        let pool = setup_test_db().await;
        new_tag(&pool, 1, "work").await;
        new_tag(&pool, 1, "home").await;
        new_tag(&pool, 2, "work").await;

        let tags = list_tags_by_owner(&pool, 1).await.unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["home", "work"]);
    }

    #[tokio::test]
    async fn test_duplicate_tag_name_per_owner() {
        let pool = setup_test_db().await;
        new_tag(&pool, 1, "ideas").await;

        let err = create_tag(
            &pool,
            CreateTag {
                user_id: 1,
                name: "ideas".to_string(),
                description: Some("again".to_string()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_find_foreign_tag_ids() {
        let pool = setup_test_db().await;
        let mine = new_tag(&pool, 1, "mine").await;
        let theirs = new_tag(&pool, 2, "theirs").await;

        let foreign = find_foreign_tag_ids(&pool, 1, &[mine.id, theirs.id, 424242])
            .await
            .unwrap();
        assert_eq!(foreign, vec![theirs.id, 424242]);
        assert!(find_foreign_tag_ids(&pool, 1, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_associations_roundtrip() {
        let pool = setup_test_db().await;
        let tag = new_tag(&pool, 1, "linked").await;

        let mut tx = pool.begin().await.unwrap();
        let note = create_note_tx(
            &mut tx,
            CreateNote {
                user_id: 1,
                title: "Tagged".to_string(),
                content: "Body".to_string(),
                embedding: Vec::new(),
                related_ids: Vec::new(),
            },
        )
        .await
        .unwrap();
        create_association_tx(&mut tx, note.id, tag.id).await.unwrap();
        tx.commit().await.unwrap();

        assert_eq!(count_note_associations(&pool, note.id).await.unwrap(), 1);
        let tags = list_note_tags(&pool, note.id).await.unwrap();
        assert_eq!(tags, vec![tag.clone()]);

        let pairs = list_owner_note_tags(&pool, 1).await.unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0, note.id);

        let mut tx = pool.begin().await.unwrap();
        assert_eq!(delete_associations_by_tag_tx(&mut tx, tag.id).await.unwrap(), 1);
        tx.commit().await.unwrap();
        assert_eq!(count_tag_associations(&pool, tag.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_association_is_rejected() {
        let pool = setup_test_db().await;
        let tag = new_tag(&pool, 1, "once").await;

        let mut tx = pool.begin().await.unwrap();
        let note = create_note_tx(
            &mut tx,
            CreateNote {
                user_id: 1,
                title: "Twice".to_string(),
                content: "Body".to_string(),
                embedding: Vec::new(),
                related_ids: Vec::new(),
            },
        )
        .await
        .unwrap();
        create_association_tx(&mut tx, note.id, tag.id).await.unwrap();
        let err = create_association_tx(&mut tx, note.id, tag.id).await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }
}
