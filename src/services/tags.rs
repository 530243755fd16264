//! Tag service.
//!
//! Tags are scoped to their owner. Deleting a tag removes its note links
//! in the same transaction as the tag row.

use tracing::info;

use crate::db::{self, CreateTag, DbPool, Tag};
use crate::{Error, Result};

/// Service for owner-scoped tag management.
#[derive(Clone)]
pub struct TagService {
    db: DbPool,
}

impl TagService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Create a tag. Names are unique per owner.
    pub async fn create(
        &self,
        owner_id: i64,
        name: &str,
        description: Option<String>,
    ) -> Result<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("tag name is required".into()));
        }

        let description = description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let tag = db::create_tag(
            &self.db,
            CreateTag {
                user_id: owner_id,
                name: name.to_string(),
                description,
            },
        )
        .await?;

        info!(tag_id = tag.id, owner_id, name = %tag.name, "Tag created");
        Ok(tag)
    }

    /// List an owner's tags ordered by name.
    pub async fn list(&self, owner_id: i64) -> Result<Vec<Tag>> {
        db::list_tags_by_owner(&self.db, owner_id).await
    }

    /// Delete a tag and every note link that references it.
    pub async fn delete(&self, owner_id: i64, tag_id: i64) -> Result<()> {
        let mut tx = self.db.begin().await?;

        db::lock_tag_tx(&mut tx, owner_id, tag_id).await?;
        let unlinked = db::delete_associations_by_tag_tx(&mut tx, tag_id).await?;
        db::delete_tag_tx(&mut tx, tag_id).await?;
        tx.commit().await?;

        info!(tag_id, owner_id, unlinked, "Tag deleted");
        Ok(())
    }
}
