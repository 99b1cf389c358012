use chrono::Utc;
use rusqlite::Row;
use tracing::info;
use uuid::Uuid;

use kirim_core::types::{MediaType, Post};

use crate::db::conv_err;
use crate::error::{Result, StoreError};
use crate::Store;

/// Input for [`Store::create_post`].
#[derive(Debug, Clone)]
pub struct NewPost {
    pub category_id: Option<String>,
    pub title: Option<String>,
    pub caption: String,
    pub media_type: MediaType,
    pub media_url: String,
    pub is_active: bool,
}

/// Partial update for [`Store::update_post`]. `None` fields keep the
/// stored value.
#[derive(Debug, Clone, Default)]
pub struct UpdatePost {
    pub category_id: Option<Option<String>>,
    pub title: Option<Option<String>>,
    pub caption: Option<String>,
    pub media_type: Option<MediaType>,
    pub media_url: Option<String>,
    pub is_active: Option<bool>,
}

/// Listing filter for [`Store::list_posts`].
#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub category_id: Option<String>,
    pub is_active: Option<bool>,
}

fn row_to_post(row: &Row) -> rusqlite::Result<Post> {
    let media_type: String = row.get(4)?;
    Ok(Post {
        id: row.get(0)?,
        category_id: row.get(1)?,
        title: row.get(2)?,
        caption: row.get(3)?,
        media_type: media_type.parse().map_err(|e| conv_err(4, e))?,
        media_url: row.get(5)?,
        is_active: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

const POST_COLUMNS: &str =
    "id, category_id, title, caption, media_type, media_url, is_active, created_at, updated_at";

impl Store {
    pub fn create_post(&self, data: NewPost) -> Result<Post> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO posts
             (id, category_id, title, caption, media_type, media_url, is_active,
              created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
            rusqlite::params![
                id,
                data.category_id,
                data.title,
                data.caption,
                data.media_type.to_string(),
                data.media_url,
                data.is_active,
                now
            ],
        )?;
        info!(post_id = %id, media_type = %data.media_type, "post created");
        Ok(Post {
            id,
            category_id: data.category_id,
            title: data.title,
            caption: data.caption,
            media_type: data.media_type,
            media_url: data.media_url,
            is_active: data.is_active,
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn get_post(&self, id: &str) -> Result<Option<Post>> {
        let conn = self.conn();
        match conn.query_row(
            &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
            [id],
            row_to_post,
        ) {
            Ok(p) => Ok(Some(p)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    pub fn list_posts(&self, filter: &PostFilter) -> Result<Vec<Post>> {
        let conn = self.conn();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {POST_COLUMNS} FROM posts
             WHERE (?1 IS NULL OR category_id = ?1)
               AND (?2 IS NULL OR is_active = ?2)
             ORDER BY created_at DESC"
        ))?;
        let rows = stmt.query_map(
            rusqlite::params![filter.category_id, filter.is_active],
            row_to_post,
        )?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn update_post(&self, id: &str, update: UpdatePost) -> Result<Post> {
        let existing = self.get_post(id)?.ok_or_else(|| StoreError::NotFound {
            what: "post",
            id: id.to_string(),
        })?;

        let merged = Post {
            category_id: update.category_id.unwrap_or(existing.category_id),
            title: update.title.unwrap_or(existing.title),
            caption: update.caption.unwrap_or(existing.caption),
            media_type: update.media_type.unwrap_or(existing.media_type),
            media_url: update.media_url.unwrap_or(existing.media_url),
            is_active: update.is_active.unwrap_or(existing.is_active),
            updated_at: Utc::now().to_rfc3339(),
            ..existing
        };

        let conn = self.conn();
        conn.execute(
            "UPDATE posts
             SET category_id = ?1, title = ?2, caption = ?3, media_type = ?4,
                 media_url = ?5, is_active = ?6, updated_at = ?7
             WHERE id = ?8",
            rusqlite::params![
                merged.category_id,
                merged.title,
                merged.caption,
                merged.media_type.to_string(),
                merged.media_url,
                merged.is_active,
                merged.updated_at,
                id
            ],
        )?;
        Ok(merged)
    }

    pub fn delete_post(&self, id: &str) -> Result<()> {
        let conn = self.conn();
        let n = conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(StoreError::NotFound {
                what: "post",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;

    fn text_post(caption: &str) -> NewPost {
        NewPost {
            category_id: None,
            title: None,
            caption: caption.to_string(),
            media_type: MediaType::Text,
            media_url: String::new(),
            is_active: true,
        }
    }

    #[test]
    fn create_and_get_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let post = store.create_post(text_post("hello")).unwrap();
        let fetched = store.get_post(&post.id).unwrap().unwrap();
        assert_eq!(fetched.caption, "hello");
        assert_eq!(fetched.media_type, MediaType::Text);
    }

    #[test]
    fn filter_by_active() {
        let store = Store::open_in_memory().unwrap();
        store.create_post(text_post("a")).unwrap();
        let b = store.create_post(text_post("b")).unwrap();
        store
            .update_post(
                &b.id,
                UpdatePost {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();

        let active = store
            .list_posts(&PostFilter {
                is_active: Some(true),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].caption, "a");
    }

    #[test]
    fn update_merges_partial_fields() {
        let store = Store::open_in_memory().unwrap();
        let post = store.create_post(text_post("before")).unwrap();
        let updated = store
            .update_post(
                &post.id,
                UpdatePost {
                    caption: Some("after".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.caption, "after");
        assert!(updated.is_active);
    }
}
