use chrono::Utc;
use rusqlite::Row;
use tracing::info;
use uuid::Uuid;

use kirim_core::types::Category;

use crate::error::{Result, StoreError};
use crate::Store;

fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get(2)?,
    })
}

impl Store {
    pub fn create_category(&self, name: &str) -> Result<Category> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO categories (id, name, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, name, now],
        )?;
        info!(category_id = %id, %name, "category created");
        Ok(Category {
            id,
            name: name.to_string(),
            created_at: now,
        })
    }

    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, name, created_at FROM categories ORDER BY name")?;
        let rows = stmt.query_map([], row_to_category)?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn delete_category(&self, id: &str) -> Result<()> {
        let conn = self.conn();
        // Posts keep working without a category; clear the reference first.
        conn.execute(
            "UPDATE posts SET category_id = NULL WHERE category_id = ?1",
            [id],
        )?;
        let n = conn.execute("DELETE FROM categories WHERE id = ?1", [id])?;
        if n == 0 {
            return Err(StoreError::NotFound {
                what: "category",
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
