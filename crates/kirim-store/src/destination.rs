use chrono::Utc;
use tracing::info;

use kirim_core::types::{DestinationConfig, DestinationKind};

use crate::db::conv_err;
use crate::error::{Result, StoreError};
use crate::Store;

/// The destination table holds a single logical row.
const CONFIG_ROW_ID: &str = "default";

impl Store {
    /// The single active destination, if one has been configured.
    pub fn get_destination(&self) -> Result<Option<DestinationConfig>> {
        let conn = self.conn();
        match conn.query_row(
            "SELECT id, destination, kind, updated_at FROM destination_config WHERE id = ?1",
            [CONFIG_ROW_ID],
            |row| {
                let kind: String = row.get(2)?;
                Ok(DestinationConfig {
                    id: row.get(0)?,
                    destination: row.get(1)?,
                    kind: kind.parse().map_err(|e| conv_err(2, e))?,
                    updated_at: row.get(3)?,
                })
            },
        ) {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::Database(e)),
        }
    }

    /// Create or replace the destination row.
    pub fn set_destination(
        &self,
        destination: &str,
        kind: DestinationKind,
    ) -> Result<DestinationConfig> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn();
        conn.execute(
            "INSERT INTO destination_config (id, destination, kind, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 destination = excluded.destination,
                 kind = excluded.kind,
                 updated_at = excluded.updated_at",
            rusqlite::params![CONFIG_ROW_ID, destination, kind.to_string(), now],
        )?;
        info!(%destination, kind = %kind, "destination config updated");
        Ok(DestinationConfig {
            id: CONFIG_ROW_ID.to_string(),
            destination: destination.to_string(),
            kind,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;

    #[test]
    fn unset_destination_is_none() {
        let store = Store::open_in_memory().unwrap();
        assert!(store.get_destination().unwrap().is_none());
    }

    #[test]
    fn set_then_replace_keeps_single_row() {
        let store = Store::open_in_memory().unwrap();
        store
            .set_destination("0812345678", DestinationKind::Single)
            .unwrap();
        store
            .set_destination("6281111111", DestinationKind::Group)
            .unwrap();

        let cfg = store.get_destination().unwrap().unwrap();
        assert_eq!(cfg.destination, "6281111111");
        assert_eq!(cfg.kind, DestinationKind::Group);
    }
}
