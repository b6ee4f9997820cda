//! SQLite listing backend.
//!
//! One connection guarded by a mutex; statements are short enough that
//! holding it across a query does not stall the runtime in practice.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use uuid::Uuid;

use super::{Listing, ListingStatus, StoreError};

/// Schema version stored in `PRAGMA user_version`.
const SCHEMA_VERSION: i64 = 1;

const COLUMNS: &str =
    "id, title, description, price_cents, category, image_url, seller_id, created_at, status";

#[derive(Debug)]
pub(super) struct SqliteBackend {
    conn: Mutex<Connection>,
}

impl SqliteBackend {
    /// Open (creating if needed) the database at `path`.
    pub(super) fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("create {}: {e}", parent.display())))?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Backend(format!("open {}: {e}", path.display())))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| StoreError::Backend(format!("set journal_mode WAL: {e}")))?;
        conn.pragma_update(None, "busy_timeout", 5000)
            .map_err(|e| StoreError::Backend(format!("set busy_timeout: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub(super) fn insert(&self, listing: &Listing) -> Result<(), StoreError> {
        let price = price_to_sql(listing.price_cents)?;
        self.conn()
            .execute(
                &format!("INSERT INTO listings ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
                params![
                    listing.id.to_string(),
                    listing.title,
                    listing.description,
                    price,
                    listing.category,
                    listing.image_url,
                    listing.seller_id,
                    listing.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                    listing.status.as_str(),
                ],
            )
            .map_err(|e| StoreError::Backend(format!("insert listing: {e}")))?;
        Ok(())
    }

    pub(super) fn get(&self, id: Uuid) -> Result<Option<Listing>, StoreError> {
        let raw = self
            .conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM listings WHERE id = ?1"),
                params![id.to_string()],
                RawRow::from_row,
            )
            .optional()
            .map_err(|e| StoreError::Backend(format!("get listing: {e}")))?;
        raw.map(RawRow::into_listing).transpose()
    }

    /// SELECT, apply `f`, UPDATE, all in one immediate transaction on the
    /// locked connection.
    pub(super) fn modify<F>(&self, id: Uuid, f: F) -> Result<Listing, StoreError>
    where
        F: FnOnce(Listing) -> Result<Listing, StoreError>,
    {
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StoreError::Backend(format!("begin update: {e}")))?;

        let current = tx
            .query_row(
                &format!("SELECT {COLUMNS} FROM listings WHERE id = ?1"),
                params![id.to_string()],
                RawRow::from_row,
            )
            .optional()
            .map_err(|e| StoreError::Backend(format!("get listing: {e}")))?
            .ok_or(StoreError::NotFound(id))?
            .into_listing()?;

        // Dropping `tx` on an early return rolls back.
        let listing = f(current)?;
        let price = price_to_sql(listing.price_cents)?;
        tx.execute(
            "UPDATE listings SET title = ?2, description = ?3, price_cents = ?4, category = ?5,
                    image_url = ?6, status = ?7
             WHERE id = ?1",
            params![
                id.to_string(),
                listing.title,
                listing.description,
                price,
                listing.category,
                listing.image_url,
                listing.status.as_str(),
            ],
        )
        .map_err(|e| StoreError::Backend(format!("update listing: {e}")))?;
        tx.commit().map_err(|e| StoreError::Backend(format!("commit update: {e}")))?;
        Ok(listing)
    }

    pub(super) fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        let changed = self
            .conn()
            .execute("DELETE FROM listings WHERE id = ?1", params![id.to_string()])
            .map_err(|e| StoreError::Backend(format!("delete listing: {e}")))?;
        Ok(changed > 0)
    }

    pub(super) fn all(&self) -> Result<Vec<Listing>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(&format!("SELECT {COLUMNS} FROM listings"))
            .map_err(|e| StoreError::Backend(format!("prepare list: {e}")))?;
        let rows = stmt
            .query_map([], RawRow::from_row)
            .map_err(|e| StoreError::Backend(format!("list listings: {e}")))?;

        let mut listings = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| StoreError::Backend(format!("read listing row: {e}")))?;
            listings.push(raw.into_listing()?);
        }
        Ok(listings)
    }

    pub(super) fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM listings", [], |row| row.get(0))
            .map_err(|e| StoreError::Backend(format!("count listings: {e}")))?;
        usize::try_from(n).map_err(|e| StoreError::Backend(format!("count listings: {e}")))
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    let version: i64 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| StoreError::Backend(format!("read user_version: {e}")))?;
    if version >= SCHEMA_VERSION {
        return Ok(());
    }
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS listings (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            price_cents INTEGER NOT NULL,
            category TEXT NOT NULL,
            image_url TEXT,
            seller_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            status TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS listings_category ON listings (category);

        PRAGMA user_version = 1;
        ",
    )
    .map_err(|e| StoreError::Backend(format!("initialize schema: {e}")))
}

fn price_to_sql(price_cents: u64) -> Result<i64, StoreError> {
    i64::try_from(price_cents).map_err(|_| StoreError::Invalid("price is too large".into()))
}

/// Column values as stored, before parsing.
struct RawRow {
    id: String,
    title: String,
    description: String,
    price_cents: i64,
    category: String,
    image_url: Option<String>,
    seller_id: String,
    created_at: String,
    status: String,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            price_cents: row.get(3)?,
            category: row.get(4)?,
            image_url: row.get(5)?,
            seller_id: row.get(6)?,
            created_at: row.get(7)?,
            status: row.get(8)?,
        })
    }

    fn into_listing(self) -> Result<Listing, StoreError> {
        let corrupt = |what: &str, e: &dyn std::fmt::Display| {
            StoreError::Backend(format!("corrupt {what} in row {}: {e}", self.id))
        };
        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt("id", &e))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| corrupt("created_at", &e))?
            .with_timezone(&Utc);
        let price_cents = u64::try_from(self.price_cents).map_err(|e| corrupt("price_cents", &e))?;
        let status = self.status.parse::<ListingStatus>().map_err(|e| corrupt("status", &e))?;

        Ok(Listing {
            id,
            title: self.title,
            description: self.description,
            price_cents,
            category: self.category,
            image_url: self.image_url,
            seller_id: self.seller_id,
            created_at,
            status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::listings::tests::{assert_concurrent_patches_land, lamp};
    use crate::listings::{Backend, ListingPatch, ListingStore};
    use crate::taxonomy::Taxonomy;

    fn store() -> ListingStore {
        let conn = Connection::open_in_memory().unwrap();
        ListingStore {
            taxonomy: Taxonomy::default(),
            backend: Backend::Sqlite(SqliteBackend::from_connection(conn).unwrap()),
        }
    }

    #[tokio::test]
    async fn crud_round_trip() {
        let store = store();
        let l = store.create(lamp()).await.unwrap();
        assert_eq!(store.get(l.id).await.unwrap().as_ref(), Some(&l));

        let sold = store
            .update(l.id, ListingPatch { status: Some(ListingStatus::Sold), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(store.list_all().await.unwrap(), vec![sold]);

        store.delete(l.id).await.unwrap();
        assert_eq!(store.get(l.id).await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_partial_patches_all_land() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SqliteBackend::open(&dir.path().join("listings.db")).unwrap();
        let store = ListingStore { taxonomy: Taxonomy::default(), backend: Backend::Sqlite(backend) };
        assert_concurrent_patches_land(Arc::new(store), 100).await;
    }

    #[tokio::test]
    async fn failed_patch_rolls_back() {
        let store = store();
        let l = store.create(lamp()).await.unwrap();
        let err = store
            .update(
                l.id,
                ListingPatch {
                    title: Some("Brand new title".into()),
                    category: Some("Gadgets".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(_)));
        assert_eq!(store.get(l.id).await.unwrap(), Some(l));
    }

    #[tokio::test]
    async fn count_uses_sql() {
        let store = store();
        assert_eq!(store.count().await.unwrap(), 0);
        store.create(lamp()).await.unwrap();
        store.create(lamp()).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[test]
    fn reopen_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/listings.db");
        let backend = SqliteBackend::open(&path).unwrap();
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let store = ListingStore { taxonomy: Taxonomy::default(), backend: Backend::Sqlite(backend) };
        let l = rt.block_on(store.create(lamp())).unwrap();
        drop(store);

        let reopened = SqliteBackend::open(&path).unwrap();
        assert_eq!(reopened.get(l.id).unwrap(), Some(l));
    }

    #[test]
    fn oversized_price_rejected() {
        assert!(price_to_sql(u64::MAX).is_err());
        assert_eq!(price_to_sql(1999).unwrap(), 1999);
    }
}
