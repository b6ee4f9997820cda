//! Listing repository.
//!
//! [`ListingStore`] is the only data-access surface the HTTP layer sees:
//! create / get / update / delete / list. Field validation (including the
//! rule that a stored category must be a taxonomy member) lives here so
//! every backend enforces it the same way.
//!
//! Backends are enum-dispatched like the LLM providers:
//! - `memory` — process-local map, lost on restart.
//! - `sqlite` — single file, behind the `sqlite` feature.

pub mod browse;
mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::StoreBackend;
use crate::error::AppError;
use crate::taxonomy::Taxonomy;

pub const MAX_TITLE_CHARS: usize = 120;
pub const MAX_DESCRIPTION_CHARS: usize = 5000;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("listing not found: {0}")]
    NotFound(Uuid),
    #[error("invalid listing: {0}")]
    Invalid(String),
    #[error("listing store backend: {0}")]
    Backend(String),
}

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Available,
    Reserved,
    Sold,
}

impl ListingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingStatus::Available => "available",
            ListingStatus::Reserved => "reserved",
            ListingStatus::Sold => "sold",
        }
    }
}

impl fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListingStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(ListingStatus::Available),
            "reserved" => Ok(ListingStatus::Reserved),
            "sold" => Ok(ListingStatus::Sold),
            other => Err(StoreError::Invalid(format!("unknown status '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price_cents: u64,
    /// Always a taxonomy label at the time the listing was written.
    pub category: String,
    pub image_url: Option<String>,
    pub seller_id: String,
    pub created_at: DateTime<Utc>,
    pub status: ListingStatus,
}

/// Body of `POST /api/listings`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewListing {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price_cents: u64,
    pub category: String,
    #[serde(default)]
    pub image_url: Option<String>,
    pub seller_id: String,
}

/// Body of `PATCH /api/listings/{id}`. Absent fields are left unchanged;
/// an empty `imageUrl` clears the image.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<u64>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub status: Option<ListingStatus>,
}

impl ListingPatch {
    fn apply_to(self, listing: &mut Listing) {
        if let Some(title) = self.title {
            listing.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            listing.description = description.trim().to_string();
        }
        if let Some(price_cents) = self.price_cents {
            listing.price_cents = price_cents;
        }
        if let Some(category) = self.category {
            listing.category = category;
        }
        if self.image_url.is_some() {
            listing.image_url = normalize_image_url(self.image_url);
        }
        if let Some(status) = self.status {
            listing.status = status;
        }
    }
}

// ── Store ─────────────────────────────────────────────────────────────────────

#[derive(Debug)]
enum Backend {
    Memory(memory::MemoryBackend),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite::SqliteBackend),
}

#[derive(Debug)]
pub struct ListingStore {
    taxonomy: Taxonomy,
    backend: Backend,
}

impl ListingStore {
    /// Open the configured backend.
    pub fn open(config: &StoreBackend, taxonomy: Taxonomy) -> Result<Self, AppError> {
        let backend = match config {
            StoreBackend::Memory => Backend::Memory(memory::MemoryBackend::default()),
            #[cfg(feature = "sqlite")]
            StoreBackend::Sqlite(path) => Backend::Sqlite(
                sqlite::SqliteBackend::open(path).map_err(|e| AppError::Store(e.to_string()))?,
            ),
        };
        info!(backend = backend.name(), "listing store ready");
        Ok(Self { taxonomy, backend })
    }

    /// Process-local store, mostly for tests.
    pub fn in_memory(taxonomy: Taxonomy) -> Self {
        Self { taxonomy, backend: Backend::Memory(memory::MemoryBackend::default()) }
    }

    pub async fn create(&self, new: NewListing) -> Result<Listing, StoreError> {
        let seller_id = new.seller_id.trim();
        if seller_id.is_empty() {
            return Err(StoreError::Invalid("sellerId must not be empty".into()));
        }

        let listing = Listing {
            id: Uuid::new_v4(),
            title: new.title.trim().to_string(),
            description: new.description.trim().to_string(),
            price_cents: new.price_cents,
            category: new.category,
            image_url: normalize_image_url(new.image_url),
            seller_id: seller_id.to_string(),
            created_at: Utc::now(),
            status: ListingStatus::Available,
        };
        let listing = self.validated(listing)?;

        self.backend.insert(&listing).await?;
        debug!(id = %listing.id, category = %listing.category, "listing created");
        Ok(listing)
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Listing>, StoreError> {
        self.backend.get(id).await
    }

    /// Apply `patch` to the stored listing. The read, validation and write
    /// happen under one backend lock, so concurrent patches touching
    /// different fields all land.
    pub async fn update(&self, id: Uuid, patch: ListingPatch) -> Result<Listing, StoreError> {
        let listing = self
            .backend
            .modify(id, |mut listing| {
                patch.apply_to(&mut listing);
                self.validated(listing)
            })
            .await?;
        debug!(%id, status = %listing.status, "listing updated");
        Ok(listing)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        if self.backend.remove(id).await? {
            debug!(%id, "listing deleted");
            Ok(())
        } else {
            Err(StoreError::NotFound(id))
        }
    }

    pub async fn list_all(&self) -> Result<Vec<Listing>, StoreError> {
        self.backend.all().await
    }

    pub async fn count(&self) -> Result<usize, StoreError> {
        self.backend.count().await
    }

    /// Check field rules and canonicalise the category label.
    fn validated(&self, mut listing: Listing) -> Result<Listing, StoreError> {
        if listing.title.is_empty() {
            return Err(StoreError::Invalid("title must not be empty".into()));
        }
        if listing.title.chars().count() > MAX_TITLE_CHARS {
            return Err(StoreError::Invalid(format!("title exceeds {MAX_TITLE_CHARS} characters")));
        }
        if listing.description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(StoreError::Invalid(format!(
                "description exceeds {MAX_DESCRIPTION_CHARS} characters"
            )));
        }
        let category = self.taxonomy.lookup(&listing.category).ok_or_else(|| {
            StoreError::Invalid(format!("unknown category '{}'", listing.category))
        })?;
        listing.category = category.as_str().to_string();
        Ok(listing)
    }
}

fn normalize_image_url(url: Option<String>) -> Option<String> {
    url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty())
}

impl Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Memory(_) => "memory",
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(_) => "sqlite",
        }
    }

    async fn insert(&self, listing: &Listing) -> Result<(), StoreError> {
        match self {
            Backend::Memory(b) => b.insert(listing).await,
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(b) => b.insert(listing),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Listing>, StoreError> {
        match self {
            Backend::Memory(b) => Ok(b.get(id).await),
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(b) => b.get(id),
        }
    }

    /// Read-modify-write `id` atomically. `NotFound` when absent; an error
    /// from `f` leaves the stored row untouched.
    async fn modify<F>(&self, id: Uuid, f: F) -> Result<Listing, StoreError>
    where
        F: FnOnce(Listing) -> Result<Listing, StoreError>,
    {
        match self {
            Backend::Memory(b) => b.modify(id, f).await,
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(b) => b.modify(id, f),
        }
    }

    async fn remove(&self, id: Uuid) -> Result<bool, StoreError> {
        match self {
            Backend::Memory(b) => Ok(b.remove(id).await),
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(b) => b.remove(id),
        }
    }

    async fn all(&self) -> Result<Vec<Listing>, StoreError> {
        match self {
            Backend::Memory(b) => Ok(b.all().await),
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(b) => b.all(),
        }
    }

    async fn count(&self) -> Result<usize, StoreError> {
        match self {
            Backend::Memory(b) => Ok(b.count().await),
            #[cfg(feature = "sqlite")]
            Backend::Sqlite(b) => b.count(),
        }
    }
}
