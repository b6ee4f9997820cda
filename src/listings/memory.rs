//! In-memory listing backend.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Listing, StoreError};

#[derive(Debug, Default)]
pub(super) struct MemoryBackend {
    listings: RwLock<HashMap<Uuid, Listing>>,
}

impl MemoryBackend {
    pub(super) async fn insert(&self, listing: &Listing) -> Result<(), StoreError> {
        let mut listings = self.listings.write().await;
        if listings.contains_key(&listing.id) {
            return Err(StoreError::Backend(format!("duplicate id {}", listing.id)));
        }
        listings.insert(listing.id, listing.clone());
        Ok(())
    }

    pub(super) async fn get(&self, id: Uuid) -> Option<Listing> {
        self.listings.read().await.get(&id).cloned()
    }

    pub(super) async fn modify<F>(&self, id: Uuid, f: F) -> Result<Listing, StoreError>
    where
        F: FnOnce(Listing) -> Result<Listing, StoreError>,
    {
        let mut listings = self.listings.write().await;
        let slot = listings.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let updated = f(slot.clone())?;
        *slot = updated.clone();
        Ok(updated)
    }

    pub(super) async fn remove(&self, id: Uuid) -> bool {
        self.listings.write().await.remove(&id).is_some()
    }

    pub(super) async fn all(&self) -> Vec<Listing> {
        self.listings.read().await.values().cloned().collect()
    }

    pub(super) async fn count(&self) -> usize {
        self.listings.read().await.len()
    }
}
