use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{error, info};
use uuid::Uuid;

use crate::config::{ACCEPTED_CURRENCY_PREFIXES, CURRENCY_PREFIX, RECONCILE_INTERVAL_SECS};
use crate::error::{AppError, Result};
use crate::store::LocalStore;
use crate::types::{Listing, ListingDraft, ListingPatch};

/// Owner identity stamped onto a listing at creation.
#[derive(Debug, Clone)]
pub struct ListingOwner {
    pub user_id: String,
    pub name: String,
    pub profile_image: Option<String>,
}

/// Display prices always carry the currency. Caller-supplied prefixes are
/// kept as typed ("₵200/bag", "GH₵ 450/bag"); anything else gets the
/// standard prefix.
fn normalize_price(raw: &str) -> String {
    let trimmed = raw.trim();
    if ACCEPTED_CURRENCY_PREFIXES
        .iter()
        .any(|p| trimmed.starts_with(p))
    {
        trimmed.to_string()
    } else {
        format!("{CURRENCY_PREFIX} {trimmed}")
    }
}

// ---------------------------------------------------------------------------
// ListingRegistry
// ---------------------------------------------------------------------------

/// CRUD over marketplace listings, scoped to ownership, plus the fan-out
/// that keeps each listing's denormalized owner fields in step with the
/// owner's profile.
pub struct ListingRegistry {
    store: Arc<LocalStore>,
}

impl ListingRegistry {
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, draft: ListingDraft, owner: &ListingOwner) -> Result<Listing> {
        let listing = Listing {
            id: Uuid::new_v4().to_string(),
            user_id: owner.user_id.clone(),
            user_name: owner.name.clone(),
            user_profile_image: owner.profile_image.clone(),
            title: draft.title,
            description: draft.description,
            price: normalize_price(&draft.price),
            kind: draft.kind,
            category: draft.category,
            contact: draft.contact,
        };
        self.store.put_listing(listing.clone()).await?;
        info!(
            listing_id = %listing.id,
            user_id = %listing.user_id,
            kind = %listing.kind,
            "listing created"
        );
        Ok(listing)
    }

    /// Merges `patch` into the listing. Only the owner may edit.
    pub async fn update(&self, id: &str, mut patch: ListingPatch, caller_id: &str) -> Result<Listing> {
        let current = self
            .store
            .listing(id)
            .ok_or_else(|| AppError::NotFound(format!("listing {id}")))?;
        if current.user_id != caller_id {
            return Err(AppError::Authorization(format!(
                "listing {id} is not owned by {caller_id}"
            )));
        }
        if let Some(price) = patch.price.take() {
            patch.price = Some(normalize_price(&price));
        }
        self.store.update_listing(id, patch).await
    }

    /// Only the owner may delete.
    pub async fn delete(&self, id: &str, caller_id: &str) -> Result<()> {
        let current = self
            .store
            .listing(id)
            .ok_or_else(|| AppError::NotFound(format!("listing {id}")))?;
        if current.user_id != caller_id {
            return Err(AppError::Authorization(format!(
                "listing {id} is not owned by {caller_id}"
            )));
        }
        self.store.delete_listing(id).await?;
        info!(listing_id = %id, user_id = %caller_id, "listing deleted");
        Ok(())
    }

    /// Rewrites the denormalized owner fields on every listing of `user_id`
    /// that drifted. Not transactional with the profile write: a failure
    /// partway leaves some listings stale until the reconciler re-runs the
    /// fan-out. Returns how many listings were rewritten.
    pub async fn on_profile_changed(
        &self,
        user_id: &str,
        name: &str,
        photo: Option<&str>,
    ) -> Result<usize> {
        let stale = self.store.query_listings(|l| {
            l.user_id == user_id
                && (l.user_name != name || l.user_profile_image.as_deref() != photo)
        });
        let mut updated = 0usize;
        for listing in stale {
            let refreshed = Listing {
                user_name: name.to_string(),
                user_profile_image: photo.map(str::to_string),
                ..listing
            };
            self.store.put_listing(refreshed).await?;
            updated += 1;
        }
        if updated > 0 {
            info!(user_id, updated, "owner fields propagated to listings");
        }
        Ok(updated)
    }
}

// ---------------------------------------------------------------------------
// ListingReconciler
// ---------------------------------------------------------------------------

/// Background task that re-applies the profile fan-out on an interval, so
/// listings that missed an `on_profile_changed` pass (partial failure,
/// interleaved edits) still converge. The fan-out only ever writes current
/// profile values, so every run is idempotent.
pub struct ListingReconciler {
    store: Arc<LocalStore>,
    registry: ListingRegistry,
}

impl ListingReconciler {
    pub fn new(store: Arc<LocalStore>) -> Self {
        let registry = ListingRegistry::new(Arc::clone(&store));
        Self { store, registry }
    }

    pub async fn run(self) {
        let mut ticker = interval(Duration::from_secs(RECONCILE_INTERVAL_SECS));
        ticker.tick().await; // skip the immediate first tick — startup state is fresh

        loop {
            ticker.tick().await;
            match self.reconcile().await {
                Ok(0) => {}
                Ok(repaired) => {
                    info!(repaired, "fan-out reconciliation repaired stale listings");
                }
                Err(e) => {
                    error!("fan-out reconciliation failed: {e}");
                }
            }
        }
    }

    pub async fn reconcile(&self) -> Result<usize> {
        let mut total = 0usize;
        for profile in self.store.profiles() {
            total += self
                .registry
                .on_profile_changed(&profile.id, &profile.name, profile.profile_image.as_deref())
                .await?;
        }
        Ok(total)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
