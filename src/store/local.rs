use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tracing::debug;

use crate::config::CHANGE_CHANNEL_CAPACITY;
use crate::error::{AppError, Result};
use crate::types::{
    ChangeEvent, Collection, Listing, ListingPatch, MarketPrice, PriceAudit, Profile,
};

// ---------------------------------------------------------------------------
// LocalStore
// ---------------------------------------------------------------------------

/// Mapping-backed persistent store for the four record collections.
///
/// sqlite is the durable layer (one JSON document table per collection, rows
/// addressed by primary key); DashMap mirrors serve every read. A write is
/// visible to readers and observers only after its row has committed, so a
/// call that returns `Ok` is the only proof a write happened.
pub struct LocalStore {
    pool: SqlitePool,
    /// price id → record
    prices: DashMap<String, MarketPrice>,
    /// listing id → record
    listings: DashMap<String, Listing>,
    /// identity user id → record
    profiles: DashMap<String, Profile>,
    /// audit entry id → record (append-only)
    price_audit: DashMap<String, PriceAudit>,
    changes: broadcast::Sender<ChangeEvent>,
}

impl LocalStore {
    /// Opens the store over an already-migrated pool and hydrates the
    /// in-memory mirrors from disk.
    pub async fn open(pool: SqlitePool) -> Result<Arc<Self>> {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let store = Self {
            pool,
            prices: DashMap::new(),
            listings: DashMap::new(),
            profiles: DashMap::new(),
            price_audit: DashMap::new(),
            changes,
        };
        store.hydrate().await?;
        Ok(Arc::new(store))
    }

    async fn hydrate(&self) -> Result<()> {
        for record in self.load_all::<MarketPrice>(Collection::Prices).await? {
            self.prices.insert(record.id.clone(), record);
        }
        for record in self.load_all::<Listing>(Collection::Listings).await? {
            self.listings.insert(record.id.clone(), record);
        }
        for record in self.load_all::<Profile>(Collection::Profiles).await? {
            self.profiles.insert(record.id.clone(), record);
        }
        for record in self.load_all::<PriceAudit>(Collection::PriceAudit).await? {
            self.price_audit.insert(record.id.clone(), record);
        }
        debug!(
            prices = self.prices.len(),
            listings = self.listings.len(),
            profiles = self.profiles.len(),
            audit_entries = self.price_audit.len(),
            "store hydrated"
        );
        Ok(())
    }

    async fn load_all<T: DeserializeOwned>(&self, collection: Collection) -> Result<Vec<T>> {
        let rows: Vec<(String,)> =
            sqlx::query_as(&format!("SELECT doc FROM {}", collection.table()))
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(|(doc,)| serde_json::from_str(&doc).map_err(AppError::from))
            .collect()
    }

    // -----------------------------------------------------------------------
    // Change feed
    // -----------------------------------------------------------------------

    /// Every committed write pushes one event tagged with its collection.
    /// Observers re-run their query on receipt; see [`super::LiveQuery`].
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }

    fn notify(&self, collection: Collection) {
        // send only errs when nobody is subscribed, which is fine
        let _ = self.changes.send(ChangeEvent { collection });
    }

    // -----------------------------------------------------------------------
    // Shared persistence helpers
    // -----------------------------------------------------------------------

    fn upsert_sql(collection: Collection) -> String {
        format!(
            "INSERT INTO {} (id, doc) VALUES (?, ?) ON CONFLICT(id) DO UPDATE SET doc = excluded.doc",
            collection.table()
        )
    }

    async fn persist<T: Serialize>(
        &self,
        collection: Collection,
        id: &str,
        record: &T,
    ) -> Result<()> {
        let doc = serde_json::to_string(record)?;
        sqlx::query(&Self::upsert_sql(collection))
            .bind(id)
            .bind(doc)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Prices
    // -----------------------------------------------------------------------

    pub fn price(&self, id: &str) -> Option<MarketPrice> {
        self.prices.get(id).map(|r| r.clone())
    }

    /// All prices, ordered by commodity name for stable display.
    pub fn prices(&self) -> Vec<MarketPrice> {
        let mut all: Vec<MarketPrice> = self.prices.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.commodity.cmp(&b.commodity));
        all
    }

    pub fn query_prices(&self, pred: impl Fn(&MarketPrice) -> bool) -> Vec<MarketPrice> {
        let mut hits: Vec<MarketPrice> = self
            .prices
            .iter()
            .filter(|e| pred(e.value()))
            .map(|e| e.value().clone())
            .collect();
        hits.sort_by(|a, b| a.commodity.cmp(&b.commodity));
        hits
    }

    pub async fn put_price(&self, price: MarketPrice) -> Result<()> {
        self.persist(Collection::Prices, &price.id, &price).await?;
        self.prices.insert(price.id.clone(), price);
        self.notify(Collection::Prices);
        Ok(())
    }

    /// One-time seeding only. A single transaction, so a half-seeded
    /// collection cannot survive a crash.
    pub async fn bulk_put_prices(&self, records: Vec<MarketPrice>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for record in &records {
            let doc = serde_json::to_string(record)?;
            sqlx::query(&Self::upsert_sql(Collection::Prices))
                .bind(&record.id)
                .bind(doc)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        for record in records {
            self.prices.insert(record.id.clone(), record);
        }
        self.notify(Collection::Prices);
        Ok(())
    }

    /// Writes an audit entry and the updated price it describes in one
    /// transaction: either both rows commit or neither does, so no audit
    /// entry can exist for a price value that never landed and no price can
    /// change without its audit entry.
    pub async fn commit_price_change(&self, price: MarketPrice, audit: PriceAudit) -> Result<()> {
        let price_doc = serde_json::to_string(&price)?;
        let audit_doc = serde_json::to_string(&audit)?;

        let mut tx = self.pool.begin().await?;
        sqlx::query(&Self::upsert_sql(Collection::PriceAudit))
            .bind(&audit.id)
            .bind(audit_doc)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&Self::upsert_sql(Collection::Prices))
            .bind(&price.id)
            .bind(price_doc)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        self.price_audit.insert(audit.id.clone(), audit);
        self.prices.insert(price.id.clone(), price);
        self.notify(Collection::PriceAudit);
        self.notify(Collection::Prices);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Audit trail (reads only — writes go through commit_price_change)
    // -----------------------------------------------------------------------

    /// Entries for one price, most recent first.
    pub fn audit_for_price(&self, price_id: &str) -> Vec<PriceAudit> {
        let mut entries: Vec<PriceAudit> = self
            .price_audit
            .iter()
            .filter(|e| e.value().price_id == price_id)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
    }

    /// Cross-commodity trail, most recent first.
    pub fn recent_audit(&self, limit: usize) -> Vec<PriceAudit> {
        let mut entries: Vec<PriceAudit> =
            self.price_audit.iter().map(|e| e.value().clone()).collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries.truncate(limit);
        entries
    }

    // -----------------------------------------------------------------------
    // Listings
    // -----------------------------------------------------------------------

    pub fn listing(&self, id: &str) -> Option<Listing> {
        self.listings.get(id).map(|r| r.clone())
    }

    pub fn query_listings(&self, pred: impl Fn(&Listing) -> bool) -> Vec<Listing> {
        self.listings
            .iter()
            .filter(|e| pred(e.value()))
            .map(|e| e.value().clone())
            .collect()
    }

    pub async fn put_listing(&self, listing: Listing) -> Result<()> {
        self.persist(Collection::Listings, &listing.id, &listing)
            .await?;
        self.listings.insert(listing.id.clone(), listing);
        self.notify(Collection::Listings);
        Ok(())
    }

    /// Merges `patch` into an existing listing.
    pub async fn update_listing(&self, id: &str, patch: ListingPatch) -> Result<Listing> {
        let current = self
            .listing(id)
            .ok_or_else(|| AppError::NotFound(format!("listing {id}")))?;
        let updated = patch.apply(current);
        self.persist(Collection::Listings, id, &updated).await?;
        self.listings.insert(id.to_string(), updated.clone());
        self.notify(Collection::Listings);
        Ok(updated)
    }

    /// Idempotent: removing an absent listing is a no-op, not an error.
    /// Returns whether a record was actually removed.
    pub async fn delete_listing(&self, id: &str) -> Result<bool> {
        sqlx::query("DELETE FROM listings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        let existed = self.listings.remove(id).is_some();
        if existed {
            self.notify(Collection::Listings);
        }
        Ok(existed)
    }

    pub async fn bulk_put_listings(&self, records: Vec<Listing>) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for record in &records {
            let doc = serde_json::to_string(record)?;
            sqlx::query(&Self::upsert_sql(Collection::Listings))
                .bind(&record.id)
                .bind(doc)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        for record in records {
            self.listings.insert(record.id.clone(), record);
        }
        self.notify(Collection::Listings);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Profiles
    // -----------------------------------------------------------------------

    pub fn profile(&self, id: &str) -> Option<Profile> {
        self.profiles.get(id).map(|r| r.clone())
    }

    pub fn profiles(&self) -> Vec<Profile> {
        self.profiles.iter().map(|e| e.value().clone()).collect()
    }

    pub async fn put_profile(&self, profile: Profile) -> Result<()> {
        self.persist(Collection::Profiles, &profile.id, &profile)
            .await?;
        self.profiles.insert(profile.id.clone(), profile);
        self.notify(Collection::Profiles);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Whole-store operations
    // -----------------------------------------------------------------------

    /// Clears every collection — rows and mirrors — and tells observers.
    /// Used by destructive logout.
    pub async fn wipe_all(&self) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for collection in Collection::ALL {
            sqlx::query(&format!("DELETE FROM {}", collection.table()))
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        self.prices.clear();
        self.listings.clear();
        self.profiles.clear();
        self.price_audit.clear();
        for collection in Collection::ALL {
            self.notify(collection);
        }
        Ok(())
    }

    /// Per-collection record counts, for /health.
    pub fn counts(&self) -> CollectionCounts {
        CollectionCounts {
            prices: self.prices.len(),
            listings: self.listings.len(),
            profiles: self.profiles.len(),
            price_audit: self.price_audit.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CollectionCounts {
    pub prices: usize,
    pub listings: usize,
    pub profiles: usize,
    pub price_audit: usize,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil::{listing, maize, profile, test_store};
    use crate::types::Trend;

    #[tokio::test]
    async fn put_then_get_roundtrip() {
        let store = test_store().await;
        store.put_price(maize()).await.unwrap();

        let got = store.price("maize-id").unwrap();
        assert_eq!(got.commodity, "Maize");
        assert_eq!(got.price, 450.0);
        assert!(store.price("unknown").is_none());
    }

    #[tokio::test]
    async fn query_filters_by_predicate() {
        let store = test_store().await;
        store.put_price(maize()).await.unwrap();
        store
            .put_price(MarketPrice {
                id: "cocoa-id".to_string(),
                commodity: "Cocoa".to_string(),
                price: 1250.0,
                unit: "64kg sack".to_string(),
                location: "Kejetia, Kumasi".to_string(),
                trend: Trend::Down,
                updated_at: "5 hours ago".to_string(),
            })
            .await
            .unwrap();

        let hits = store.query_prices(|p| p.location.contains("Kumasi"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].commodity, "Cocoa");
    }

    #[tokio::test]
    async fn update_listing_missing_key_is_not_found() {
        let store = test_store().await;
        let err = store
            .update_listing("nope", ListingPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_listing_is_idempotent() {
        let store = test_store().await;
        store.put_listing(listing("l1", "u1")).await.unwrap();

        assert!(store.delete_listing("l1").await.unwrap());
        // second delete of the same key is a quiet no-op
        assert!(!store.delete_listing("l1").await.unwrap());
    }

    #[tokio::test]
    async fn writes_notify_subscribers_with_their_collection() {
        let store = test_store().await;
        let mut rx = store.subscribe();

        store.put_listing(listing("l1", "u1")).await.unwrap();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.collection, Collection::Listings);
    }

    #[tokio::test]
    async fn commit_price_change_writes_both_records() {
        let store = test_store().await;
        store.put_price(maize()).await.unwrap();

        let updated = MarketPrice {
            price: 470.0,
            trend: Trend::Up,
            ..maize()
        };
        let audit = PriceAudit {
            id: "a1".to_string(),
            price_id: "maize-id".to_string(),
            commodity: "Maize".to_string(),
            old_price: 450.0,
            new_price: 470.0,
            base_old_price: 450.0,
            changed_by: "Officer Kojo".to_string(),
            timestamp: "2026-08-05T10:00:00+00:00".to_string(),
        };
        store.commit_price_change(updated, audit).await.unwrap();

        assert_eq!(store.price("maize-id").unwrap().price, 470.0);
        let trail = store.audit_for_price("maize-id");
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].new_price, 470.0);
    }

    #[tokio::test]
    async fn wipe_all_empties_every_collection() {
        let store = test_store().await;
        store.put_price(maize()).await.unwrap();
        store.put_listing(listing("l1", "u1")).await.unwrap();
        store.put_profile(profile("u1", "Kojo Asante")).await.unwrap();

        store.wipe_all().await.unwrap();

        let counts = store.counts();
        assert_eq!(counts.prices, 0);
        assert_eq!(counts.listings, 0);
        assert_eq!(counts.profiles, 0);
        assert_eq!(counts.price_audit, 0);
    }

    #[tokio::test]
    async fn reopened_store_sees_committed_writes() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("agrihub.db");
        let options = sqlx::sqlite::SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true);

        {
            let pool = sqlx::sqlite::SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options.clone())
                .await
                .unwrap();
            sqlx::migrate!("./migrations").run(&pool).await.unwrap();
            let store = LocalStore::open(pool.clone()).await.unwrap();
            store.put_price(maize()).await.unwrap();
            pool.close().await;
        }

        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .unwrap();
        let store = LocalStore::open(pool).await.unwrap();
        assert_eq!(store.price("maize-id").unwrap().commodity, "Maize");
    }
}
