pub mod live;
pub mod local;

pub use live::LiveQuery;
pub use local::LocalStore;

/// Shared fixtures for the crate's tests: an in-memory single-connection
/// store plus a few records matching the seed shapes.
#[cfg(test)]
pub(crate) mod testutil {
    use std::sync::Arc;

    use super::LocalStore;
    use crate::types::{Listing, ListingKind, MarketPrice, Profile, Role, Trend};

    pub(crate) async fn memory_pool() -> sqlx::SqlitePool {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    pub(crate) async fn test_store() -> Arc<LocalStore> {
        LocalStore::open(memory_pool().await).await.unwrap()
    }

    pub(crate) fn maize() -> MarketPrice {
        MarketPrice {
            id: "maize-id".to_string(),
            commodity: "Maize".to_string(),
            price: 450.0,
            unit: "100kg bag".to_string(),
            location: "Makola, Accra".to_string(),
            trend: Trend::Stable,
            updated_at: "2 hours ago".to_string(),
        }
    }

    pub(crate) fn listing(id: &str, user_id: &str) -> Listing {
        Listing {
            id: id.to_string(),
            user_id: user_id.to_string(),
            user_name: "Kojo Asante".to_string(),
            user_profile_image: None,
            title: "50 Bags of Organic Maize".to_string(),
            description: "Grade A quality".to_string(),
            price: "GH₵ 450/bag".to_string(),
            kind: ListingKind::Sale,
            category: "Grain".to_string(),
            contact: "024 123 4567".to_string(),
        }
    }

    pub(crate) fn profile(id: &str, name: &str) -> Profile {
        Profile {
            id: id.to_string(),
            name: name.to_string(),
            location: "Accra".to_string(),
            phone_number: None,
            role: Role::Farmer,
            profile_image: None,
        }
    }
}
