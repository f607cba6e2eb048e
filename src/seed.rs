use tracing::info;

use crate::error::Result;
use crate::store::LocalStore;
use crate::types::{Listing, ListingKind, MarketPrice, Trend};

/// Fixed first-run template prices for the major Ghanaian commodity markets.
pub fn price_seeds() -> Vec<MarketPrice> {
    let rows = [
        ("1", "Maize", 450.00, "100kg bag", "Makola, Accra", Trend::Up, "2 hours ago"),
        ("2", "Cocoa", 1250.00, "64kg sack", "Kejetia, Kumasi", Trend::Down, "5 hours ago"),
        ("3", "Yam (Pona)", 35.00, "3 Tubers", "Tamale Central", Trend::Up, "1 hour ago"),
        ("4", "Cassava", 85.00, "Bag", "Techiman", Trend::Stable, "3 hours ago"),
        ("5", "Plantain", 65.00, "Bunch", "Koforidua", Trend::Up, "1 day ago"),
        ("6", "Groundnut", 120.00, "Bag", "Tamale", Trend::Stable, "4 hours ago"),
        ("7", "Cowpea", 95.00, "Bag", "Techiman", Trend::Up, "6 hours ago"),
        ("8", "Mango", 15.00, "Crate", "Greater Accra", Trend::Down, "2 days ago"),
        ("9", "Pineapple", 8.00, "Size 1", "Nsawam", Trend::Up, "1 hour ago"),
    ];
    rows.into_iter()
        .map(
            |(id, commodity, price, unit, location, trend, updated_at)| MarketPrice {
                id: id.to_string(),
                commodity: commodity.to_string(),
                price,
                unit: unit.to_string(),
                location: location.to_string(),
                trend,
                updated_at: updated_at.to_string(),
            },
        )
        .collect()
}

/// Starter marketplace listings shown before the community posts its own.
pub fn listing_seeds() -> Vec<Listing> {
    vec![
        Listing {
            id: "1".to_string(),
            user_id: "u1".to_string(),
            user_name: "Kojo Asante".to_string(),
            user_profile_image: None,
            title: "50 Bags of Organic Maize".to_string(),
            description: "Harvested last week, Grade A quality. No chemicals used.".to_string(),
            price: "₵450/bag".to_string(),
            kind: ListingKind::Sale,
            category: "Grain".to_string(),
            contact: "024 123 4567".to_string(),
        },
        Listing {
            id: "2".to_string(),
            user_id: "u2".to_string(),
            user_name: "Grace Mensah".to_string(),
            user_profile_image: None,
            title: "Looking for 100 Tubers of Yam".to_string(),
            description: "Pona preferred. Needed for export by Friday.".to_string(),
            price: "Offer Based".to_string(),
            kind: ListingKind::Wanted,
            category: "Roots".to_string(),
            contact: "050 987 6543".to_string(),
        },
        Listing {
            id: "3".to_string(),
            user_id: "u3".to_string(),
            user_name: "Kwame Agro".to_string(),
            user_profile_image: None,
            title: "NPK Fertilizer for Sale".to_string(),
            description: "Surplus stock from government subsidy. 50kg bags.".to_string(),
            price: "₵200/bag".to_string(),
            kind: ListingKind::Sale,
            category: "Inputs".to_string(),
            contact: "027 555 1234".to_string(),
        },
    ]
}

/// One-time initialization: populates the template set only when the prices
/// collection is empty, so synced or edited data is never overwritten.
/// Returns whether seeding ran.
pub async fn seed_if_empty(store: &LocalStore) -> Result<bool> {
    if !store.prices().is_empty() {
        return Ok(false);
    }

    let prices = price_seeds();
    let listings = listing_seeds();
    let (price_count, listing_count) = (prices.len(), listings.len());

    store.bulk_put_prices(prices).await?;
    store.bulk_put_listings(listings).await?;
    info!(
        prices = price_count,
        listings = listing_count,
        "seeded first-run template data"
    );
    Ok(true)
}
