use chrono::Utc;
use serde::Serialize;

use crate::store::LocalStore;
use crate::types::{Listing, MarketPrice, Profile};

/// User-triggered backup document: all prices, the user's own listings, and
/// their stored profile. Assembling it is a pure read.
#[derive(Debug, Serialize)]
pub struct Snapshot {
    pub generated_at: String,
    pub prices: Vec<MarketPrice>,
    pub listings: Vec<Listing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

pub fn snapshot(store: &LocalStore, user_id: &str) -> Snapshot {
    Snapshot {
        generated_at: Utc::now().to_rfc3339(),
        prices: store.prices(),
        listings: store.query_listings(|l| l.user_id == user_id),
        profile: store.profile(user_id),
    }
}

/// CSV table of the given prices, one row per commodity.
pub fn prices_csv(prices: &[MarketPrice]) -> String {
    let mut out = String::from("Commodity,Price (GHS),Unit,Location,Trend,Updated At\n");
    for p in prices {
        out.push_str(&format!(
            "{},{:.2},{},{},{},{}\n",
            csv_field(&p.commodity),
            p.price,
            csv_field(&p.unit),
            csv_field(&p.location),
            p.trend,
            csv_field(&p.updated_at),
        ));
    }
    out
}

fn csv_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil::{listing, maize, profile, test_store};

    #[tokio::test]
    async fn snapshot_scopes_listings_and_profile_to_the_user() {
        let store = test_store().await;
        store.put_price(maize()).await.unwrap();
        store.put_listing(listing("l1", "u1")).await.unwrap();
        store.put_listing(listing("l2", "other")).await.unwrap();
        store.put_profile(profile("u1", "Kojo Asante")).await.unwrap();

        let snap = snapshot(&store, "u1");

        assert_eq!(snap.prices.len(), 1);
        assert_eq!(snap.listings.len(), 1);
        assert_eq!(snap.listings[0].id, "l1");
        assert_eq!(snap.profile.as_ref().unwrap().name, "Kojo Asante");
    }

    #[tokio::test]
    async fn snapshot_without_stored_profile_omits_it() {
        let store = test_store().await;
        let snap = snapshot(&store, "ghost");
        assert!(snap.profile.is_none());
        assert!(snap.listings.is_empty());
    }

    #[test]
    fn csv_quotes_fields_containing_commas() {
        let rows = vec![maize()];
        let csv = prices_csv(&rows);

        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Commodity,Price (GHS),Unit,Location,Trend,Updated At"
        );
        assert_eq!(
            lines.next().unwrap(),
            "Maize,450.00,100kg bag,\"Makola, Accra\",stable,2 hours ago"
        );
    }
}
