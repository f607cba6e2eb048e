use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Market prices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketPrice {
    pub id: String,
    pub commodity: String,
    pub price: f64,
    pub unit: String,
    pub location: String,
    pub trend: Trend,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    /// Always derived from price movement — a trend is never set on its own.
    pub fn from_change(old_price: f64, new_price: f64) -> Self {
        if new_price > old_price {
            Trend::Up
        } else if new_price < old_price {
            Trend::Down
        } else {
            Trend::Stable
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Stable => "stable",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Price audit trail
// ---------------------------------------------------------------------------

/// One committed price change. Entries are append-only: written in the same
/// transaction as the price update, never mutated or deleted afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceAudit {
    pub id: String,
    pub price_id: String,
    /// Commodity name at the time of the change.
    pub commodity: String,
    pub old_price: f64,
    pub new_price: f64,
    /// The price this writer read before committing. Replication is last
    /// writer wins, so once trails from several devices merge, an entry whose
    /// base does not match the previous entry's `new_price` exposes a lost
    /// update.
    pub base_old_price: f64,
    /// Display name of the officer who made the change.
    pub changed_by: String,
    /// RFC 3339. Total order for the audit-trail display, most recent first.
    pub timestamp: String,
}

// ---------------------------------------------------------------------------
// Marketplace listings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    /// Owner. Stamped from the authenticated creator; update/delete are
    /// refused for anyone else.
    pub user_id: String,
    /// Denormalized owner display fields, re-propagated on profile edits.
    pub user_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_profile_image: Option<String>,
    pub title: String,
    pub description: String,
    /// Display price, always currency-prefixed (e.g. "GH₵ 450/bag").
    pub price: String,
    #[serde(rename = "type")]
    pub kind: ListingKind,
    pub category: String,
    pub contact: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Sale,
    Wanted,
}

impl std::fmt::Display for ListingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ListingKind::Sale => "sale",
            ListingKind::Wanted => "wanted",
        };
        write!(f, "{s}")
    }
}

/// Caller-supplied fields for a new listing. Owner identity is stamped by the
/// registry, never taken from the draft.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingDraft {
    pub title: String,
    pub description: String,
    pub price: String,
    #[serde(rename = "type")]
    pub kind: ListingKind,
    pub category: String,
    pub contact: String,
}

/// Partial update for a listing. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ListingKind>,
    pub category: Option<String>,
    pub contact: Option<String>,
}

impl ListingPatch {
    pub fn apply(self, current: Listing) -> Listing {
        Listing {
            title: self.title.unwrap_or(current.title),
            description: self.description.unwrap_or(current.description),
            price: self.price.unwrap_or(current.price),
            kind: self.kind.unwrap_or(current.kind),
            category: self.category.unwrap_or(current.category),
            contact: self.contact.unwrap_or(current.contact),
            ..current
        }
    }
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

/// One profile per identity user, keyed by the identity provider's user id.
/// Absent until the user completes a first save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    Farmer,
    Buyer,
    ExtensionOfficer,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Farmer => "farmer",
            Role::Buyer => "buyer",
            Role::ExtensionOfficer => "extension-officer",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Identity & actors
// ---------------------------------------------------------------------------

/// What the identity provider resolves a session to. The core consumes
/// nothing beyond these three fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub user_id: String,
    pub email: Option<String>,
    pub is_logged_in: bool,
}

/// Authenticated caller of a guarded mutation.
#[derive(Debug, Clone, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub display_name: String,
    pub role: Role,
}

// ---------------------------------------------------------------------------
// Collections & change feed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Prices,
    Listings,
    Profiles,
    PriceAudit,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Prices,
        Collection::Listings,
        Collection::Profiles,
        Collection::PriceAudit,
    ];

    pub const fn table(self) -> &'static str {
        match self {
            Collection::Prices => "prices",
            Collection::Listings => "listings",
            Collection::Profiles => "profiles",
            Collection::PriceAudit => "price_audit",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.table())
    }
}

/// Broadcast to live-query observers after a write commits.
#[derive(Debug, Clone, Copy)]
pub struct ChangeEvent {
    pub collection: Collection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_follows_price_movement() {
        assert_eq!(Trend::from_change(450.0, 470.0), Trend::Up);
        assert_eq!(Trend::from_change(450.0, 430.0), Trend::Down);
        assert_eq!(Trend::from_change(450.0, 450.0), Trend::Stable);
    }

    #[test]
    fn listing_patch_merges_only_present_fields() {
        let listing = Listing {
            id: "l1".to_string(),
            user_id: "u1".to_string(),
            user_name: "Kojo Asante".to_string(),
            user_profile_image: None,
            title: "50 Bags of Organic Maize".to_string(),
            description: "Grade A".to_string(),
            price: "GH₵ 450/bag".to_string(),
            kind: ListingKind::Sale,
            category: "Grain".to_string(),
            contact: "024 123 4567".to_string(),
        };

        let patch = ListingPatch {
            title: Some("40 Bags of Organic Maize".to_string()),
            ..Default::default()
        };
        let updated = patch.apply(listing.clone());

        assert_eq!(updated.title, "40 Bags of Organic Maize");
        assert_eq!(updated.description, listing.description);
        assert_eq!(updated.price, listing.price);
        assert_eq!(updated.user_id, listing.user_id);
    }

    #[test]
    fn role_serializes_kebab_case() {
        let json = serde_json::to_string(&Role::ExtensionOfficer).unwrap();
        assert_eq!(json, "\"extension-officer\"");
    }
}
