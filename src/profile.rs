use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{DEFAULT_LOCATION, DEFAULT_NAME};
use crate::error::Result;
use crate::marketplace::ListingRegistry;
use crate::store::LocalStore;
use crate::types::{Profile, Role, SessionUser};

/// Read-with-defaults and write-through for user profiles.
pub struct ProfileStore {
    store: Arc<LocalStore>,
    registry: ListingRegistry,
}

impl ProfileStore {
    pub fn new(store: Arc<LocalStore>) -> Self {
        let registry = ListingRegistry::new(Arc::clone(&store));
        Self { store, registry }
    }

    /// The profile a surface should show for `identity`. Stored fields win
    /// per-field; anything never saved falls back to synthesized defaults.
    pub fn effective(&self, identity: &SessionUser) -> Profile {
        let defaults = Self::defaults(identity);
        match self.store.profile(&identity.user_id) {
            None => defaults,
            Some(stored) => Profile {
                id: stored.id,
                name: stored.name,
                location: stored.location,
                role: stored.role,
                phone_number: stored.phone_number.or(defaults.phone_number),
                profile_image: stored.profile_image.or(defaults.profile_image),
            },
        }
    }

    fn defaults(identity: &SessionUser) -> Profile {
        Profile {
            id: identity.user_id.clone(),
            name: identity
                .email
                .clone()
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
            location: DEFAULT_LOCATION.to_string(),
            phone_number: None,
            role: Role::Farmer,
            profile_image: None,
        }
    }

    /// Full upsert by id, then propagation of the owner's display fields to
    /// their listings. The fan-out is eventual: a failure is logged and left
    /// to the reconciler rather than rolling back the profile.
    pub async fn save(&self, profile: Profile) -> Result<Profile> {
        self.store.put_profile(profile.clone()).await?;
        info!(user_id = %profile.id, role = %profile.role, "profile saved");

        if let Err(e) = self
            .registry
            .on_profile_changed(&profile.id, &profile.name, profile.profile_image.as_deref())
            .await
        {
            warn!(user_id = %profile.id, "listing fan-out failed, reconciler will retry: {e}");
        }
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testutil::{listing, test_store};

    fn identity(user_id: &str, email: Option<&str>) -> SessionUser {
        SessionUser {
            user_id: user_id.to_string(),
            email: email.map(str::to_string),
            is_logged_in: true,
        }
    }

    #[tokio::test]
    async fn unsaved_profile_synthesizes_defaults() {
        let profiles = ProfileStore::new(test_store().await);

        let effective = profiles.effective(&identity("u1", Some("ama@example.com")));
        assert_eq!(effective.id, "u1");
        assert_eq!(effective.name, "ama@example.com");
        assert_eq!(effective.location, "Ghana");
        assert_eq!(effective.role, Role::Farmer);

        let nameless = profiles.effective(&identity("u2", None));
        assert_eq!(nameless.name, "Farmer");
    }

    #[tokio::test]
    async fn stored_fields_win_over_defaults() {
        let profiles = ProfileStore::new(test_store().await);

        profiles
            .save(Profile {
                id: "u1".to_string(),
                name: "Akua Mansa".to_string(),
                location: "Kumasi".to_string(),
                phone_number: None,
                role: Role::Buyer,
                profile_image: None,
            })
            .await
            .unwrap();

        let effective = profiles.effective(&identity("u1", Some("ama@example.com")));
        assert_eq!(effective.name, "Akua Mansa");
        assert_eq!(effective.location, "Kumasi");
        assert_eq!(effective.role, Role::Buyer);
        // never-saved optionals stay at their defaults
        assert!(effective.phone_number.is_none());
    }

    #[tokio::test]
    async fn save_propagates_display_fields_to_listings() {
        let store = test_store().await;
        store.put_listing(listing("l1", "u1")).await.unwrap();
        let profiles = ProfileStore::new(Arc::clone(&store));

        profiles
            .save(Profile {
                id: "u1".to_string(),
                name: "Akua Mansa".to_string(),
                location: "Kumasi".to_string(),
                phone_number: None,
                role: Role::Farmer,
                profile_image: Some("akua.jpg".to_string()),
            })
            .await
            .unwrap();

        let l = store.listing("l1").unwrap();
        assert_eq!(l.user_name, "Akua Mansa");
        assert_eq!(l.user_profile_image.as_deref(), Some("akua.jpg"));
    }
}
